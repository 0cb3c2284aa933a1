//! Fire-and-forget video upload. A successful upload makes the authority
//! broadcast `video_loaded` and hand control to the uploader; the client only
//! learns about that through the channel, never from the HTTP response.

use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::StatusCode;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use thiserror::Error;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use url::Url;
use watchparty_proto::SessionId;

use crate::status::UploadStatus;

pub const ALLOWED_EXTENSIONS: [&str; 3] = ["mp4", "webm", "ogg"];

#[derive(Error, Debug)]
pub enum UploadError {
    #[error("file type not allowed: {0}")]
    UnsupportedType(String),
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("{0}")]
    Rejected(String),
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    error: Option<String>,
}

/// Checks the extension locally and returns the mime type to send.
pub fn validate_extension(path: &Path) -> Result<&'static str, UploadError> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    match extension.as_str() {
        "mp4" => Ok("video/mp4"),
        "webm" => Ok("video/webm"),
        "ogg" => Ok("video/ogg"),
        _ => Err(UploadError::UnsupportedType(path.display().to_string())),
    }
}

/// Failure text for a non-2xx answer: the server's `error` field when it
/// sent one, else the status line.
pub fn rejection_message(status: StatusCode, body: &str) -> String {
    match serde_json::from_str::<UploadResponse>(body) {
        Ok(UploadResponse {
            success: false,
            error: Some(error),
        }) if !error.trim().is_empty() => error,
        _ => format!("upload failed with status {status}"),
    }
}

#[derive(Clone, Debug)]
pub struct UploadClient {
    client: reqwest::Client,
    endpoint: Url,
}

impl UploadClient {
    pub fn new(endpoint: Url) -> Result<Self, UploadError> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(3))
            .timeout(Duration::from_secs(600))
            .build()?;
        Ok(Self { client, endpoint })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    pub async fn upload(&self, path: &Path, sid: &SessionId) -> Result<(), UploadError> {
        let mime = validate_extension(path)?;
        let bytes = tokio::fs::read(path).await.map_err(|source| UploadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "video".to_string());
        let size = bytes.len();

        let part = Part::bytes(bytes).file_name(file_name).mime_str(mime)?;
        let form = Form::new()
            .part("file", part)
            .text("sid", sid.as_str().to_string());

        info!(endpoint = %self.endpoint, size, "uploading video");
        let response = self
            .client
            .post(self.endpoint.clone())
            .multipart(form)
            .send()
            .await?;
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Err(UploadError::Rejected(rejection_message(status, &body)))
    }
}

/// Runs the upload on its own task and reports the outcome as an
/// `UploadStatus`. The caller publishes `InProgress` itself.
pub fn spawn_upload(
    client: UploadClient,
    path: PathBuf,
    sid: SessionId,
    results: UnboundedSender<UploadStatus>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let status = match client.upload(&path, &sid).await {
            Ok(()) => {
                info!(path = %path.display(), "upload accepted");
                UploadStatus::Succeeded
            }
            Err(err) => {
                warn!(path = %path.display(), error = %err, "upload failed");
                UploadStatus::Failed(err.to_string())
            }
        };
        let _ = results.send(status);
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extensions_are_checked_case_insensitively() {
        assert_eq!(validate_extension(Path::new("clip.MP4")).ok(), Some("video/mp4"));
        assert_eq!(validate_extension(Path::new("a/b.webm")).ok(), Some("video/webm"));
        assert!(matches!(
            validate_extension(Path::new("notes.txt")),
            Err(UploadError::UnsupportedType(_))
        ));
        assert!(validate_extension(Path::new("mp4")).is_err());
    }

    #[test]
    fn rejection_prefers_server_error_text() {
        assert_eq!(
            rejection_message(
                StatusCode::BAD_REQUEST,
                r#"{"success": false, "error": "No client SID"}"#
            ),
            "No client SID"
        );
        assert_eq!(
            rejection_message(StatusCode::INTERNAL_SERVER_ERROR, "<html>oops</html>"),
            "upload failed with status 500 Internal Server Error"
        );
    }
}
