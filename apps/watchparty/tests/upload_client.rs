use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::Json;
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::Mutex as AsyncMutex;
use tokio::sync::mpsc;
use url::Url;
use watchparty_client_core::proto::SessionId;
use watchparty_client_core::status::UploadStatus;
use watchparty_client_core::upload::{UploadClient, UploadError, spawn_upload};

#[derive(Debug, Default, Clone)]
struct Received {
    file_name: Option<String>,
    content_type: Option<String>,
    bytes: Vec<u8>,
    sid: Option<String>,
}

type Uploads = Arc<AsyncMutex<Vec<Received>>>;

async fn spawn_upload_server() -> (SocketAddr, Uploads) {
    let uploads = Uploads::default();
    let router = Router::new()
        .route("/upload", post(upload_handler))
        .with_state(uploads.clone());
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("listener bind");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, router).await.ok();
    });
    (addr, uploads)
}

async fn upload_handler(State(uploads): State<Uploads>, mut multipart: Multipart) -> Response {
    let mut received = Received::default();
    while let Ok(Some(field)) = multipart.next_field().await {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("file") => {
                received.file_name = field.file_name().map(str::to_string);
                received.content_type = field.content_type().map(str::to_string);
                received.bytes = field.bytes().await.map(|b| b.to_vec()).unwrap_or_default();
            }
            Some("sid") => received.sid = field.text().await.ok(),
            _ => {}
        }
    }
    let has_sid = received.sid.as_deref().is_some_and(|sid| !sid.is_empty());
    uploads.lock().await.push(received);
    if !has_sid {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"success": false, "error": "No client SID"})),
        )
            .into_response();
    }
    StatusCode::NO_CONTENT.into_response()
}

fn write_video(name: &str, contents: &[u8]) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("watchparty-upload-{}", std::process::id()));
    std::fs::create_dir_all(&dir).expect("temp dir");
    let path = dir.join(name);
    std::fs::write(&path, contents).expect("write video");
    path
}

fn client_for(addr: SocketAddr) -> UploadClient {
    let endpoint = Url::parse(&format!("http://{addr}/upload")).expect("url");
    UploadClient::new(endpoint).expect("client")
}

#[tokio::test]
async fn upload_sends_file_and_session_id() {
    let (addr, uploads) = spawn_upload_server().await;
    let path = write_video("clip.webm", b"webm-bytes");

    client_for(addr)
        .upload(&path, &SessionId::from("me"))
        .await
        .expect("upload accepted");

    let received = uploads.lock().await.clone();
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].file_name.as_deref(), Some("clip.webm"));
    assert_eq!(received[0].content_type.as_deref(), Some("video/webm"));
    assert_eq!(received[0].bytes, b"webm-bytes");
    assert_eq!(received[0].sid.as_deref(), Some("me"));
}

#[tokio::test]
async fn server_error_text_becomes_the_failure_message() {
    let (addr, _uploads) = spawn_upload_server().await;
    let path = write_video("clip.mp4", b"mp4-bytes");

    let err = client_for(addr)
        .upload(&path, &SessionId::from(""))
        .await
        .expect_err("rejected");
    match err {
        UploadError::Rejected(message) => assert_eq!(message, "No client SID"),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn unsupported_files_never_reach_the_server() {
    let (addr, uploads) = spawn_upload_server().await;
    let path = write_video("notes.txt", b"hello");

    let err = client_for(addr)
        .upload(&path, &SessionId::from("me"))
        .await
        .expect_err("rejected locally");
    assert!(matches!(err, UploadError::UnsupportedType(_)));
    assert!(uploads.lock().await.is_empty());
}

#[tokio::test]
async fn spawned_upload_reports_its_outcome() {
    let (addr, _uploads) = spawn_upload_server().await;
    let path = write_video("spawned.ogg", b"ogg-bytes");
    let (tx, mut rx) = mpsc::unbounded_channel();

    spawn_upload(client_for(addr), path, SessionId::from("me"), tx);
    let status = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("status in time");
    assert_eq!(status, Some(UploadStatus::Succeeded));
}
