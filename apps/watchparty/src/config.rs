use std::time::Duration;

use thiserror::Error;
use url::Url;

use crate::sync::SyncTuning;

pub const DEFAULT_SERVER_URL: &str = "ws://127.0.0.1:5000/ws";
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(1);

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must not be empty")]
    Empty(&'static str),
    #[error("invalid {field} '{value}': {source}")]
    InvalidUrl {
        field: &'static str,
        value: String,
        #[source]
        source: url::ParseError,
    },
    #[error("unsupported scheme '{scheme}' for {field}")]
    UnsupportedScheme { field: &'static str, scheme: String },
    #[error("invalid tuning: {0}")]
    InvalidTuning(String),
}

/// Watchparty client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Authority WebSocket endpoint
    pub server_url: Url,
    /// Multipart upload endpoint
    pub upload_url: Url,
    pub reconnect_delay: Duration,
    pub tuning: SyncTuning,
}

impl ClientConfig {
    /// Normalizes the server address and derives the upload endpoint from it
    /// unless one is given.
    pub fn new(server: &str, upload: Option<&str>) -> Result<Self, ConfigError> {
        let server_url = normalize_server_url(server)?;
        let upload_url = match upload {
            Some(raw) => normalize_upload_url(raw)?,
            None => derive_upload_url(&server_url),
        };
        Ok(Self {
            server_url,
            upload_url,
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
            tuning: SyncTuning::default(),
        })
    }

    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    pub fn with_tuning(mut self, tuning: SyncTuning) -> Result<Self, ConfigError> {
        validate_tuning(&tuning)?;
        self.tuning = tuning;
        Ok(self)
    }
}

/// Accepts `host:port`, `http(s)://` or `ws(s)://` and returns a ws url.
pub fn normalize_server_url(raw: &str) -> Result<Url, ConfigError> {
    let mut url = parse_with_default_scheme("server url", raw, "ws")?;
    let scheme = match url.scheme() {
        "ws" | "http" => "ws",
        "wss" | "https" => "wss",
        other => {
            return Err(ConfigError::UnsupportedScheme {
                field: "server url",
                scheme: other.to_string(),
            });
        }
    };
    if url.scheme() != scheme {
        let _ = url.set_scheme(scheme);
    }
    if url.path().is_empty() || url.path() == "/" {
        url.set_path("/ws");
    }
    Ok(url)
}

pub fn normalize_upload_url(raw: &str) -> Result<Url, ConfigError> {
    let url = parse_with_default_scheme("upload url", raw, "http")?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(ConfigError::UnsupportedScheme {
            field: "upload url",
            scheme: other.to_string(),
        }),
    }
}

/// Same host as the channel, over http(s), at `/upload`.
pub fn derive_upload_url(server_url: &Url) -> Url {
    let mut url = server_url.clone();
    let scheme = if url.scheme() == "wss" { "https" } else { "http" };
    let _ = url.set_scheme(scheme);
    url.set_path("/upload");
    url.set_query(None);
    url.set_fragment(None);
    url
}

pub fn validate_tuning(tuning: &SyncTuning) -> Result<(), ConfigError> {
    if !tuning.drift_threshold.is_finite() || tuning.drift_threshold <= 0.0 {
        return Err(ConfigError::InvalidTuning(
            "drift threshold must be positive".into(),
        ));
    }
    if !tuning.latency_compensation.is_finite() || tuning.latency_compensation < 0.0 {
        return Err(ConfigError::InvalidTuning(
            "latency compensation must not be negative".into(),
        ));
    }
    if tuning.resync_interval.is_zero() {
        return Err(ConfigError::InvalidTuning(
            "resync interval must be non-zero".into(),
        ));
    }
    Ok(())
}

fn parse_with_default_scheme(
    field: &'static str,
    raw: &str,
    default_scheme: &str,
) -> Result<Url, ConfigError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::Empty(field));
    }
    let candidate = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("{default_scheme}://{trimmed}")
    };
    let mut url = Url::parse(&candidate).map_err(|source| ConfigError::InvalidUrl {
        field,
        value: trimmed.to_string(),
        source,
    })?;
    // Prefer IPv4 so a server bound to 0.0.0.0 is reachable on hosts that
    // resolve localhost to ::1 first.
    if url.host_str() == Some("localhost") {
        let _ = url.set_host(Some("127.0.0.1"));
    }
    Ok(url)
}
