use std::path::PathBuf;

/// Errors surfaced by [`crate::monitor::LiveMonitor`].
#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    /// Activation needs a non-blank run identifier; nothing is opened without one.
    #[error("cannot activate monitor without a run identifier")]
    MissingRunId,
}

/// A push message that could not be understood.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("malformed push event: {0}")]
    Json(#[from] serde_json::Error),
}

/// Failure to pull a snapshot from one of the HTTP endpoints.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("{endpoint} returned HTTP {status}")]
    Status { endpoint: &'static str, status: u16 },
    #[error("invalid endpoint URL: {0}")]
    Url(#[from] url::ParseError),
    #[error("unreadable response body: {0}")]
    Decode(#[from] serde_json::Error),
    #[cfg(feature = "http")]
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
}

/// Failure of the push channel itself (not of a message on it).
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("invalid push channel URL: {0}")]
    Url(#[from] url::ParseError),
    #[error("push channel unavailable: {0}")]
    Unavailable(String),
    #[cfg(feature = "ws")]
    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
}

/// Errors that may occur while loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// No platform-specific data directory could be resolved.
    #[error("no suitable data directory available")]
    NoDataDir,
    #[error("failed to prepare directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("invalid base URL {url:?}: {source}")]
    BaseUrl {
        url: String,
        source: url::ParseError,
    },
}
