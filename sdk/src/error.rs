//! Error types for the Watson API client.

use thiserror::Error;

use crate::response::CustomData;

/// Result type alias for Watson operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for Watson API operations.
#[derive(Error, Debug)]
pub enum Error {
    /// A call parameter or credential is missing or invalid.
    ///
    /// Always raised locally, before any network I/O.
    #[error("invalid argument: {0}")]
    Argument(String),

    /// The identity service rejected the credentials or could not be reached.
    #[error("authentication failed: {message}")]
    Authentication {
        message: String,
        http_status: Option<u16>,
    },

    /// Network-level failure (DNS, connect, TLS, timeout).
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Non-2xx response returned by the service.
    #[error("watson: {message} (code={code}, http_status={http_status})")]
    Api {
        code: i64,
        message: String,
        http_status: u16,
        custom_data: Box<CustomData>,
    },

    /// The response body did not match the expected shape.
    #[error("unexpected response body: {source}")]
    Serialization {
        #[source]
        source: serde_json::Error,
        custom_data: Box<CustomData>,
    },

    /// Request body could not be encoded.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// WebSocket error on a streaming channel.
    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// IO error while reading an upload.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The service reported an error on a streaming channel.
    #[error("stream error: {0}")]
    Stream(String),

    /// The streaming channel is no longer accepting writes.
    #[error("channel closed")]
    ChannelClosed,
}

impl Error {
    /// Creates a new argument error.
    pub fn argument(msg: impl Into<String>) -> Self {
        Error::Argument(msg.into())
    }

    /// Creates a new authentication error.
    pub fn authentication(msg: impl Into<String>, http_status: Option<u16>) -> Self {
        Error::Authentication {
            message: msg.into(),
            http_status,
        }
    }

    /// Creates a new API error.
    pub fn api(code: i64, message: impl Into<String>, http_status: u16, custom_data: CustomData) -> Self {
        Error::Api {
            code,
            message: message.into(),
            http_status,
            custom_data: Box::new(custom_data),
        }
    }

    /// Returns the HTTP status associated with this error, if any.
    pub fn http_status(&self) -> Option<u16> {
        match self {
            Error::Api { http_status, .. } => Some(*http_status),
            Error::Authentication { http_status, .. } => *http_status,
            Error::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Returns the raw response envelope carried by the error, if any.
    pub fn custom_data(&self) -> Option<&CustomData> {
        match self {
            Error::Api { custom_data, .. } | Error::Serialization { custom_data, .. } => {
                Some(custom_data)
            }
            _ => None,
        }
    }

    /// Returns true if this error was raised by local argument validation.
    pub fn is_argument(&self) -> bool {
        matches!(self, Error::Argument(_))
    }

    /// Returns true if this is an authentication error.
    pub fn is_auth_error(&self) -> bool {
        match self {
            Error::Authentication { .. } => true,
            Error::Api { http_status, .. } => *http_status == 401 || *http_status == 403,
            _ => false,
        }
    }

    /// Returns true if the service answered 404.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::Api { http_status: 404, .. })
    }

    /// Returns true if this is a rate limit error.
    pub fn is_rate_limit(&self) -> bool {
        matches!(self, Error::Api { http_status: 429, .. })
    }

    /// Returns true if this is a server-side error.
    pub fn is_server_error(&self) -> bool {
        match self {
            Error::Api { http_status, .. } => *http_status >= 500,
            _ => false,
        }
    }
}
