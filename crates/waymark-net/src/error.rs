//! Error types for the request layer.
//!
//! The taxonomy matters more than the individual variants: transport
//! failures (the HTTP exchange never completed) are queued for replay once
//! connectivity returns, while business and parse failures are final and
//! only reach the caller's error continuation.

use std::time::Duration;
use thiserror::Error;

/// Main error type for request-layer operations.
#[derive(Debug, Error)]
pub enum NetError {
    /// The HTTP exchange could not be completed (connection refused,
    /// DNS failure, socket error).
    #[error("network error: {message}")]
    Transport { message: String },

    /// The HTTP exchange timed out.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// A well-formed envelope whose code indicates the server rejected
    /// the request.
    #[error("server rejected request (code {code}): {message}")]
    Business { code: i64, message: String },

    /// The response body was empty, malformed, or its payload could not
    /// be shaped into the requested type.
    #[error("response parse error: {message}")]
    Parse { message: String },

    /// Invalid configuration (unparseable base URL, bad MIME type, ...).
    #[error("configuration error: {message}")]
    Config { message: String },
}

/// Result type alias for request-layer operations.
pub type Result<T> = std::result::Result<T, NetError>;

impl NetError {
    /// Whether this failure class should enqueue the request for replay.
    ///
    /// Only transport-class failures qualify: a business rejection or an
    /// unparseable response is not expected to become "fixed" merely
    /// because connectivity returns.
    pub fn is_transport(&self) -> bool {
        matches!(self, NetError::Transport { .. } | NetError::Timeout(_))
    }
}

impl From<reqwest::Error> for NetError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            NetError::Timeout(Duration::from_secs(0))
        } else {
            NetError::Transport {
                message: err.to_string(),
            }
        }
    }
}

impl From<serde_json::Error> for NetError {
    fn from(err: serde_json::Error) -> Self {
        NetError::Parse {
            message: err.to_string(),
        }
    }
}
