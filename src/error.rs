//! Error types for the synchronization core.

use thiserror::Error;

/// Main error type for sync operations.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Invalid channel: {0}")]
    InvalidChannel(String),

    #[error("Unknown event: {0}")]
    UnknownEvent(String),

    #[error("Malformed payload for {event}: {reason}")]
    MalformedPayload { event: String, reason: String },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Not connected")]
    NotConnected,

    #[error("Frame error: {0}")]
    Frame(String),

    #[error("Backend error ({status}): {message}")]
    Backend { status: u16, message: String },

    #[error("Request timed out")]
    Timeout,

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),
}

impl SyncError {
    /// Backend failure without an HTTP status (connection refused, bad body, ...).
    pub fn backend(message: impl Into<String>) -> Self {
        SyncError::Backend {
            status: 0,
            message: message.into(),
        }
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(e: serde_json::Error) -> Self {
        SyncError::Serialization(e.to_string())
    }
}

#[cfg(feature = "http")]
impl From<reqwest::Error> for SyncError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            return SyncError::Timeout;
        }
        match e.status() {
            Some(status) => SyncError::Backend {
                status: status.as_u16(),
                message: e.to_string(),
            },
            None => SyncError::backend(e.to_string()),
        }
    }
}

/// Result type for sync operations.
pub type Result<T> = std::result::Result<T, SyncError>;
