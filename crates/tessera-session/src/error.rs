//! Error types for session operations.

use std::time::Duration;

/// Failure talking to a cache backend.
///
/// Any of these means the backend could not give an authoritative answer.
/// A missing key is never reported through this type.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// The backend could not be reached or the connection broke.
    #[error("Backend unavailable: {0}")]
    Unavailable(String),

    /// A backend call did not complete in time.
    #[error("Backend call timed out after {0:?}")]
    Timeout(Duration),

    /// The backend answered with something we could not interpret.
    #[error("Backend protocol error: {0}")]
    Protocol(String),

    /// The backend refused the request (e.g. value too large, bad key).
    #[error("Backend rejected request: {0}")]
    Rejected(String),

    /// Transport-level I/O failure.
    #[error("Backend I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Error type for session operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The cache backend could not serve the request.
    #[error(transparent)]
    Backend(#[from] BackendError),

    /// `change_id` was called before any session existed for the request.
    #[error("Cannot rotate session id: no session exists for this request")]
    RotateWithoutSession,

    /// A value could not be converted to or from JSON.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A cookie directive could not be encoded as a header.
    #[error("Invalid cookie: {0}")]
    InvalidCookie(String),
}

impl Error {
    /// Whether this error means the backend was unreachable or failed.
    pub fn is_backend_unavailable(&self) -> bool {
        matches!(self, Error::Backend(_))
    }
}

/// Result type for session operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Result type for raw backend calls.
pub type BackendResult<T> = std::result::Result<T, BackendError>;
