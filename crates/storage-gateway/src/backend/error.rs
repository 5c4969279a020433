//! Storage error types.

use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur while talking to a storage backend.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Resource not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// The write collides with existing state (e.g. duplicate entity key).
    #[error("conflict: {0}")]
    Conflict(String),

    /// A resource or object name the backend cannot address as given.
    #[error("invalid name: {0:?}")]
    InvalidName(String),

    /// Connection settings are unusable.
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// Request could not be signed.
    #[error("authorization error: {0}")]
    Authorization(String),

    /// Transport-level failure.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// The storage service answered with an error status.
    #[error("service error ({status}{}): {message}", code_suffix(.code))]
    Service {
        status: u16,
        code: Option<String>,
        message: String,
    },

    /// Storage backend error.
    #[error("backend error: {0}")]
    Backend(String),
}

fn code_suffix(code: &Option<String>) -> String {
    code.as_deref().map(|c| format!(" {c}")).unwrap_or_default()
}

impl StorageError {
    /// Service error code reported by the backend, if any.
    pub fn service_code(&self) -> Option<&str> {
        match self {
            Self::Service { code, .. } => code.as_deref(),
            _ => None,
        }
    }
}
