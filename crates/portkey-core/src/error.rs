use thiserror::Error;

/// Result type for backing store operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// Failures reported by a [`KeyValueStore`](crate::KeyValueStore).
///
/// A missing key is not an error; stores report it as `Ok(None)`.
#[derive(Debug, Clone, Error)]
pub enum StorageError {
    #[error("storage backend unavailable: {0}")]
    Unavailable(String),
    #[error("storage operation timed out: {0}")]
    Timeout(String),
    #[error("stored data is invalid: {0}")]
    InvalidData(String),
    #[error("storage operation failed: {0}")]
    Operation(String),
}

impl StorageError {
    /// Whether the caller may reasonably try the same operation again.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::Timeout(_))
    }
}
