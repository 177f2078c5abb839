use portkey_core::StorageError;
use portkey_generator::CodeSpaceError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ShortenerError>;

#[derive(Debug, Clone, Error)]
pub enum ShortenerError {
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error("invalid short code: {0}")]
    InvalidShortCode(String),
    #[error("short code not found: {0}")]
    NotFound(String),
    #[error("code space exhausted: {0}")]
    Exhausted(String),
    #[error(transparent)]
    CodeSpace(#[from] CodeSpaceError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("internal error: {0}")]
    Internal(String),
}

impl ShortenerError {
    /// Whether the failure came from the backing store being slow or down,
    /// as opposed to anything about the request itself.
    pub fn is_upstream(&self) -> bool {
        matches!(self, Self::Storage(e) if e.is_transient())
    }
}
