//! Error types for the Lockbox service.

use lockbox_access::AccessError;
use lockbox_core::{CoreError, ErrorKind};
use lockbox_session::{SessionError, TokenError};
use lockbox_store::StoreError;
use thiserror::Error;

/// Errors returned by [`Lockbox`](crate::Lockbox) operations.
///
/// Every variant maps to an [`ErrorKind`], and through it to an HTTP status.
#[derive(Debug, Error)]
pub enum LockboxError {
    /// Access layer error.
    #[error(transparent)]
    Access(#[from] AccessError),

    /// Session error.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// Storage error.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    /// Core error.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A request was well-formed but not acceptable.
    #[error("invalid request: {0}")]
    Validation(String),

    /// A concurrent change won.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Resource not found.
    #[error("not found: {0}")]
    NotFound(String),
}

impl From<TokenError> for LockboxError {
    fn from(e: TokenError) -> Self {
        LockboxError::Session(SessionError::Token(e))
    }
}

impl LockboxError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            LockboxError::Access(e) => e.kind(),
            LockboxError::Session(e) => e.kind(),
            LockboxError::Store(e) => e.kind(),
            LockboxError::Core(e) => e.kind(),
            LockboxError::Validation(_) => ErrorKind::Validation,
            LockboxError::Conflict(_) => ErrorKind::Conflict,
            LockboxError::NotFound(_) => ErrorKind::NotFound,
        }
    }

    /// The HTTP status this error should be reported with.
    pub fn http_status(&self) -> u16 {
        self.kind().http_status()
    }
}

/// Result type for Lockbox operations.
pub type Result<T> = std::result::Result<T, LockboxError>;
