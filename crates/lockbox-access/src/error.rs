//! Error types for the access layer.

use lockbox_core::{CoreError, ErrorKind};
use lockbox_store::StoreError;
use thiserror::Error;

/// Errors that can occur during key-directory, registry, vault or gate
/// operations.
#[derive(Debug, Error)]
pub enum AccessError {
    /// Credentials did not check out.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// The requester may not perform this operation on the file.
    #[error("permission denied: {0}")]
    Forbidden(String),

    /// A referenced user or file does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// A uniquely keyed record already exists.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Caller-supplied input was rejected.
    #[error("invalid input: {0}")]
    Validation(String),

    /// Stored state is inconsistent (for example a record without a blob).
    #[error("inconsistent state: {0}")]
    Inconsistent(String),

    /// Password hashing failed.
    #[error("password hashing error: {0}")]
    PasswordHash(String),

    /// Store error.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Core error.
    #[error("core error: {0}")]
    Core(#[from] CoreError),
}

impl AccessError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            AccessError::InvalidCredentials => ErrorKind::Unauthenticated,
            AccessError::Forbidden(_) => ErrorKind::Forbidden,
            AccessError::NotFound(_) => ErrorKind::NotFound,
            AccessError::Conflict(_) => ErrorKind::Conflict,
            AccessError::Validation(_) => ErrorKind::Validation,
            AccessError::Inconsistent(_) | AccessError::PasswordHash(_) => ErrorKind::Internal,
            AccessError::Store(e) => e.kind(),
            AccessError::Core(e) => e.kind(),
        }
    }
}

/// Result type for access operations.
pub type Result<T> = std::result::Result<T, AccessError>;
