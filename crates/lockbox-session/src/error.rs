//! Error types for sessions.

use lockbox_core::ErrorKind;
use lockbox_store::StoreError;
use thiserror::Error;

/// Why an access token was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TokenError {
    /// Well-formed and correctly signed, but past its expiry.
    #[error("access token expired")]
    Expired,

    /// Malformed, or signed by someone else.
    #[error("access token invalid")]
    Invalid,
}

/// Errors that can occur during session operations.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Access token rejected.
    #[error(transparent)]
    Token(#[from] TokenError),

    /// No usable `Authorization: Bearer` header.
    #[error("missing or malformed bearer token")]
    MissingBearer,

    /// Refresh token unknown, revoked or expired.
    #[error("refresh token rejected")]
    RefreshRejected,

    /// Refresh token to revoke does not exist.
    #[error("refresh token not found")]
    RefreshNotFound,

    /// Claims could not be encoded.
    #[error("encoding error: {0}")]
    Encoding(String),

    /// Store error.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl SessionError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            SessionError::Token(_) | SessionError::MissingBearer | SessionError::RefreshRejected => {
                ErrorKind::Unauthenticated
            }
            SessionError::RefreshNotFound => ErrorKind::NotFound,
            SessionError::Encoding(_) => ErrorKind::Internal,
            SessionError::Store(e) => e.kind(),
        }
    }
}

/// Result type for session operations.
pub type Result<T> = std::result::Result<T, SessionError>;
