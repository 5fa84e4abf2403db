//! Error types for Lockbox Core.

use thiserror::Error;

/// The error taxonomy every public Lockbox operation reports.
///
/// Each crate-level error maps onto exactly one kind. None of the kinds are
/// retried server-side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Missing, invalid, or expired credentials.
    Unauthenticated,
    /// Authenticated, but not Owner/Grantee for the operation.
    Forbidden,
    /// File, user, or grant absent.
    NotFound,
    /// Duplicate grant or duplicate registration.
    Conflict,
    /// Malformed id or missing required field.
    Validation,
    /// Storage failure or blob/record inconsistency.
    Internal,
}

impl ErrorKind {
    /// The HTTP status a transport layer reports for this kind.
    pub const fn http_status(self) -> u16 {
        match self {
            ErrorKind::Unauthenticated => 401,
            ErrorKind::Forbidden => 403,
            ErrorKind::NotFound => 404,
            ErrorKind::Conflict => 409,
            ErrorKind::Validation => 400,
            ErrorKind::Internal => 500,
        }
    }
}

/// Core errors: identifiers and the envelope codec.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The secret did not authenticate: wrong password or tampered blob.
    #[error("authentication failed")]
    AuthFailure,

    #[error("malformed envelope: {0}")]
    Malformed(String),

    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("invalid identifier: {0}")]
    InvalidId(String),

    #[error("key derivation error: {0}")]
    KeyDerivation(String),

    #[error("encryption error: {0}")]
    Encryption(String),

    #[error("encoding error: {0}")]
    Encoding(String),
}

impl CoreError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::AuthFailure => ErrorKind::Unauthenticated,
            CoreError::Malformed(_) | CoreError::InvalidKey(_) | CoreError::InvalidId(_) => {
                ErrorKind::Validation
            }
            CoreError::KeyDerivation(_) | CoreError::Encryption(_) | CoreError::Encoding(_) => {
                ErrorKind::Internal
            }
        }
    }
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_status_mapping() {
        assert_eq!(ErrorKind::Unauthenticated.http_status(), 401);
        assert_eq!(ErrorKind::Forbidden.http_status(), 403);
        assert_eq!(ErrorKind::NotFound.http_status(), 404);
        assert_eq!(ErrorKind::Conflict.http_status(), 409);
        assert_eq!(ErrorKind::Validation.http_status(), 400);
        assert_eq!(ErrorKind::Internal.http_status(), 500);
    }

    #[test]
    fn test_core_error_kinds() {
        assert_eq!(CoreError::AuthFailure.kind(), ErrorKind::Unauthenticated);
        assert_eq!(
            CoreError::InvalidId("x".into()).kind(),
            ErrorKind::Validation
        );
        assert_eq!(
            CoreError::KeyDerivation("x".into()).kind(),
            ErrorKind::Internal
        );
    }
}
