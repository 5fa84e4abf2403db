//! Error types for the store module.

use lockbox_core::ErrorKind;
use thiserror::Error;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database error from SQLite.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Invalid data in storage.
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// Migration error.
    #[error("migration error: {0}")]
    Migration(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Blob path rejected (absolute, empty, or escaping the root).
    #[error("invalid blob path: {0}")]
    InvalidPath(String),

    /// The connection mutex was poisoned by a panicking writer.
    #[error("connection lock poisoned: {0}")]
    Poisoned(String),

    /// A blocking task failed to complete.
    #[error("blocking task failed: {0}")]
    Task(String),
}

impl StoreError {
    /// Classify this error. Storage failures are always `Internal`.
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Internal
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
