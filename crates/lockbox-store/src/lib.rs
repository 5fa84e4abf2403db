//! # Lockbox Store
//!
//! Storage abstraction for Lockbox. Provides a trait-based interface for
//! record persistence with SQLite and in-memory implementations, plus a
//! separate blob interface for encrypted file content.
//!
//! ## Key Types
//!
//! - [`Store`] - The async trait for user, file, grant and token records
//! - [`SqliteStore`] - SQLite-based persistent storage
//! - [`MemoryStore`] - In-memory storage for tests
//! - [`BlobStore`] - Ciphertext storage, with [`FsBlobStore`] and [`MemoryBlobStore`]
//! - [`InsertResult`] - Result of inserting a uniquely keyed record
//! - [`KeyRotation`] / [`RotateResult`] - Atomic content-key rotation
//!
//! ## Usage
//!
//! ```rust,no_run
//! use lockbox_store::{SqliteStore, Store};
//! use lockbox_core::UserId;
//!
//! async fn example() {
//!     // Open a SQLite database
//!     let store = SqliteStore::open("lockbox.db").unwrap();
//!
//!     // Or use an in-memory database for testing
//!     let store = SqliteStore::open_memory().unwrap();
//!
//!     let files = store.list_files_by_owner(&UserId::new()).await.unwrap();
//!     assert!(files.is_empty());
//! }
//! ```
//!
//! ## Design Notes
//!
//! - **One grant per pair**: a second grant for the same file and recipient
//!   returns `Conflict`, even when two inserts race
//! - **Cascading file delete**: deleting a file removes its grants
//! - **Audit-friendly tokens**: refresh tokens are revoked, never deleted

pub mod blob;
pub mod error;
pub mod memory;
pub mod migration;
pub mod sqlite;
pub mod traits;

pub use blob::{BlobStore, FsBlobStore, MemoryBlobStore};
pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use traits::{InsertResult, KeyRotation, RotateResult, Store};
