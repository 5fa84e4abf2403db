//! # Lockbox
//!
//! Key custody and access control for end-to-end encrypted file sharing.
//!
//! ## Overview
//!
//! Clients encrypt files before upload and wrap each file's content key for
//! every recipient. The server stores ciphertext, wrapped keys and sealed
//! private keys, and decides who may fetch what. It never holds a usable
//! decryption key for file content.
//!
//! - **Owner**: the uploader; may download, share, revoke, rotate and delete
//! - **Grantee**: holds a grant; may download and receives their wrapped key
//! - **Revocation**: deletes the grant; copies already taken are out of reach
//!
//! ## Usage
//!
//! ```rust,no_run
//! use lockbox::{Lockbox, LockboxConfig, NewUser};
//! use lockbox::store::{FsBlobStore, SqliteStore};
//!
//! async fn example() {
//!     let store = SqliteStore::open("lockbox.db").unwrap();
//!     let blobs = FsBlobStore::open("data").unwrap();
//!     let lockbox = Lockbox::new(store, blobs, LockboxConfig::default());
//!
//!     lockbox
//!         .register(NewUser {
//!             email: "alice@example.com".into(),
//!             username: "alice".into(),
//!             password: "correct horse".into(),
//!         })
//!         .await
//!         .unwrap();
//!
//!     let session = lockbox.login("alice@example.com", "correct horse").await.unwrap();
//!     let bearer = format!("Bearer {}", session.access_token);
//!     let files = lockbox.list_files(Some(&bearer)).await.unwrap();
//!     assert!(files.is_empty());
//! }
//! ```
//!
//! ## Re-exports
//!
//! - `lockbox::core` - Identifiers, records, envelope codec
//! - `lockbox::store` - Record and blob storage
//! - `lockbox::access` - Directory, registry, vault, gate
//! - `lockbox::session` - Access and refresh tokens

pub mod api;
pub mod config;
pub mod error;
pub mod service;

// Re-export component crates
pub use lockbox_access as access;
pub use lockbox_core as core;
pub use lockbox_session as session;
pub use lockbox_store as store;

// Re-export main types for convenience
pub use api::{
    Download, ShareRequest, Upload, HEADER_CONTENT_DISPOSITION, HEADER_FILE_METADATA,
    HEADER_WRAPPED_KEY,
};
pub use config::{LockboxConfig, DEFAULT_MAX_UPLOAD_BYTES};
pub use error::{LockboxError, Result};
pub use service::Lockbox;

pub use lockbox_access::{Access, NewUser, PublicKeyRecord, ShareEntry, SharedFile};
pub use lockbox_core::{ErrorKind, File, FileId, UploadMetadata, User, UserId};
pub use lockbox_session::{AccessToken, Session, SessionConfig};
