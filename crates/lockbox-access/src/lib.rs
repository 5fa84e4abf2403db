//! # Lockbox Access
//!
//! Key custody and access control.
//!
//! ## Overview
//!
//! Access control here is a table, not a flag: a user may read a file they
//! do not own only while a grant row holds the file's content key wrapped
//! for them. Removing the row removes their ability to fetch the key.
//!
//! ## Components
//!
//! - [`KeyDirectory`] - Registers users and serves their public keys
//! - [`FileRegistry`] - Ties file records to ciphertext blobs
//! - [`GrantVault`] - Stores one wrapped key per (file, recipient)
//! - [`Gate`] / [`Access`] - Decides Owner, Grantee or Denied
//!
//! ## Key Model
//!
//! 1. **Content key**: a symmetric key the client encrypts the file with
//! 2. **Wrapped key**: the content key sealed to one recipient's public key,
//!    produced client-side and stored here as opaque text
//!
//! This allows:
//! - Sharing without re-encrypting content
//! - Revocation by deleting a grant (past copies stay with the recipient)
//! - Rotation by re-encrypting and replacing every grant at once
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use lockbox_access::{Access, Gate, GrantVault};
//! use lockbox_store::MemoryStore;
//! use lockbox_core::{FileId, UserId};
//!
//! async fn example(file_id: FileId, bob: UserId) {
//!     let store = Arc::new(MemoryStore::new());
//!     let vault = GrantVault::new(Arc::clone(&store));
//!     let gate = Gate::new(store);
//!
//!     vault.grant_access(&file_id, &bob, "wrapped-key").await.unwrap();
//!     let (_file, access) = gate.decide(&bob, &file_id).await.unwrap();
//!     assert!(matches!(access, Access::Grantee { .. }));
//! }
//! ```

pub mod directory;
pub mod error;
pub mod gate;
pub mod registry;
pub mod vault;

pub use directory::{normalize_email, KeyDirectory, NewUser, PublicKeyRecord, UserLookup};
pub use error::{AccessError, Result};
pub use gate::{Access, Gate};
pub use registry::FileRegistry;
pub use vault::{GrantVault, ShareEntry, SharedFile};
