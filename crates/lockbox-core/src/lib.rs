//! # Lockbox Core
//!
//! Pure primitives for Lockbox: identifiers, persistent records, and the
//! envelope codec.
//!
//! This crate contains no I/O, no storage, no networking.
//!
//! ## Key Types
//!
//! - [`UserId`], [`FileId`] - Strongly typed identifiers
//! - [`User`], [`File`], [`AccessGrant`], [`RefreshToken`] - Stored records
//! - [`IdentityKeypair`] / [`PublicKey`] - A user's X25519 identity
//! - [`WrappedSecret`] - A secret sealed under a password (Argon2id + ChaCha20-Poly1305)
//! - [`WrappedKey`] - A content key sealed for one recipient
//! - [`ErrorKind`] - The error taxonomy shared by every crate
//!
//! ## Key Custody
//!
//! The server stores public keys in the clear and private keys only as
//! password envelopes (see [`envelope`]). Content keys never reach the
//! server unwrapped; it stores the per-recipient [`WrappedKey`] strings as
//! opaque text.

pub mod crypto;
pub mod envelope;
pub mod error;
pub mod identity;
pub mod keywrap;
pub mod model;
pub mod types;

pub use crypto::{AeadNonce, EphemeralKeyPair, IdentityKeypair, PublicKey, SharedKey, SymmetricKey};
pub use envelope::{
    unwrap_secret, unwrap_secret_with, wrap_secret, wrap_secret_with, KdfParams, WrappedSecret,
};
pub use error::{CoreError, ErrorKind, Result};
pub use identity::{recover_identity, register_identity, RegisteredIdentity};
pub use keywrap::WrappedKey;
pub use model::{AccessGrant, File, NewFile, RefreshToken, UploadMetadata, User};
pub use types::{now_millis, FileId, UserId};
