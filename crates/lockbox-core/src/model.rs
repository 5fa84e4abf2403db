//! Persistent records.
//!
//! These are plain data; invariants over them (one owner per file, one grant
//! per recipient) are enforced by the store and the access layer.

use serde::{Deserialize, Serialize};

use crate::crypto::PublicKey;
use crate::envelope::{KdfParams, WrappedSecret};
use crate::error::{CoreError, Result};
use crate::types::{FileId, UserId};

/// A registered user and their key material.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub username: String,
    /// Immutable once set.
    pub public_key: PublicKey,
    /// Immutable once set. Sealed under the user's password.
    pub encrypted_private_key: WrappedSecret,
    /// Argon2id PHC string.
    pub password_hash: String,
    pub created_at: i64,
    /// Argon2id parameters `encrypted_private_key` was sealed with. The
    /// envelope does not carry them, so unsealing must use these rather than
    /// whatever the service is currently configured with.
    pub key_kdf: KdfParams,
}

/// An uploaded, client-side encrypted file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct File {
    pub id: FileId,
    /// Exactly one owner, immutable.
    pub owner_id: UserId,
    pub filename: String,
    /// Blob store path of the ciphertext.
    pub storage_path: String,
    pub size_bytes: u64,
    /// Opaque; describes how the content was encrypted client-side.
    pub encrypted_metadata: String,
    /// Starts at 1; bumped only by an explicit key rotation.
    pub content_key_version: u32,
    pub created_at: i64,
}

impl File {
    /// Whether `user` owns this file.
    pub fn is_owned_by(&self, user: &UserId) -> bool {
        self.owner_id == *user
    }
}

/// Fields supplied when registering a file record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewFile {
    pub owner_id: UserId,
    pub filename: String,
    pub storage_path: String,
    pub size_bytes: u64,
    pub encrypted_metadata: String,
}

/// Authorization for one recipient to obtain the wrapped key of one file.
///
/// Never mutated in place: revocation deletes it, rotation replaces it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessGrant {
    pub file_id: FileId,
    pub recipient_id: UserId,
    /// Opaque; decryptable only with the recipient's private key.
    pub wrapped_key: String,
    pub created_at: i64,
}

/// A persisted renewal credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshToken {
    pub token: String,
    pub user_id: UserId,
    pub created_at: i64,
    pub expires_at: i64,
    /// Set on logout/rotation. The row is retained for audit.
    pub revoked_at: Option<i64>,
}

impl RefreshToken {
    /// Whether this token may still be exchanged for an access token.
    pub fn is_usable(&self, now: i64) -> bool {
        self.revoked_at.is_none() && now < self.expires_at
    }
}

/// Client-side content encryption parameters sent with an upload.
///
/// Stored verbatim as a file's `encrypted_metadata`; never interpreted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadMetadata {
    pub iv: String,
    pub salt: String,
    pub algorithm: String,
}

impl UploadMetadata {
    /// Serialize to the stored JSON form.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| CoreError::Encoding(e.to_string()))
    }

    /// Parse the stored JSON form.
    pub fn from_json(s: &str) -> Result<Self> {
        serde_json::from_str(s).map_err(|e| CoreError::Malformed(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upload_metadata_json_is_verbatim() {
        let meta = UploadMetadata {
            iv: "aXY=".into(),
            salt: "c2FsdA==".into(),
            algorithm: "AES-GCM".into(),
        };
        let json = meta.to_json().unwrap();
        assert_eq!(json, r#"{"iv":"aXY=","salt":"c2FsdA==","algorithm":"AES-GCM"}"#);
        assert_eq!(UploadMetadata::from_json(&json).unwrap(), meta);
    }

    #[test]
    fn test_refresh_token_usability() {
        let mut token = RefreshToken {
            token: "t".into(),
            user_id: UserId::new(),
            created_at: 0,
            expires_at: 1000,
            revoked_at: None,
        };

        assert!(token.is_usable(999));
        assert!(!token.is_usable(1000));

        token.revoked_at = Some(10);
        assert!(!token.is_usable(500));
    }
}
