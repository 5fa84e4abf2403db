//! Access grant vault.
//!
//! Persists, per `(file, recipient)`, the content key wrapped for that
//! recipient. The vault never sees or checks the key material: the wrapped
//! key is opaque text produced by the owner's client.
//!
//! Ownership checks are the caller's job (see [`crate::gate`]); the vault
//! enforces referential integrity and the one-grant-per-recipient rule.

use std::sync::Arc;

use tracing::info;

use lockbox_core::{now_millis, AccessGrant, File, FileId, User, UserId};
use lockbox_store::{InsertResult, Store};

use crate::error::{AccessError, Result};

/// A grant on a file, with the recipient resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShareEntry {
    pub grant: AccessGrant,
    pub recipient: User,
}

/// A file shared with a user, with the file and its owner resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SharedFile {
    pub grant: AccessGrant,
    pub file: File,
    pub owner: User,
}

/// The access grant vault.
pub struct GrantVault<S> {
    store: Arc<S>,
}

impl<S: Store> GrantVault<S> {
    /// Create a vault over `store`.
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Record that `recipient_id` may obtain `wrapped_key` for `file_id`.
    ///
    /// A second grant for the same pair is a `Conflict` and leaves the first
    /// untouched; to change a recipient's key, revoke and grant again.
    pub async fn grant_access(
        &self,
        file_id: &FileId,
        recipient_id: &UserId,
        wrapped_key: &str,
    ) -> Result<AccessGrant> {
        if wrapped_key.trim().is_empty() {
            return Err(AccessError::Validation("wrapped key is required".into()));
        }

        if self.store.get_file(file_id).await?.is_none() {
            return Err(AccessError::NotFound(format!("file {}", file_id)));
        }
        if self.store.get_user(recipient_id).await?.is_none() {
            return Err(AccessError::NotFound(format!("user {}", recipient_id)));
        }

        let grant = AccessGrant {
            file_id: *file_id,
            recipient_id: *recipient_id,
            wrapped_key: wrapped_key.to_string(),
            created_at: now_millis(),
        };

        match self.store.insert_grant(&grant).await? {
            InsertResult::Inserted => {
                info!(file_id = %file_id, recipient_id = %recipient_id, "granted access");
                Ok(grant)
            }
            InsertResult::Conflict => Err(AccessError::Conflict(format!(
                "file {} is already shared with user {}",
                file_id, recipient_id
            ))),
        }
    }

    /// Remove a grant. Idempotent; returns whether one was removed.
    ///
    /// Copies of the content key the recipient already unwrapped are beyond
    /// reach: revocation only stops future downloads of the wrapped key.
    pub async fn revoke_access(&self, file_id: &FileId, recipient_id: &UserId) -> Result<bool> {
        let removed = self.store.delete_grant(file_id, recipient_id).await?;
        if removed {
            info!(file_id = %file_id, recipient_id = %recipient_id, "revoked access");
        }
        Ok(removed)
    }

    /// The grant for one pair, if any.
    pub async fn get_grant(
        &self,
        file_id: &FileId,
        recipient_id: &UserId,
    ) -> Result<Option<AccessGrant>> {
        Ok(self.store.get_grant(file_id, recipient_id).await?)
    }

    /// Grants on a file, oldest first. Grants whose recipient no longer
    /// exists are skipped.
    pub async fn list_grants_for_file(&self, file_id: &FileId) -> Result<Vec<ShareEntry>> {
        let mut entries = Vec::new();

        for grant in self.store.grants_for_file(file_id).await? {
            if let Some(recipient) = self.store.get_user(&grant.recipient_id).await? {
                entries.push(ShareEntry { grant, recipient });
            }
        }

        Ok(entries)
    }

    /// Files shared with a user, oldest first. Grants whose file or owner no
    /// longer exists are skipped.
    pub async fn list_grants_for_user(&self, user_id: &UserId) -> Result<Vec<SharedFile>> {
        let mut shared = Vec::new();

        for grant in self.store.grants_for_user(user_id).await? {
            let Some(file) = self.store.get_file(&grant.file_id).await? else {
                continue;
            };
            let Some(owner) = self.store.get_user(&file.owner_id).await? else {
                continue;
            };
            shared.push(SharedFile { grant, file, owner });
        }

        Ok(shared)
    }
}
