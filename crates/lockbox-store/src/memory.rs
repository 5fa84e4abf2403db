//! In-memory implementation of the Store trait.
//!
//! This is primarily for testing. It has the same semantics as SQLite
//! but keeps everything in memory with no persistence.

use std::collections::{BTreeMap, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

use lockbox_core::{AccessGrant, File, FileId, RefreshToken, User, UserId};

use crate::error::{Result, StoreError};
use crate::traits::{InsertResult, KeyRotation, RotateResult, Store};

/// In-memory store implementation.
///
/// All data is lost when the store is dropped. Thread-safe via RwLock; every
/// check-then-write happens under a single write guard.
pub struct MemoryStore {
    inner: RwLock<MemoryStoreInner>,
}

#[derive(Default)]
struct MemoryStoreInner {
    users: HashMap<UserId, User>,

    /// Email index: normalized email -> user id.
    emails: HashMap<String, UserId>,

    files: HashMap<FileId, File>,

    /// Grants keyed by (file, recipient); the key is the uniqueness rule.
    grants: BTreeMap<(FileId, UserId), AccessGrant>,

    refresh_tokens: HashMap<String, RefreshToken>,
}

impl MemoryStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(MemoryStoreInner::default()),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, MemoryStoreInner>> {
        self.inner
            .read()
            .map_err(|e| StoreError::Poisoned(e.to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, MemoryStoreInner>> {
        self.inner
            .write()
            .map_err(|e| StoreError::Poisoned(e.to_string()))
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn sort_files(files: &mut [File]) {
    files.sort_by(|a, b| (a.created_at, a.id).cmp(&(b.created_at, b.id)));
}

#[async_trait]
impl Store for MemoryStore {
    async fn insert_user(&self, user: &User) -> Result<InsertResult> {
        let mut inner = self.write()?;

        if inner.users.contains_key(&user.id) || inner.emails.contains_key(&user.email) {
            return Ok(InsertResult::Conflict);
        }

        inner.emails.insert(user.email.clone(), user.id);
        inner.users.insert(user.id, user.clone());
        Ok(InsertResult::Inserted)
    }

    async fn get_user(&self, id: &UserId) -> Result<Option<User>> {
        Ok(self.read()?.users.get(id).cloned())
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let inner = self.read()?;
        Ok(inner
            .emails
            .get(email)
            .and_then(|id| inner.users.get(id))
            .cloned())
    }

    async fn delete_user(&self, id: &UserId) -> Result<bool> {
        let mut inner = self.write()?;

        match inner.users.remove(id) {
            Some(user) => {
                inner.emails.remove(&user.email);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn insert_file(&self, file: &File) -> Result<()> {
        let mut inner = self.write()?;

        if inner.files.contains_key(&file.id) {
            return Err(StoreError::InvalidData(format!(
                "file {} already exists",
                file.id
            )));
        }

        inner.files.insert(file.id, file.clone());
        Ok(())
    }

    async fn get_file(&self, id: &FileId) -> Result<Option<File>> {
        Ok(self.read()?.files.get(id).cloned())
    }

    async fn list_files_by_owner(&self, owner: &UserId) -> Result<Vec<File>> {
        let inner = self.read()?;
        let mut files: Vec<File> = inner
            .files
            .values()
            .filter(|f| f.owner_id == *owner)
            .cloned()
            .collect();
        sort_files(&mut files);
        Ok(files)
    }

    async fn list_files(&self) -> Result<Vec<File>> {
        let mut files: Vec<File> = self.read()?.files.values().cloned().collect();
        sort_files(&mut files);
        Ok(files)
    }

    async fn delete_file(&self, id: &FileId) -> Result<bool> {
        let mut inner = self.write()?;

        let existed = inner.files.remove(id).is_some();
        inner.grants.retain(|(file_id, _), _| file_id != id);
        Ok(existed)
    }

    async fn rotate_file_key(&self, rotation: &KeyRotation) -> Result<RotateResult> {
        let mut inner = self.write()?;

        let version = match inner.files.get_mut(&rotation.file_id) {
            None => return Ok(RotateResult::NotFound),
            Some(file) if file.content_key_version != rotation.expected_version => {
                return Ok(RotateResult::VersionMismatch {
                    current: file.content_key_version,
                });
            }
            Some(file) => {
                file.content_key_version += 1;
                file.encrypted_metadata = rotation.encrypted_metadata.clone();
                file.content_key_version
            }
        };

        inner
            .grants
            .retain(|(file_id, _), _| *file_id != rotation.file_id);
        for grant in &rotation.grants {
            inner
                .grants
                .insert((grant.file_id, grant.recipient_id), grant.clone());
        }

        Ok(RotateResult::Rotated { version })
    }

    async fn insert_grant(&self, grant: &AccessGrant) -> Result<InsertResult> {
        let mut inner = self.write()?;

        let key = (grant.file_id, grant.recipient_id);
        if inner.grants.contains_key(&key) {
            return Ok(InsertResult::Conflict);
        }

        inner.grants.insert(key, grant.clone());
        Ok(InsertResult::Inserted)
    }

    async fn get_grant(
        &self,
        file_id: &FileId,
        recipient_id: &UserId,
    ) -> Result<Option<AccessGrant>> {
        Ok(self.read()?.grants.get(&(*file_id, *recipient_id)).cloned())
    }

    async fn delete_grant(&self, file_id: &FileId, recipient_id: &UserId) -> Result<bool> {
        Ok(self
            .write()?
            .grants
            .remove(&(*file_id, *recipient_id))
            .is_some())
    }

    async fn grants_for_file(&self, file_id: &FileId) -> Result<Vec<AccessGrant>> {
        let inner = self.read()?;
        let mut grants: Vec<AccessGrant> = inner
            .grants
            .values()
            .filter(|g| g.file_id == *file_id)
            .cloned()
            .collect();
        grants.sort_by(|a, b| (a.created_at, a.recipient_id).cmp(&(b.created_at, b.recipient_id)));
        Ok(grants)
    }

    async fn grants_for_user(&self, recipient_id: &UserId) -> Result<Vec<AccessGrant>> {
        let inner = self.read()?;
        let mut grants: Vec<AccessGrant> = inner
            .grants
            .values()
            .filter(|g| g.recipient_id == *recipient_id)
            .cloned()
            .collect();
        grants.sort_by(|a, b| (a.created_at, a.file_id).cmp(&(b.created_at, b.file_id)));
        Ok(grants)
    }

    async fn insert_refresh_token(&self, token: &RefreshToken) -> Result<()> {
        let mut inner = self.write()?;

        if inner.refresh_tokens.contains_key(&token.token) {
            return Err(StoreError::InvalidData("refresh token already exists".into()));
        }

        inner
            .refresh_tokens
            .insert(token.token.clone(), token.clone());
        Ok(())
    }

    async fn get_refresh_token(&self, token: &str) -> Result<Option<RefreshToken>> {
        Ok(self.read()?.refresh_tokens.get(token).cloned())
    }

    async fn revoke_refresh_token(&self, token: &str, at: i64) -> Result<bool> {
        let mut inner = self.write()?;

        match inner.refresh_tokens.get_mut(token) {
            Some(stored) => {
                stored.revoked_at.get_or_insert(at);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
