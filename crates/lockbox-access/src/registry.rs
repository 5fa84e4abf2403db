//! File registry.
//!
//! Ties a file record to the ciphertext blob it describes. The two live in
//! different stores and cannot be committed together, so the order of
//! operations decides which inconsistency is possible:
//!
//! - upload writes the blob first, then the record. A crash in between
//!   leaves an orphan blob, which nothing references.
//! - delete removes the blob first, then the record. A crash in between
//!   leaves an orphan record, which download reports as an internal error
//!   and [`FileRegistry::find_orphaned_records`] lists.

use std::sync::Arc;

use bytes::Bytes;
use tracing::{info, warn};
use uuid::Uuid;

use lockbox_core::{now_millis, File, FileId, NewFile, UserId};
use lockbox_store::{BlobStore, Store};

use crate::error::{AccessError, Result};

/// The file registry.
pub struct FileRegistry<S, B> {
    store: Arc<S>,
    blobs: Arc<B>,
    upload_dir: String,
    max_upload_bytes: u64,
}

impl<S: Store, B: BlobStore> FileRegistry<S, B> {
    /// Create a registry. Blobs for new uploads go under `upload_dir`.
    pub fn new(
        store: Arc<S>,
        blobs: Arc<B>,
        upload_dir: impl Into<String>,
        max_upload_bytes: u64,
    ) -> Self {
        Self {
            store,
            blobs,
            upload_dir: upload_dir.into(),
            max_upload_bytes,
        }
    }

    /// Record a file whose blob is already stored at `storage_path`.
    ///
    /// If the record cannot be committed the blob is removed on a best-effort
    /// basis and the storage error is returned.
    pub async fn register_file(&self, new_file: NewFile) -> Result<File> {
        if !self.blobs.exists(&new_file.storage_path).await? {
            return Err(AccessError::Inconsistent(format!(
                "no blob at {}",
                new_file.storage_path
            )));
        }

        let file = File {
            id: FileId::new(),
            owner_id: new_file.owner_id,
            filename: new_file.filename,
            storage_path: new_file.storage_path,
            size_bytes: new_file.size_bytes,
            encrypted_metadata: new_file.encrypted_metadata,
            content_key_version: 1,
            created_at: now_millis(),
        };

        if let Err(e) = self.store.insert_file(&file).await {
            if let Err(cleanup) = self.blobs.delete(&file.storage_path).await {
                warn!(
                    path = %file.storage_path,
                    error = %cleanup,
                    "failed to remove blob after record commit failed"
                );
            }
            return Err(e.into());
        }

        info!(file_id = %file.id, owner_id = %file.owner_id, size = file.size_bytes, "registered file");
        Ok(file)
    }

    /// Store uploaded ciphertext and register it: blob first, then record.
    pub async fn store_and_register(
        &self,
        owner_id: UserId,
        filename: &str,
        content: Bytes,
        encrypted_metadata: String,
    ) -> Result<File> {
        let filename = filename.trim();
        if filename.is_empty() {
            return Err(AccessError::Validation("filename is required".into()));
        }
        if content.len() as u64 > self.max_upload_bytes {
            return Err(AccessError::Validation(format!(
                "upload of {} bytes exceeds the {} byte limit",
                content.len(),
                self.max_upload_bytes
            )));
        }

        let storage_path = self.storage_path_for(filename);
        let size_bytes = content.len() as u64;
        self.blobs.put(&storage_path, content).await?;

        self.register_file(NewFile {
            owner_id,
            filename: filename.to_string(),
            storage_path,
            size_bytes,
            encrypted_metadata,
        })
        .await
    }

    /// Get a file record.
    pub async fn get_file(&self, file_id: &FileId) -> Result<File> {
        self.store
            .get_file(file_id)
            .await?
            .ok_or_else(|| AccessError::NotFound(format!("file {}", file_id)))
    }

    /// Read a file's ciphertext. A record without a blob is an error, never
    /// empty content.
    pub async fn read_content(&self, file: &File) -> Result<Bytes> {
        self.blobs.get(&file.storage_path).await?.ok_or_else(|| {
            AccessError::Inconsistent(format!("blob missing for file record {}", file.id))
        })
    }

    /// Delete a file: its blob, its record, and its grants.
    ///
    /// A blob that is already gone (or fails to delete) is logged, and the
    /// record is deleted regardless.
    pub async fn delete_file(&self, file_id: &FileId) -> Result<()> {
        let file = self.get_file(file_id).await?;

        match self.blobs.delete(&file.storage_path).await {
            Ok(true) => {}
            Ok(false) => warn!(file_id = %file.id, path = %file.storage_path, "blob already missing on delete"),
            Err(e) => warn!(file_id = %file.id, error = %e, "failed to delete blob"),
        }

        if !self.store.delete_file(file_id).await? {
            return Err(AccessError::NotFound(format!("file {}", file_id)));
        }

        info!(file_id = %file.id, "deleted file");
        Ok(())
    }

    /// Files owned by `owner_id`, oldest first.
    pub async fn list_files_by_owner(&self, owner_id: &UserId) -> Result<Vec<File>> {
        Ok(self.store.list_files_by_owner(owner_id).await?)
    }

    /// Every file record whose blob no longer exists.
    pub async fn find_orphaned_records(&self) -> Result<Vec<FileId>> {
        let mut orphans = Vec::new();

        for file in self.store.list_files().await? {
            if !self.blobs.exists(&file.storage_path).await? {
                orphans.push(file.id);
            }
        }

        if !orphans.is_empty() {
            warn!(count = orphans.len(), "found file records without blobs");
        }
        Ok(orphans)
    }

    /// `<upload_dir>/<uuid><ext>`, keeping the upload's extension.
    fn storage_path_for(&self, filename: &str) -> String {
        let ext = std::path::Path::new(filename)
            .extension()
            .and_then(|e| e.to_str())
            .filter(|e| e.chars().all(|c| c.is_ascii_alphanumeric()))
            .map(|e| format!(".{}", e))
            .unwrap_or_default();

        let name = format!("{}{}", Uuid::new_v4(), ext);
        if self.upload_dir.is_empty() {
            name
        } else {
            format!("{}/{}", self.upload_dir.trim_end_matches('/'), name)
        }
    }
}
