//! Blob storage for encrypted file content.
//!
//! The server never sees plaintext: blobs are client-side ciphertext, stored
//! and returned byte-for-byte. Record metadata lives in [`Store`](crate::Store);
//! this trait only moves bytes.

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::error::{Result, StoreError};

/// Async interface for content blobs, addressed by relative path.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Write a blob, replacing any previous content at `path`.
    async fn put(&self, path: &str, data: Bytes) -> Result<()>;

    /// Read a blob. `None` if nothing is stored at `path`.
    async fn get(&self, path: &str) -> Result<Option<Bytes>>;

    /// Remove a blob. Returns whether it existed.
    async fn delete(&self, path: &str) -> Result<bool>;

    /// Whether a blob exists at `path`.
    async fn exists(&self, path: &str) -> Result<bool>;
}

#[async_trait]
impl<T: BlobStore + ?Sized> BlobStore for Arc<T> {
    async fn put(&self, path: &str, data: Bytes) -> Result<()> {
        (**self).put(path, data).await
    }

    async fn get(&self, path: &str) -> Result<Option<Bytes>> {
        (**self).get(path).await
    }

    async fn delete(&self, path: &str) -> Result<bool> {
        (**self).delete(path).await
    }

    async fn exists(&self, path: &str) -> Result<bool> {
        (**self).exists(path).await
    }
}

/// Check that `path` is relative and stays beneath the root.
fn validate_path(path: &str) -> Result<&Path> {
    let candidate = Path::new(path);

    if path.is_empty() {
        return Err(StoreError::InvalidPath("empty path".into()));
    }

    for component in candidate.components() {
        match component {
            Component::Normal(_) => {}
            _ => return Err(StoreError::InvalidPath(path.to_string())),
        }
    }

    Ok(candidate)
}

// ─────────────────────────────────────────────────────────────────────────────
// Filesystem
// ─────────────────────────────────────────────────────────────────────────────

/// Blobs stored as files under a root directory.
///
/// Writes go to a temporary sibling and are renamed into place, so a reader
/// never observes a half-written blob.
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    /// Use `root` as the blob directory, creating it if needed.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// The root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> Result<PathBuf> {
        Ok(self.root.join(validate_path(path)?))
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn put(&self, path: &str, data: Bytes) -> Result<()> {
        let target = self.resolve(path)?;
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).await?;
        }

        let mut tmp = target.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        if let Err(e) = write_then_rename(&tmp, &target, &data).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(e.into());
        }

        debug!(path, bytes = data.len(), "stored blob");
        Ok(())
    }

    async fn get(&self, path: &str) -> Result<Option<Bytes>> {
        let target = self.resolve(path)?;
        match fs::read(&target).await {
            Ok(data) => Ok(Some(Bytes::from(data))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, path: &str) -> Result<bool> {
        let target = self.resolve(path)?;
        match fs::remove_file(&target).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn exists(&self, path: &str) -> Result<bool> {
        let target = self.resolve(path)?;
        Ok(fs::try_exists(&target).await?)
    }
}

async fn write_then_rename(tmp: &Path, target: &Path, data: &[u8]) -> std::io::Result<()> {
    let mut file = fs::File::create(tmp).await?;
    file.write_all(data).await?;
    file.sync_all().await?;
    drop(file);

    fs::rename(tmp, target).await
}

// ─────────────────────────────────────────────────────────────────────────────
// Memory
// ─────────────────────────────────────────────────────────────────────────────

/// Blobs held in a map. For tests.
#[derive(Default)]
pub struct MemoryBlobStore {
    blobs: RwLock<HashMap<String, Bytes>>,
}

impl MemoryBlobStore {
    /// Create an empty blob store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored blobs.
    pub fn len(&self) -> usize {
        self.blobs.read().map(|b| b.len()).unwrap_or(0)
    }

    /// Whether no blobs are stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn poisoned<T>(e: std::sync::PoisonError<T>) -> StoreError {
    StoreError::Poisoned(e.to_string())
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put(&self, path: &str, data: Bytes) -> Result<()> {
        validate_path(path)?;
        self.blobs
            .write()
            .map_err(poisoned)?
            .insert(path.to_string(), data);
        Ok(())
    }

    async fn get(&self, path: &str) -> Result<Option<Bytes>> {
        validate_path(path)?;
        Ok(self.blobs.read().map_err(poisoned)?.get(path).cloned())
    }

    async fn delete(&self, path: &str) -> Result<bool> {
        validate_path(path)?;
        Ok(self.blobs.write().map_err(poisoned)?.remove(path).is_some())
    }

    async fn exists(&self, path: &str) -> Result<bool> {
        validate_path(path)?;
        Ok(self.blobs.read().map_err(poisoned)?.contains_key(path))
    }
}
