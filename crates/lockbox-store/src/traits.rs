//! Store trait: the abstract interface for record persistence.
//!
//! This trait allows the access layer to be storage-agnostic.
//! Implementations include SQLite (primary) and in-memory (for tests).

use async_trait::async_trait;
use lockbox_core::{AccessGrant, File, FileId, RefreshToken, User, UserId};

use crate::error::Result;

/// Result of inserting a uniquely keyed record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertResult {
    /// Record was inserted.
    Inserted,
    /// The uniqueness constraint rejected the record; nothing was written.
    Conflict,
}

/// A content-key rotation to apply atomically.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyRotation {
    /// The file being rotated.
    pub file_id: FileId,
    /// The version the caller re-wrapped against.
    pub expected_version: u32,
    /// Metadata describing the re-encrypted content.
    pub encrypted_metadata: String,
    /// The complete replacement grant set.
    pub grants: Vec<AccessGrant>,
}

/// Result of applying a [`KeyRotation`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotateResult {
    /// Applied; the file now carries `version`.
    Rotated { version: u32 },
    /// The file does not exist.
    NotFound,
    /// Someone rotated first; nothing was written.
    VersionMismatch { current: u32 },
}

/// The Store trait: async interface for record persistence.
///
/// All methods are async to support both sync (SQLite) and async backends.
/// For SQLite, we use `spawn_blocking` internally to avoid blocking the runtime.
///
/// # Design Notes
///
/// - **Uniqueness is the store's job**: `insert_grant` must reject a second
///   grant for the same `(file_id, recipient_id)` atomically, so that two
///   racing inserts produce exactly one `Inserted` and one `Conflict`.
/// - **File deletion cascades**: `delete_file` removes the file's grants in
///   the same atomic step.
/// - **Refresh tokens are never deleted**: revocation only stamps `revoked_at`.
#[async_trait]
pub trait Store: Send + Sync {
    // ─────────────────────────────────────────────────────────────────────────
    // User Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Insert a user. `Conflict` if the id or email is already taken.
    async fn insert_user(&self, user: &User) -> Result<InsertResult>;

    /// Get a user by id.
    async fn get_user(&self, id: &UserId) -> Result<Option<User>>;

    /// Get a user by (normalized) email.
    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>>;

    /// Delete a user. Returns whether a row was removed.
    ///
    /// Does not cascade; cleanup of the user's files and grants is policy
    /// decided by the caller.
    async fn delete_user(&self, id: &UserId) -> Result<bool>;

    // ─────────────────────────────────────────────────────────────────────────
    // File Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Insert a file record.
    async fn insert_file(&self, file: &File) -> Result<()>;

    /// Get a file record by id.
    async fn get_file(&self, id: &FileId) -> Result<Option<File>>;

    /// List files owned by a user, oldest first.
    async fn list_files_by_owner(&self, owner: &UserId) -> Result<Vec<File>>;

    /// List every file record (for consistency sweeps).
    async fn list_files(&self) -> Result<Vec<File>>;

    /// Delete a file record and all of its grants.
    ///
    /// Returns whether the file record existed.
    async fn delete_file(&self, id: &FileId) -> Result<bool>;

    /// Atomically bump a file's key version and replace its grant set.
    async fn rotate_file_key(&self, rotation: &KeyRotation) -> Result<RotateResult>;

    // ─────────────────────────────────────────────────────────────────────────
    // Grant Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Insert a grant. `Conflict` if one exists for the pair.
    async fn insert_grant(&self, grant: &AccessGrant) -> Result<InsertResult>;

    /// Get the grant for a `(file, recipient)` pair.
    async fn get_grant(&self, file_id: &FileId, recipient_id: &UserId)
        -> Result<Option<AccessGrant>>;

    /// Delete the grant for a pair. Returns whether one existed.
    async fn delete_grant(&self, file_id: &FileId, recipient_id: &UserId) -> Result<bool>;

    /// All grants on a file, oldest first.
    async fn grants_for_file(&self, file_id: &FileId) -> Result<Vec<AccessGrant>>;

    /// All grants held by a recipient, oldest first.
    async fn grants_for_user(&self, recipient_id: &UserId) -> Result<Vec<AccessGrant>>;

    // ─────────────────────────────────────────────────────────────────────────
    // Refresh Token Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Persist a freshly issued refresh token.
    async fn insert_refresh_token(&self, token: &RefreshToken) -> Result<()>;

    /// Look up a refresh token, revoked or not.
    async fn get_refresh_token(&self, token: &str) -> Result<Option<RefreshToken>>;

    /// Stamp `revoked_at` (keeping an earlier stamp). Returns whether the
    /// token exists.
    async fn revoke_refresh_token(&self, token: &str, at: i64) -> Result<bool>;
}
