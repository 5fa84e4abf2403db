//! SQLite implementation of the Store trait.
//!
//! This is the primary storage backend for Lockbox. It uses rusqlite with
//! bundled SQLite, wrapped in async via tokio::spawn_blocking.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension};

use lockbox_core::{
    AccessGrant, File, FileId, KdfParams, PublicKey, RefreshToken, User, UserId, WrappedSecret,
};

use crate::error::{Result, StoreError};
use crate::migration;
use crate::traits::{InsertResult, KeyRotation, RotateResult, Store};

/// SQLite-based store implementation.
///
/// Thread-safe via internal Mutex. All operations use spawn_blocking
/// to avoid blocking the async runtime. The single connection serializes
/// writers, and the schema's primary keys arbitrate racing inserts.
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open a SQLite database at the given path.
    ///
    /// Creates the file and runs migrations if it doesn't exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let mut conn = Connection::open(path)?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory SQLite database.
    ///
    /// Useful for testing.
    pub fn open_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run a blocking operation on the connection off the async runtime.
    async fn run<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);

        tokio::task::spawn_blocking(move || {
            let mut conn = conn
                .lock()
                .map_err(|e| StoreError::Poisoned(e.to_string()))?;
            f(&mut conn)
        })
        .await
        .map_err(|e| StoreError::Task(e.to_string()))?
    }
}

/// Whether an error is the schema rejecting a duplicate key.
fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
                || e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}

fn conversion_error(idx: usize, e: lockbox_core::CoreError) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Blob, Box::new(e))
}

fn user_id_at(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<UserId> {
    let bytes: Vec<u8> = row.get(idx)?;
    UserId::try_from(bytes.as_slice()).map_err(|e| conversion_error(idx, e))
}

fn file_id_at(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<FileId> {
    let bytes: Vec<u8> = row.get(idx)?;
    FileId::try_from(bytes.as_slice()).map_err(|e| conversion_error(idx, e))
}

const USER_COLUMNS: &str = "id, email, username, public_key, encrypted_private_key, password_hash, \
     created_at, kdf_memory_kib, kdf_iterations, kdf_parallelism";

fn row_to_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
    let public_key: Vec<u8> = row.get(3)?;
    let public_key: [u8; 32] = public_key
        .try_into()
        .map_err(|_| rusqlite::Error::InvalidColumnType(3, "public_key".into(), Type::Blob))?;

    Ok(User {
        id: user_id_at(row, 0)?,
        email: row.get(1)?,
        username: row.get(2)?,
        public_key: PublicKey::from_bytes(public_key),
        encrypted_private_key: WrappedSecret::new(row.get::<_, String>(4)?),
        password_hash: row.get(5)?,
        created_at: row.get(6)?,
        key_kdf: KdfParams {
            memory_kib: row.get(7)?,
            iterations: row.get(8)?,
            parallelism: row.get(9)?,
        },
    })
}

const FILE_COLUMNS: &str = "id, owner_id, filename, storage_path, size_bytes, encrypted_metadata, \
                            content_key_version, created_at";

fn row_to_file(row: &rusqlite::Row<'_>) -> rusqlite::Result<File> {
    Ok(File {
        id: file_id_at(row, 0)?,
        owner_id: user_id_at(row, 1)?,
        filename: row.get(2)?,
        storage_path: row.get(3)?,
        size_bytes: row.get::<_, i64>(4)? as u64,
        encrypted_metadata: row.get(5)?,
        content_key_version: row.get(6)?,
        created_at: row.get(7)?,
    })
}

const GRANT_COLUMNS: &str = "file_id, recipient_id, wrapped_key, created_at";

fn row_to_grant(row: &rusqlite::Row<'_>) -> rusqlite::Result<AccessGrant> {
    Ok(AccessGrant {
        file_id: file_id_at(row, 0)?,
        recipient_id: user_id_at(row, 1)?,
        wrapped_key: row.get(2)?,
        created_at: row.get(3)?,
    })
}

fn row_to_refresh_token(row: &rusqlite::Row<'_>) -> rusqlite::Result<RefreshToken> {
    Ok(RefreshToken {
        token: row.get(0)?,
        user_id: user_id_at(row, 1)?,
        created_at: row.get(2)?,
        expires_at: row.get(3)?,
        revoked_at: row.get(4)?,
    })
}

fn insert_grant_row(conn: &Connection, grant: &AccessGrant) -> rusqlite::Result<usize> {
    conn.execute(
        "INSERT INTO access_grants (file_id, recipient_id, wrapped_key, created_at)
         VALUES (?1, ?2, ?3, ?4)",
        params![
            grant.file_id.as_bytes().as_slice(),
            grant.recipient_id.as_bytes().as_slice(),
            grant.wrapped_key,
            grant.created_at,
        ],
    )
}

#[async_trait]
impl Store for SqliteStore {
    async fn insert_user(&self, user: &User) -> Result<InsertResult> {
        let user = user.clone();

        self.run(move |conn| {
            let inserted = conn.execute(
                "INSERT INTO users (
                    id, email, username, public_key, encrypted_private_key,
                    password_hash, created_at, kdf_memory_kib, kdf_iterations,
                    kdf_parallelism
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    user.id.as_bytes().as_slice(),
                    user.email,
                    user.username,
                    user.public_key.as_bytes().as_slice(),
                    user.encrypted_private_key.as_str(),
                    user.password_hash,
                    user.created_at,
                    user.key_kdf.memory_kib,
                    user.key_kdf.iterations,
                    user.key_kdf.parallelism,
                ],
            );

            match inserted {
                Ok(_) => Ok(InsertResult::Inserted),
                Err(e) if is_unique_violation(&e) => Ok(InsertResult::Conflict),
                Err(e) => Err(e.into()),
            }
        })
        .await
    }

    async fn get_user(&self, id: &UserId) -> Result<Option<User>> {
        let id = *id;

        self.run(move |conn| {
            conn.query_row(
                &format!("SELECT {} FROM users WHERE id = ?1", USER_COLUMNS),
                params![id.as_bytes().as_slice()],
                row_to_user,
            )
            .optional()
            .map_err(StoreError::from)
        })
        .await
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let email = email.to_string();

        self.run(move |conn| {
            conn.query_row(
                &format!("SELECT {} FROM users WHERE email = ?1", USER_COLUMNS),
                params![email],
                row_to_user,
            )
            .optional()
            .map_err(StoreError::from)
        })
        .await
    }

    async fn delete_user(&self, id: &UserId) -> Result<bool> {
        let id = *id;

        self.run(move |conn| {
            let deleted = conn.execute(
                "DELETE FROM users WHERE id = ?1",
                params![id.as_bytes().as_slice()],
            )?;
            Ok(deleted > 0)
        })
        .await
    }

    async fn insert_file(&self, file: &File) -> Result<()> {
        let file = file.clone();

        self.run(move |conn| {
            conn.execute(
                "INSERT INTO files (
                    id, owner_id, filename, storage_path, size_bytes,
                    encrypted_metadata, content_key_version, created_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    file.id.as_bytes().as_slice(),
                    file.owner_id.as_bytes().as_slice(),
                    file.filename,
                    file.storage_path,
                    file.size_bytes as i64,
                    file.encrypted_metadata,
                    file.content_key_version,
                    file.created_at,
                ],
            )?;
            Ok(())
        })
        .await
    }

    async fn get_file(&self, id: &FileId) -> Result<Option<File>> {
        let id = *id;

        self.run(move |conn| {
            conn.query_row(
                &format!("SELECT {} FROM files WHERE id = ?1", FILE_COLUMNS),
                params![id.as_bytes().as_slice()],
                row_to_file,
            )
            .optional()
            .map_err(StoreError::from)
        })
        .await
    }

    async fn list_files_by_owner(&self, owner: &UserId) -> Result<Vec<File>> {
        let owner = *owner;

        self.run(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM files WHERE owner_id = ?1 ORDER BY created_at, id",
                FILE_COLUMNS
            ))?;

            let files = stmt
                .query_map(params![owner.as_bytes().as_slice()], row_to_file)?
                .collect::<rusqlite::Result<Vec<_>>>()?;

            Ok(files)
        })
        .await
    }

    async fn list_files(&self) -> Result<Vec<File>> {
        self.run(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM files ORDER BY created_at, id",
                FILE_COLUMNS
            ))?;

            let files = stmt
                .query_map([], row_to_file)?
                .collect::<rusqlite::Result<Vec<_>>>()?;

            Ok(files)
        })
        .await
    }

    async fn delete_file(&self, id: &FileId) -> Result<bool> {
        let id = *id;

        self.run(move |conn| {
            let tx = conn.transaction()?;

            tx.execute(
                "DELETE FROM access_grants WHERE file_id = ?1",
                params![id.as_bytes().as_slice()],
            )?;
            let deleted = tx.execute(
                "DELETE FROM files WHERE id = ?1",
                params![id.as_bytes().as_slice()],
            )?;

            tx.commit()?;
            Ok(deleted > 0)
        })
        .await
    }

    async fn rotate_file_key(&self, rotation: &KeyRotation) -> Result<RotateResult> {
        let rotation = rotation.clone();

        self.run(move |conn| {
            let tx = conn.transaction()?;
            let id = rotation.file_id.as_bytes().to_vec();

            let current: Option<u32> = tx
                .query_row(
                    "SELECT content_key_version FROM files WHERE id = ?1",
                    params![id],
                    |row| row.get(0),
                )
                .optional()?;

            let current = match current {
                Some(v) => v,
                None => return Ok(RotateResult::NotFound),
            };
            if current != rotation.expected_version {
                return Ok(RotateResult::VersionMismatch { current });
            }

            let version = current + 1;
            tx.execute(
                "UPDATE files SET content_key_version = ?2, encrypted_metadata = ?3
                 WHERE id = ?1",
                params![id, version, rotation.encrypted_metadata],
            )?;
            tx.execute("DELETE FROM access_grants WHERE file_id = ?1", params![id])?;
            for grant in &rotation.grants {
                insert_grant_row(&tx, grant)?;
            }

            tx.commit()?;
            Ok(RotateResult::Rotated { version })
        })
        .await
    }

    async fn insert_grant(&self, grant: &AccessGrant) -> Result<InsertResult> {
        let grant = grant.clone();

        self.run(move |conn| match insert_grant_row(conn, &grant) {
            Ok(_) => Ok(InsertResult::Inserted),
            Err(e) if is_unique_violation(&e) => Ok(InsertResult::Conflict),
            Err(e) => Err(e.into()),
        })
        .await
    }

    async fn get_grant(
        &self,
        file_id: &FileId,
        recipient_id: &UserId,
    ) -> Result<Option<AccessGrant>> {
        let (file_id, recipient_id) = (*file_id, *recipient_id);

        self.run(move |conn| {
            conn.query_row(
                &format!(
                    "SELECT {} FROM access_grants WHERE file_id = ?1 AND recipient_id = ?2",
                    GRANT_COLUMNS
                ),
                params![
                    file_id.as_bytes().as_slice(),
                    recipient_id.as_bytes().as_slice()
                ],
                row_to_grant,
            )
            .optional()
            .map_err(StoreError::from)
        })
        .await
    }

    async fn delete_grant(&self, file_id: &FileId, recipient_id: &UserId) -> Result<bool> {
        let (file_id, recipient_id) = (*file_id, *recipient_id);

        self.run(move |conn| {
            let deleted = conn.execute(
                "DELETE FROM access_grants WHERE file_id = ?1 AND recipient_id = ?2",
                params![
                    file_id.as_bytes().as_slice(),
                    recipient_id.as_bytes().as_slice()
                ],
            )?;
            Ok(deleted > 0)
        })
        .await
    }

    async fn grants_for_file(&self, file_id: &FileId) -> Result<Vec<AccessGrant>> {
        let file_id = *file_id;

        self.run(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM access_grants WHERE file_id = ?1 ORDER BY created_at, recipient_id",
                GRANT_COLUMNS
            ))?;

            let grants = stmt
                .query_map(params![file_id.as_bytes().as_slice()], row_to_grant)?
                .collect::<rusqlite::Result<Vec<_>>>()?;

            Ok(grants)
        })
        .await
    }

    async fn grants_for_user(&self, recipient_id: &UserId) -> Result<Vec<AccessGrant>> {
        let recipient_id = *recipient_id;

        self.run(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM access_grants WHERE recipient_id = ?1 ORDER BY created_at, file_id",
                GRANT_COLUMNS
            ))?;

            let grants = stmt
                .query_map(params![recipient_id.as_bytes().as_slice()], row_to_grant)?
                .collect::<rusqlite::Result<Vec<_>>>()?;

            Ok(grants)
        })
        .await
    }

    async fn insert_refresh_token(&self, token: &RefreshToken) -> Result<()> {
        let token = token.clone();

        self.run(move |conn| {
            conn.execute(
                "INSERT INTO refresh_tokens (token, user_id, created_at, expires_at, revoked_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    token.token,
                    token.user_id.as_bytes().as_slice(),
                    token.created_at,
                    token.expires_at,
                    token.revoked_at,
                ],
            )?;
            Ok(())
        })
        .await
    }

    async fn get_refresh_token(&self, token: &str) -> Result<Option<RefreshToken>> {
        let token = token.to_string();

        self.run(move |conn| {
            conn.query_row(
                "SELECT token, user_id, created_at, expires_at, revoked_at
                 FROM refresh_tokens WHERE token = ?1",
                params![token],
                row_to_refresh_token,
            )
            .optional()
            .map_err(StoreError::from)
        })
        .await
    }

    async fn revoke_refresh_token(&self, token: &str, at: i64) -> Result<bool> {
        let token = token.to_string();

        self.run(move |conn| {
            let updated = conn.execute(
                "UPDATE refresh_tokens SET revoked_at = COALESCE(revoked_at, ?2)
                 WHERE token = ?1",
                params![token, at],
            )?;
            Ok(updated > 0)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lockbox_core::IdentityKeypair;

    fn make_user(email: &str) -> User {
        User {
            id: UserId::new(),
            email: email.to_string(),
            username: email.split('@').next().unwrap_or_default().to_string(),
            public_key: IdentityKeypair::generate().public_key(),
            encrypted_private_key: WrappedSecret::new("c2VhbGVk"),
            password_hash: "$argon2id$placeholder".to_string(),
            created_at: 1_000,
            key_kdf: KdfParams {
                memory_kib: 64,
                iterations: 1,
                parallelism: 1,
            },
        }
    }

    fn make_file(owner: UserId) -> File {
        File {
            id: FileId::new(),
            owner_id: owner,
            filename: "report.pdf".to_string(),
            storage_path: "uploads/report.pdf".to_string(),
            size_bytes: 5000,
            encrypted_metadata: r#"{"iv":"a","salt":"b","algorithm":"AES-GCM"}"#.to_string(),
            content_key_version: 1,
            created_at: 2_000,
        }
    }

    fn make_grant(file_id: FileId, recipient_id: UserId, key: &str) -> AccessGrant {
        AccessGrant {
            file_id,
            recipient_id,
            wrapped_key: key.to_string(),
            created_at: 3_000,
        }
    }

    #[tokio::test]
    async fn test_insert_and_get_user() {
        let store = SqliteStore::open_memory().unwrap();
        let user = make_user("alice@example.com");

        assert_eq!(store.insert_user(&user).await.unwrap(), InsertResult::Inserted);

        assert_eq!(store.get_user(&user.id).await.unwrap(), Some(user.clone()));
        assert_eq!(
            store.get_user_by_email("alice@example.com").await.unwrap(),
            Some(user)
        );
    }

    #[tokio::test]
    async fn test_duplicate_email_conflicts() {
        let store = SqliteStore::open_memory().unwrap();
        store.insert_user(&make_user("a@example.com")).await.unwrap();

        let result = store.insert_user(&make_user("a@example.com")).await.unwrap();
        assert_eq!(result, InsertResult::Conflict);
    }

    #[tokio::test]
    async fn test_file_roundtrip_and_owner_listing() {
        let store = SqliteStore::open_memory().unwrap();
        let owner = UserId::new();
        let file = make_file(owner);

        store.insert_file(&file).await.unwrap();

        assert_eq!(store.get_file(&file.id).await.unwrap(), Some(file.clone()));
        assert_eq!(store.list_files_by_owner(&owner).await.unwrap(), vec![file]);
        assert!(store.list_files_by_owner(&UserId::new()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_grant_is_conflict_and_keeps_first_key() {
        let store = SqliteStore::open_memory().unwrap();
        let file_id = FileId::new();
        let recipient = UserId::new();

        let first = store
            .insert_grant(&make_grant(file_id, recipient, "k1"))
            .await
            .unwrap();
        let second = store
            .insert_grant(&make_grant(file_id, recipient, "k2"))
            .await
            .unwrap();

        assert_eq!(first, InsertResult::Inserted);
        assert_eq!(second, InsertResult::Conflict);

        let stored = store.get_grant(&file_id, &recipient).await.unwrap().unwrap();
        assert_eq!(stored.wrapped_key, "k1");
    }

    #[tokio::test]
    async fn test_concurrent_duplicate_grants_yield_one_success() {
        let store = Arc::new(SqliteStore::open_memory().unwrap());
        let file_id = FileId::new();
        let recipient = UserId::new();

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = Arc::clone(&store);
                tokio::spawn(async move {
                    store
                        .insert_grant(&make_grant(file_id, recipient, &format!("k{}", i)))
                        .await
                        .unwrap()
                })
            })
            .collect();

        let mut inserted = 0;
        for handle in handles {
            if handle.await.unwrap() == InsertResult::Inserted {
                inserted += 1;
            }
        }

        assert_eq!(inserted, 1);
        assert_eq!(store.grants_for_file(&file_id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_delete_grant_is_idempotent() {
        let store = SqliteStore::open_memory().unwrap();
        let file_id = FileId::new();
        let recipient = UserId::new();

        store
            .insert_grant(&make_grant(file_id, recipient, "k"))
            .await
            .unwrap();

        assert!(store.delete_grant(&file_id, &recipient).await.unwrap());
        assert!(!store.delete_grant(&file_id, &recipient).await.unwrap());
        assert!(store.get_grant(&file_id, &recipient).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_file_removes_its_grants() {
        let store = SqliteStore::open_memory().unwrap();
        let file = make_file(UserId::new());
        let other = make_file(UserId::new());
        let recipient = UserId::new();

        store.insert_file(&file).await.unwrap();
        store.insert_file(&other).await.unwrap();
        store
            .insert_grant(&make_grant(file.id, recipient, "k"))
            .await
            .unwrap();
        store
            .insert_grant(&make_grant(other.id, recipient, "k"))
            .await
            .unwrap();

        assert!(store.delete_file(&file.id).await.unwrap());
        assert!(store.get_file(&file.id).await.unwrap().is_none());

        let remaining = store.grants_for_user(&recipient).await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].file_id, other.id);

        assert!(!store.delete_file(&file.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_rotation_replaces_grants_and_bumps_version() {
        let store = SqliteStore::open_memory().unwrap();
        let file = make_file(UserId::new());
        let kept = UserId::new();
        let dropped = UserId::new();

        store.insert_file(&file).await.unwrap();
        store.insert_grant(&make_grant(file.id, kept, "old")).await.unwrap();
        store.insert_grant(&make_grant(file.id, dropped, "old")).await.unwrap();

        let rotation = KeyRotation {
            file_id: file.id,
            expected_version: 1,
            encrypted_metadata: "v2-meta".to_string(),
            grants: vec![make_grant(file.id, kept, "new")],
        };

        assert_eq!(
            store.rotate_file_key(&rotation).await.unwrap(),
            RotateResult::Rotated { version: 2 }
        );

        let stored = store.get_file(&file.id).await.unwrap().unwrap();
        assert_eq!(stored.content_key_version, 2);
        assert_eq!(stored.encrypted_metadata, "v2-meta");

        let grants = store.grants_for_file(&file.id).await.unwrap();
        assert_eq!(grants.len(), 1);
        assert_eq!(grants[0].recipient_id, kept);
        assert_eq!(grants[0].wrapped_key, "new");

        // Replaying the same rotation is rejected as stale.
        assert_eq!(
            store.rotate_file_key(&rotation).await.unwrap(),
            RotateResult::VersionMismatch { current: 2 }
        );
    }

    #[tokio::test]
    async fn test_rotation_of_missing_file() {
        let store = SqliteStore::open_memory().unwrap();
        let rotation = KeyRotation {
            file_id: FileId::new(),
            expected_version: 1,
            encrypted_metadata: String::new(),
            grants: vec![],
        };
        assert_eq!(
            store.rotate_file_key(&rotation).await.unwrap(),
            RotateResult::NotFound
        );
    }

    #[tokio::test]
    async fn test_refresh_token_revocation_is_retained() {
        let store = SqliteStore::open_memory().unwrap();
        let token = RefreshToken {
            token: "abc".to_string(),
            user_id: UserId::new(),
            created_at: 0,
            expires_at: 10_000,
            revoked_at: None,
        };
        store.insert_refresh_token(&token).await.unwrap();

        assert!(store.revoke_refresh_token("abc", 50).await.unwrap());
        assert!(store.revoke_refresh_token("abc", 90).await.unwrap());
        assert!(!store.revoke_refresh_token("missing", 90).await.unwrap());

        let stored = store.get_refresh_token("abc").await.unwrap().unwrap();
        assert_eq!(stored.revoked_at, Some(50));
    }

    #[tokio::test]
    async fn test_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lockbox.db");
        let user = make_user("persist@example.com");

        {
            let store = SqliteStore::open(&path).unwrap();
            store.insert_user(&user).await.unwrap();
        }

        let store = SqliteStore::open(&path).unwrap();
        assert_eq!(store.get_user(&user.id).await.unwrap(), Some(user));
    }
}
