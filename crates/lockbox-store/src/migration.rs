//! Database schema migrations for SQLite.
//!
//! We use a simple versioned migration system. Each migration is a SQL string
//! that transforms the schema from version N to N+1.

use lockbox_core::now_millis;
use rusqlite::Connection;

use crate::error::{Result, StoreError};

/// Current schema version.
pub const CURRENT_VERSION: u32 = 2;

/// Initialize or migrate the database schema.
///
/// This function is idempotent - it can be called multiple times safely.
pub fn migrate(conn: &mut Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at INTEGER NOT NULL
        )",
        [],
    )?;

    let current: u32 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
        [],
        |row| row.get(0),
    )?;

    if current < CURRENT_VERSION {
        let tx = conn.transaction()?;

        for version in (current + 1)..=CURRENT_VERSION {
            apply_migration(&tx, version)?;

            tx.execute(
                "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
                rusqlite::params![version, now_millis()],
            )?;
        }

        tx.commit()?;
    }

    Ok(())
}

/// Apply a specific migration version.
fn apply_migration(conn: &Connection, version: u32) -> Result<()> {
    match version {
        1 => apply_v1(conn),
        2 => apply_v2(conn),
        _ => Err(StoreError::Migration(format!(
            "unknown migration version: {}",
            version
        ))),
    }
}

/// Migration v1: Initial schema.
fn apply_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        -- Users and their key material
        CREATE TABLE users (
            id BLOB PRIMARY KEY,                  -- 16 bytes, UUID
            email TEXT NOT NULL UNIQUE,           -- normalized (trimmed, lowercase)
            username TEXT NOT NULL,
            public_key BLOB NOT NULL,             -- 32 bytes, X25519
            encrypted_private_key TEXT NOT NULL,  -- base64 password envelope
            password_hash TEXT NOT NULL,          -- Argon2id PHC string
            created_at INTEGER NOT NULL
        );

        -- File records; the ciphertext lives in the blob store
        CREATE TABLE files (
            id BLOB PRIMARY KEY,
            owner_id BLOB NOT NULL,
            filename TEXT NOT NULL,
            storage_path TEXT NOT NULL,
            size_bytes INTEGER NOT NULL,
            encrypted_metadata TEXT NOT NULL,
            content_key_version INTEGER NOT NULL DEFAULT 1,
            created_at INTEGER NOT NULL
        );

        -- The access-control list: one wrapped key per (file, recipient)
        CREATE TABLE access_grants (
            file_id BLOB NOT NULL,
            recipient_id BLOB NOT NULL,
            wrapped_key TEXT NOT NULL,
            created_at INTEGER NOT NULL,
            PRIMARY KEY (file_id, recipient_id)
        );

        -- Refresh tokens are revoked, never deleted
        CREATE TABLE refresh_tokens (
            token TEXT PRIMARY KEY,
            user_id BLOB NOT NULL,
            created_at INTEGER NOT NULL,
            expires_at INTEGER NOT NULL,
            revoked_at INTEGER
        );

        CREATE INDEX idx_files_owner ON files(owner_id);
        CREATE INDEX idx_grants_recipient ON access_grants(recipient_id);
        CREATE INDEX idx_refresh_tokens_user ON refresh_tokens(user_id);
        "#,
    )?;

    Ok(())
}

/// Migration v2: Argon2id parameters each private key was sealed with.
///
/// Rows written before v2 were sealed with the default parameters.
fn apply_v2(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        ALTER TABLE users ADD COLUMN kdf_memory_kib INTEGER NOT NULL DEFAULT 19456;
        ALTER TABLE users ADD COLUMN kdf_iterations INTEGER NOT NULL DEFAULT 2;
        ALTER TABLE users ADD COLUMN kdf_parallelism INTEGER NOT NULL DEFAULT 1;
        "#,
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migration_creates_tables() {
        let mut conn = Connection::open_in_memory().unwrap();
        migrate(&mut conn).unwrap();

        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<std::result::Result<Vec<_>, _>>()
            .unwrap();

        assert!(tables.contains(&"users".to_string()));
        assert!(tables.contains(&"files".to_string()));
        assert!(tables.contains(&"access_grants".to_string()));
        assert!(tables.contains(&"refresh_tokens".to_string()));
        assert!(tables.contains(&"schema_migrations".to_string()));
    }

    #[test]
    fn test_migration_idempotent() {
        let mut conn = Connection::open_in_memory().unwrap();
        migrate(&mut conn).unwrap();
        migrate(&mut conn).unwrap();
        migrate(&mut conn).unwrap();

        let version: u32 = conn
            .query_row("SELECT MAX(version) FROM schema_migrations", [], |row| {
                row.get(0)
            })
            .unwrap();
        assert_eq!(version, CURRENT_VERSION);
    }

    #[test]
    fn test_v1_users_get_default_kdf_params() {
        let conn = Connection::open_in_memory().unwrap();
        apply_v1(&conn).unwrap();
        conn.execute(
            "INSERT INTO users (id, email, username, public_key, encrypted_private_key,
                                password_hash, created_at)
             VALUES (x'00', 'a@example.com', 'a', x'00', 'sealed', 'hash', 0)",
            [],
        )
        .unwrap();

        apply_v2(&conn).unwrap();

        let params: (u32, u32, u32) = conn
            .query_row(
                "SELECT kdf_memory_kib, kdf_iterations, kdf_parallelism FROM users",
                [],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .unwrap();
        let default = lockbox_core::KdfParams::default();
        assert_eq!(
            params,
            (default.memory_kib, default.iterations, default.parallelism)
        );
    }
}
