//! Identity and key directory.
//!
//! Registration creates a user's X25519 identity, seals the private half
//! under their password, and stores both halves. Afterwards the directory
//! serves public keys to anyone who wants to share with the user, and the
//! sealed private key back to the user themselves.

use std::sync::Arc;

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::{Algorithm, Argon2, Params, Version};
use rand::RngCore;
use tracing::info;

use lockbox_core::{
    now_millis, recover_identity, register_identity, IdentityKeypair, KdfParams, PublicKey, User,
    UserId,
};
use lockbox_store::{InsertResult, Store};

use crate::error::{AccessError, Result};

/// Fields supplied at registration.
#[derive(Clone)]
pub struct NewUser {
    pub email: String,
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for NewUser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NewUser")
            .field("email", &self.email)
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

/// How to find a user in the directory.
#[derive(Debug, Clone, Copy)]
pub enum UserLookup<'a> {
    Id(UserId),
    Email(&'a str),
}

/// A user's distributable public key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublicKeyRecord {
    pub user_id: UserId,
    pub public_key: PublicKey,
}

/// Trim and lowercase an email so lookups are case-insensitive.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// The key directory.
pub struct KeyDirectory<S> {
    store: Arc<S>,
    kdf: KdfParams,
}

impl<S: Store> KeyDirectory<S> {
    /// Create a directory over `store`, using `kdf` for password hashing and
    /// private-key sealing.
    pub fn new(store: Arc<S>, kdf: KdfParams) -> Self {
        Self { store, kdf }
    }

    /// Register a user: hash the password, create and seal an identity,
    /// persist the record.
    pub async fn register_user(&self, new_user: NewUser) -> Result<User> {
        let email = normalize_email(&new_user.email);
        let username = new_user.username.trim().to_string();

        if email.is_empty() || !email.contains('@') {
            return Err(AccessError::Validation("email address is invalid".into()));
        }
        if username.is_empty() {
            return Err(AccessError::Validation("username is required".into()));
        }
        if new_user.password.is_empty() {
            return Err(AccessError::Validation("password is required".into()));
        }

        if self.store.get_user_by_email(&email).await?.is_some() {
            return Err(AccessError::Conflict(format!("email {} is taken", email)));
        }

        let kdf = self.kdf;
        let password = new_user.password;
        let (password_hash, identity) = blocking(move || {
            let hash = hash_password(&password, &kdf)?;
            let identity = register_identity(&password, &kdf)?;
            Ok((hash, identity))
        })
        .await?;

        let user = User {
            id: UserId::new(),
            email,
            username,
            public_key: identity.public_key,
            encrypted_private_key: identity.encrypted_private_key,
            password_hash,
            created_at: now_millis(),
            key_kdf: kdf,
        };

        // The pre-check above is advisory; the unique index decides races.
        match self.store.insert_user(&user).await? {
            InsertResult::Inserted => {
                info!(user_id = %user.id, "registered user");
                Ok(user)
            }
            InsertResult::Conflict => Err(AccessError::Conflict(format!(
                "email {} is taken",
                user.email
            ))),
        }
    }

    /// Look up a user's public key. Read-only.
    pub async fn lookup_public_key(&self, lookup: UserLookup<'_>) -> Result<PublicKeyRecord> {
        let user = match lookup {
            UserLookup::Id(id) => self.store.get_user(&id).await?,
            UserLookup::Email(email) => {
                self.store
                    .get_user_by_email(&normalize_email(email))
                    .await?
            }
        };

        user.map(|u| PublicKeyRecord {
            user_id: u.id,
            public_key: u.public_key,
        })
        .ok_or_else(|| AccessError::NotFound("user".into()))
    }

    /// Look up a full user record by id.
    pub async fn get_user(&self, id: &UserId) -> Result<User> {
        self.store
            .get_user(id)
            .await?
            .ok_or_else(|| AccessError::NotFound(format!("user {}", id)))
    }

    /// Check a login. An unknown email and a wrong password are
    /// indistinguishable to the caller.
    pub async fn verify_password(&self, email: &str, password: &str) -> Result<User> {
        let user = self
            .store
            .get_user_by_email(&normalize_email(email))
            .await?
            .ok_or(AccessError::InvalidCredentials)?;

        let stored = user.password_hash.clone();
        let password = password.to_string();
        let matches = blocking(move || {
            let parsed = PasswordHash::new(&stored)
                .map_err(|e| AccessError::PasswordHash(e.to_string()))?;
            Ok(Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok())
        })
        .await?;

        if matches {
            Ok(user)
        } else {
            Err(AccessError::InvalidCredentials)
        }
    }

    /// Unseal a user's private key with their password.
    ///
    /// Uses the parameters recorded at registration, not the directory's
    /// current ones. A wrong password fails with an `Unauthenticated`-kind
    /// error.
    pub async fn recover_private_key(
        &self,
        user_id: &UserId,
        password: &str,
    ) -> Result<IdentityKeypair> {
        let user = self.get_user(user_id).await?;

        let kdf = user.key_kdf;
        let password = password.to_string();
        blocking(move || {
            Ok(recover_identity(
                &user.encrypted_private_key,
                &password,
                &kdf,
            )?)
        })
        .await
    }
}

/// Hash a password into an Argon2id PHC string.
fn hash_password(password: &str, kdf: &KdfParams) -> Result<String> {
    let params = Params::new(kdf.memory_kib, kdf.iterations, kdf.parallelism, None)
        .map_err(|e| AccessError::PasswordHash(e.to_string()))?;

    let mut salt_bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut salt_bytes);
    let salt = SaltString::encode_b64(&salt_bytes)
        .map_err(|e| AccessError::PasswordHash(e.to_string()))?;

    Argon2::new(Algorithm::Argon2id, Version::V0x13, params)
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AccessError::PasswordHash(e.to_string()))
}

/// Run memory-hard key derivation off the async runtime.
async fn blocking<F, T>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| AccessError::PasswordHash(format!("blocking task failed: {}", e)))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use lockbox_core::{ErrorKind, WrappedKey, SymmetricKey};
    use lockbox_store::MemoryStore;

    fn fast_kdf() -> KdfParams {
        KdfParams {
            memory_kib: 64,
            iterations: 1,
            parallelism: 1,
        }
    }

    fn directory() -> KeyDirectory<MemoryStore> {
        KeyDirectory::new(Arc::new(MemoryStore::new()), fast_kdf())
    }

    fn alice() -> NewUser {
        NewUser {
            email: "  Alice@Example.com ".to_string(),
            username: "alice".to_string(),
            password: "correct horse".to_string(),
        }
    }

    #[tokio::test]
    async fn test_register_and_lookup() {
        let dir = directory();
        let user = dir.register_user(alice()).await.unwrap();

        assert_eq!(user.email, "alice@example.com");
        assert!(user.password_hash.starts_with("$argon2id$"));

        let by_email = dir
            .lookup_public_key(UserLookup::Email("ALICE@example.com"))
            .await
            .unwrap();
        let by_id = dir.lookup_public_key(UserLookup::Id(user.id)).await.unwrap();

        assert_eq!(by_email, by_id);
        assert_eq!(by_email.public_key, user.public_key);
    }

    #[tokio::test]
    async fn test_duplicate_email_is_conflict() {
        let dir = directory();
        dir.register_user(alice()).await.unwrap();

        let err = dir.register_user(alice()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
    }

    #[tokio::test]
    async fn test_register_validation() {
        let dir = directory();
        let err = dir
            .register_user(NewUser {
                email: "not-an-email".into(),
                ..alice()
            })
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        let err = dir
            .register_user(NewUser {
                password: String::new(),
                ..alice()
            })
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[tokio::test]
    async fn test_lookup_unknown_is_not_found() {
        let dir = directory();
        let err = dir
            .lookup_public_key(UserLookup::Email("nobody@example.com"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_verify_password() {
        let dir = directory();
        let user = dir.register_user(alice()).await.unwrap();

        let ok = dir
            .verify_password("alice@example.com", "correct horse")
            .await
            .unwrap();
        assert_eq!(ok.id, user.id);

        let wrong = dir
            .verify_password("alice@example.com", "battery staple")
            .await
            .unwrap_err();
        let unknown = dir
            .verify_password("eve@example.com", "correct horse")
            .await
            .unwrap_err();

        assert_eq!(wrong.kind(), ErrorKind::Unauthenticated);
        assert_eq!(unknown.kind(), ErrorKind::Unauthenticated);
        assert_eq!(wrong.to_string(), unknown.to_string());
    }

    #[tokio::test]
    async fn test_recovered_key_opens_wrapped_content_key() {
        let dir = directory();
        let user = dir.register_user(alice()).await.unwrap();

        let content_key = SymmetricKey::generate();
        let wrapped = WrappedKey::seal(&content_key, &user.public_key).unwrap();

        let keypair = dir
            .recover_private_key(&user.id, "correct horse")
            .await
            .unwrap();
        assert_eq!(keypair.public_key(), user.public_key);
        assert_eq!(wrapped.open(&keypair).unwrap(), content_key);

        let err = dir
            .recover_private_key(&user.id, "wrong")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unauthenticated);
    }

    #[tokio::test]
    async fn test_private_key_survives_kdf_cost_change() {
        let store = Arc::new(MemoryStore::new());
        let before = KeyDirectory::new(Arc::clone(&store), fast_kdf());
        let user = before.register_user(alice()).await.unwrap();
        assert_eq!(user.key_kdf, fast_kdf());

        let after = KeyDirectory::new(
            store,
            KdfParams {
                memory_kib: 128,
                iterations: 2,
                parallelism: 1,
            },
        );

        let keypair = after
            .recover_private_key(&user.id, "correct horse")
            .await
            .unwrap();
        assert_eq!(keypair.public_key(), user.public_key);
        after
            .verify_password("alice@example.com", "correct horse")
            .await
            .unwrap();
    }
}
