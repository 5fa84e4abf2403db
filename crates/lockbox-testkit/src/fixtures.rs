//! Test fixtures and helpers.
//!
//! Common setup code for integration tests. The helpers play the client's
//! part of the protocol (encrypting content, wrapping keys, unwrapping them
//! again) so tests can check end-to-end that only the right people can read.

use std::path::Path;
use std::time::Duration;

use bytes::Bytes;

use lockbox::{
    Download, File, Lockbox, LockboxConfig, NewUser, Result, SessionConfig, ShareRequest, Upload,
    UploadMetadata,
};
use lockbox_core::{
    recover_identity, AccessGrant, AeadNonce, IdentityKeypair, SymmetricKey, User, WrappedKey,
};
use lockbox_session::Session;
use lockbox_store::{BlobStore, FsBlobStore, MemoryBlobStore, MemoryStore, SqliteStore, Store};

use crate::generators::fast_kdf;

/// Service configuration for tests: cheap Argon2id and a fixed secret.
pub fn test_config() -> LockboxConfig {
    LockboxConfig {
        session: SessionConfig {
            secret: b"lockbox test secret".to_vec(),
            access_ttl: Duration::from_secs(60 * 60),
            refresh_ttl: Duration::from_secs(24 * 60 * 60),
        },
        kdf: fast_kdf(),
        ..LockboxConfig::default()
    }
}

/// A registered, logged-in user together with their client-side secrets.
#[derive(Debug)]
pub struct TestUser {
    pub user: User,
    pub password: String,
    pub keypair: IdentityKeypair,
    pub session: Session,
}

impl TestUser {
    /// The `Authorization` header value for this user.
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.session.access_token)
    }
}

/// A file uploaded through [`TestFixture::upload`], with the key that
/// encrypted it.
#[derive(Debug)]
pub struct UploadedFile {
    pub file: File,
    pub content_key: SymmetricKey,
}

/// A Lockbox service plus client-side helpers.
pub struct TestFixture<S: Store, B: BlobStore> {
    pub lockbox: Lockbox<S, B>,
}

impl TestFixture<MemoryStore, MemoryBlobStore> {
    /// A fixture backed entirely by memory.
    pub fn new() -> Self {
        Self {
            lockbox: Lockbox::new(MemoryStore::new(), MemoryBlobStore::new(), test_config()),
        }
    }
}

impl Default for TestFixture<MemoryStore, MemoryBlobStore> {
    fn default() -> Self {
        Self::new()
    }
}

impl TestFixture<SqliteStore, FsBlobStore> {
    /// A fixture backed by SQLite and the filesystem under `dir`.
    pub fn on_disk(dir: &Path) -> lockbox_store::Result<Self> {
        let store = SqliteStore::open(dir.join("lockbox.db"))?;
        let blobs = FsBlobStore::open(dir.join("blobs"))?;
        Ok(Self {
            lockbox: Lockbox::new(store, blobs, test_config()),
        })
    }
}

impl<S: Store, B: BlobStore> TestFixture<S, B> {
    /// Register `<name>@example.com`, log in, and recover the private key
    /// the way a client would.
    pub async fn register(&self, name: &str) -> Result<TestUser> {
        let password = format!("{name}-password");
        let user = self
            .lockbox
            .register(NewUser {
                email: format!("{name}@example.com"),
                username: name.to_string(),
                password: password.clone(),
            })
            .await?;

        let session = self.lockbox.login(&user.email, &password).await?;
        let keypair = recover_identity(&user.encrypted_private_key, &password, &user.key_kdf)?;

        Ok(TestUser {
            user,
            password,
            keypair,
            session,
        })
    }

    /// Encrypt `plaintext` under a fresh content key and upload it.
    ///
    /// The stored blob is `plaintext.len() + 16` bytes.
    pub async fn upload(
        &self,
        owner: &TestUser,
        filename: &str,
        plaintext: &[u8],
    ) -> Result<UploadedFile> {
        let content_key = SymmetricKey::generate();
        let nonce = AeadNonce::generate();
        let ciphertext = content_key.encrypt(plaintext, &nonce)?;

        let file = self
            .lockbox
            .upload(
                Some(&owner.bearer()),
                Upload {
                    filename: filename.to_string(),
                    content: Bytes::from(ciphertext),
                    metadata: UploadMetadata {
                        iv: hex::encode(nonce.as_bytes()),
                        salt: String::new(),
                        algorithm: "ChaCha20-Poly1305".to_string(),
                    },
                },
            )
            .await?;

        Ok(UploadedFile { file, content_key })
    }

    /// Wrap `content_key` for `recipient` (looking their public key up by
    /// email) and share the file with them as `owner`.
    pub async fn share(
        &self,
        owner: &TestUser,
        file: &File,
        recipient: &TestUser,
        content_key: &SymmetricKey,
    ) -> Result<AccessGrant> {
        let record = self.lockbox.public_key(&recipient.user.email).await?;
        let wrapped = WrappedKey::seal(content_key, &record.public_key)?;

        self.lockbox
            .share(
                Some(&owner.bearer()),
                &file.id,
                ShareRequest {
                    recipient_email: recipient.user.email.clone(),
                    wrapped_key: wrapped.encode(),
                },
            )
            .await
    }

    /// Download as `user` and decrypt.
    ///
    /// A grantee's key comes from the wrapped-key header; an owner must pass
    /// the key they kept.
    pub async fn download_plaintext(
        &self,
        user: &TestUser,
        file: &File,
        owner_key: Option<&SymmetricKey>,
    ) -> Result<Vec<u8>> {
        let download = self.lockbox.download(Some(&user.bearer()), &file.id).await?;
        decrypt_download(&download, &user.keypair, owner_key)
    }
}

/// Decrypt a download the way a client would.
pub fn decrypt_download(
    download: &Download,
    keypair: &IdentityKeypair,
    owner_key: Option<&SymmetricKey>,
) -> Result<Vec<u8>> {
    let content_key = match download.wrapped_key() {
        Some(wrapped) => WrappedKey::decode(wrapped)?.open(keypair)?,
        None => owner_key
            .cloned()
            .ok_or_else(|| lockbox::LockboxError::Validation("owner key required".into()))?,
    };

    let metadata = UploadMetadata::from_json(&download.file.encrypted_metadata)?;
    let iv: [u8; 12] = hex::decode(&metadata.iv)
        .ok()
        .and_then(|v| v.try_into().ok())
        .ok_or_else(|| lockbox::LockboxError::Validation("bad iv".into()))?;

    Ok(content_key.decrypt(&download.content, &AeadNonce::from_bytes(iv))?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_owner_round_trip() {
        let fixture = TestFixture::new();
        let alice = fixture.register("alice").await.unwrap();

        let uploaded = fixture.upload(&alice, "a.txt", b"hello").await.unwrap();
        assert_eq!(uploaded.file.size_bytes, 5 + 16);

        let plaintext = fixture
            .download_plaintext(&alice, &uploaded.file, Some(&uploaded.content_key))
            .await
            .unwrap();
        assert_eq!(plaintext, b"hello");
    }

    #[tokio::test]
    async fn test_on_disk_fixture() {
        let dir = tempfile::tempdir().unwrap();
        let fixture = TestFixture::on_disk(dir.path()).unwrap();
        let alice = fixture.register("alice").await.unwrap();
        let bob = fixture.register("bob").await.unwrap();

        let uploaded = fixture.upload(&alice, "a.txt", b"on disk").await.unwrap();
        fixture
            .share(&alice, &uploaded.file, &bob, &uploaded.content_key)
            .await
            .unwrap();

        let plaintext = fixture
            .download_plaintext(&bob, &uploaded.file, None)
            .await
            .unwrap();
        assert_eq!(plaintext, b"on disk");
    }
}
