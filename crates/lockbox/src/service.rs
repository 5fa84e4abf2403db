//! The Lockbox service: one method per endpoint.
//!
//! Brings the key directory, file registry, grant vault, authorization gate
//! and session issuer together behind a single object an HTTP layer can
//! call into.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tracing::{debug, info};

use lockbox_access::{
    Access, FileRegistry, Gate, GrantVault, KeyDirectory, NewUser, PublicKeyRecord, ShareEntry,
    SharedFile, UserLookup,
};
use lockbox_core::{now_millis, AccessGrant, File, FileId, User, UserId};
use lockbox_session::{bearer_token, AccessToken, Session, SessionIssuer};
use lockbox_store::{BlobStore, KeyRotation, RotateResult, Store};

use crate::api::{Download, ShareRequest, Upload};
use crate::config::LockboxConfig;
use crate::error::{LockboxError, Result};

/// The main Lockbox struct.
///
/// Provides a unified API for:
/// - Registration, login and token refresh
/// - Uploading, downloading and deleting encrypted files
/// - Sharing, revoking and rotating access
///
/// `authorization` arguments are the raw `Authorization` header value.
pub struct Lockbox<S: Store, B: BlobStore> {
    store: Arc<S>,
    directory: KeyDirectory<S>,
    registry: FileRegistry<S, B>,
    vault: GrantVault<S>,
    gate: Gate<S>,
    sessions: SessionIssuer<S>,
    /// Advisory count of requests handled.
    requests: AtomicU64,
}

impl<S: Store, B: BlobStore> Lockbox<S, B> {
    /// Create a service over a record store and a blob store.
    pub fn new(store: S, blobs: B, config: LockboxConfig) -> Self {
        let store = Arc::new(store);
        let blobs = Arc::new(blobs);

        Self {
            directory: KeyDirectory::new(Arc::clone(&store), config.kdf),
            registry: FileRegistry::new(
                Arc::clone(&store),
                blobs,
                config.upload_dir,
                config.max_upload_bytes,
            ),
            vault: GrantVault::new(Arc::clone(&store)),
            gate: Gate::new(Arc::clone(&store)),
            sessions: SessionIssuer::new(Arc::clone(&store), &config.session),
            store,
            requests: AtomicU64::new(0),
        }
    }

    /// Get the store reference.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Number of requests handled so far.
    pub fn requests_served(&self) -> u64 {
        self.requests.load(Ordering::Relaxed)
    }

    fn begin(&self, op: &'static str) {
        let n = self.requests.fetch_add(1, Ordering::Relaxed) + 1;
        debug!(request = n, op, "handling request");
    }

    /// Resolve the requester from an `Authorization` header value.
    pub fn authenticate(&self, authorization: Option<&str>) -> Result<UserId> {
        let token = bearer_token(authorization)?;
        Ok(self.sessions.validate_access_token(token, now_millis())?)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Accounts
    // ─────────────────────────────────────────────────────────────────────────

    /// `POST /register`
    pub async fn register(&self, new_user: NewUser) -> Result<User> {
        self.begin("register");
        Ok(self.directory.register_user(new_user).await?)
    }

    /// `POST /login`
    pub async fn login(&self, email: &str, password: &str) -> Result<Session> {
        self.begin("login");
        let user = self.directory.verify_password(email, password).await?;
        Ok(self.sessions.issue_session(user.id, now_millis()).await?)
    }

    /// `POST /refresh`
    pub async fn refresh(&self, refresh_token: &str) -> Result<AccessToken> {
        self.begin("refresh");
        Ok(self.sessions.refresh(refresh_token, now_millis()).await?)
    }

    /// `POST /logout`
    pub async fn logout(&self, refresh_token: &str) -> Result<()> {
        self.begin("logout");
        Ok(self
            .sessions
            .revoke_refresh_token(refresh_token, now_millis())
            .await?)
    }

    /// `GET /user/public-key?email=`
    pub async fn public_key(&self, email: &str) -> Result<PublicKeyRecord> {
        self.begin("public_key");
        Ok(self
            .directory
            .lookup_public_key(UserLookup::Email(email))
            .await?)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Files
    // ─────────────────────────────────────────────────────────────────────────

    /// `POST /files/upload`
    pub async fn upload(&self, authorization: Option<&str>, upload: Upload) -> Result<File> {
        self.begin("upload");
        let owner = self.authenticate(authorization)?;

        let metadata = upload.metadata.to_json()?;
        let file = self
            .registry
            .store_and_register(owner, &upload.filename, upload.content, metadata)
            .await?;

        Ok(file)
    }

    /// `GET /files/{id}/download`
    ///
    /// Access is decided before the blob is touched. A record whose blob is
    /// missing is an internal error.
    pub async fn download(&self, authorization: Option<&str>, file_id: &FileId) -> Result<Download> {
        self.begin("download");
        let requester = self.authenticate(authorization)?;

        let (file, access) = self.gate.decide(&requester, file_id).await?;
        access.require_download()?;

        let content = self.registry.read_content(&file).await?;
        Ok(Download {
            file,
            content,
            access,
        })
    }

    /// `DELETE /files/{id}`
    pub async fn delete_file(&self, authorization: Option<&str>, file_id: &FileId) -> Result<()> {
        self.begin("delete_file");
        let requester = self.authenticate(authorization)?;

        let (_, access) = self.gate.decide(&requester, file_id).await?;
        access.require_owner()?;

        Ok(self.registry.delete_file(file_id).await?)
    }

    /// `GET /files`
    pub async fn list_files(&self, authorization: Option<&str>) -> Result<Vec<File>> {
        self.begin("list_files");
        let requester = self.authenticate(authorization)?;
        Ok(self.registry.list_files_by_owner(&requester).await?)
    }

    /// `GET /files/shared`
    pub async fn list_shared_with_me(&self, authorization: Option<&str>) -> Result<Vec<SharedFile>> {
        self.begin("list_shared_with_me");
        let requester = self.authenticate(authorization)?;
        Ok(self.vault.list_grants_for_user(&requester).await?)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Sharing
    // ─────────────────────────────────────────────────────────────────────────

    /// `POST /files/{id}/share`
    pub async fn share(
        &self,
        authorization: Option<&str>,
        file_id: &FileId,
        request: ShareRequest,
    ) -> Result<AccessGrant> {
        self.begin("share");
        let requester = self.authenticate(authorization)?;

        let (file, access) = self.gate.decide(&requester, file_id).await?;
        access.require_owner()?;

        let recipient = self
            .directory
            .lookup_public_key(UserLookup::Email(&request.recipient_email))
            .await?;
        if file.is_owned_by(&recipient.user_id) {
            return Err(LockboxError::Validation(
                "cannot share a file with its owner".into(),
            ));
        }

        Ok(self
            .vault
            .grant_access(file_id, &recipient.user_id, &request.wrapped_key)
            .await?)
    }

    /// `DELETE /files/{id}/revoke/{user_id}`
    ///
    /// Succeeds whether or not a grant existed.
    pub async fn revoke(
        &self,
        authorization: Option<&str>,
        file_id: &FileId,
        recipient_id: &UserId,
    ) -> Result<()> {
        self.begin("revoke");
        let requester = self.authenticate(authorization)?;

        let (_, access) = self.gate.decide(&requester, file_id).await?;
        access.require_owner()?;

        self.vault.revoke_access(file_id, recipient_id).await?;
        Ok(())
    }

    /// `GET /files/{id}/shares`
    pub async fn list_shares(
        &self,
        authorization: Option<&str>,
        file_id: &FileId,
    ) -> Result<Vec<ShareEntry>> {
        self.begin("list_shares");
        let requester = self.authenticate(authorization)?;

        let (_, access) = self.gate.decide(&requester, file_id).await?;
        access.require_owner()?;

        Ok(self.vault.list_grants_for_file(file_id).await?)
    }

    /// Replace a file's content key.
    ///
    /// The owner's client re-encrypts the content under a new key (uploading
    /// it out of band), then supplies the new metadata and the new key wrapped
    /// for every recipient who should keep access. The version bump, metadata
    /// and full grant set are replaced in one step; recipients left out lose
    /// access. A concurrent rotation makes this one fail with `Conflict`.
    ///
    /// Returns the new `content_key_version`.
    pub async fn rotate_content_key(
        &self,
        authorization: Option<&str>,
        file_id: &FileId,
        encrypted_metadata: String,
        rewrapped: Vec<(UserId, String)>,
    ) -> Result<u32> {
        self.begin("rotate_content_key");
        let requester = self.authenticate(authorization)?;

        let (file, access) = self.gate.decide(&requester, file_id).await?;
        access.require_owner()?;

        let now = now_millis();
        let mut seen = HashSet::new();
        let mut grants = Vec::with_capacity(rewrapped.len());

        for (recipient_id, wrapped_key) in rewrapped {
            if wrapped_key.trim().is_empty() {
                return Err(LockboxError::Validation("wrapped key is required".into()));
            }
            if file.is_owned_by(&recipient_id) || !seen.insert(recipient_id) {
                return Err(LockboxError::Validation(format!(
                    "recipient {} listed twice or is the owner",
                    recipient_id
                )));
            }
            if self.store.get_user(&recipient_id).await?.is_none() {
                return Err(LockboxError::NotFound(format!("user {}", recipient_id)));
            }

            grants.push(AccessGrant {
                file_id: *file_id,
                recipient_id,
                wrapped_key,
                created_at: now,
            });
        }

        let rotation = KeyRotation {
            file_id: *file_id,
            expected_version: file.content_key_version,
            encrypted_metadata,
            grants,
        };

        match self.store.rotate_file_key(&rotation).await? {
            RotateResult::Rotated { version } => {
                info!(file_id = %file_id, version, recipients = rotation.grants.len(), "rotated content key");
                Ok(version)
            }
            RotateResult::NotFound => Err(LockboxError::NotFound(format!("file {}", file_id))),
            RotateResult::VersionMismatch { current } => Err(LockboxError::Conflict(format!(
                "file {} was rotated concurrently (now at version {})",
                file_id, current
            ))),
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Maintenance
    // ─────────────────────────────────────────────────────────────────────────

    /// File records whose blob is missing.
    pub async fn find_orphaned_records(&self) -> Result<Vec<FileId>> {
        Ok(self.registry.find_orphaned_records().await?)
    }

    /// Decide access without loading content. Useful for the edge to answer
    /// `HEAD` requests.
    pub async fn access(&self, authorization: Option<&str>, file_id: &FileId) -> Result<Access> {
        self.begin("access");
        let requester = self.authenticate(authorization)?;
        let (_, access) = self.gate.decide(&requester, file_id).await?;
        Ok(access)
    }
}
