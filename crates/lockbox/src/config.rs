//! Service configuration.

use lockbox_core::KdfParams;
use lockbox_session::SessionConfig;

/// Default upload size cap: 10 MiB.
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 10 * 1024 * 1024;

/// Configuration for [`Lockbox`](crate::Lockbox).
#[derive(Debug, Clone)]
pub struct LockboxConfig {
    /// Token issuance.
    pub session: SessionConfig,
    /// Argon2id cost for password hashing and private-key sealing.
    pub kdf: KdfParams,
    /// Largest accepted upload, in bytes.
    pub max_upload_bytes: u64,
    /// Blob-store directory for uploaded content.
    pub upload_dir: String,
}

impl Default for LockboxConfig {
    fn default() -> Self {
        Self {
            session: SessionConfig::default(),
            kdf: KdfParams::default(),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            upload_dir: "uploads".to_string(),
        }
    }
}
