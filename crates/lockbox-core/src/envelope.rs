//! Password envelopes.
//!
//! A secret (a user's private key) is sealed under a password so it can be
//! stored at rest without the server holding a usable key. Each envelope is
//!
//! ```text
//! base64( salt[16] || nonce[12] || ciphertext || tag[16] )
//! ```
//!
//! The key-encryption key is derived with Argon2id from the password and the
//! per-envelope salt. Salt and nonce are fresh random values on every call.

use argon2::{Algorithm, Argon2, Params, Version};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::crypto::{AeadNonce, SymmetricKey, KEY_LEN, NONCE_LEN, TAG_LEN};
use crate::error::{CoreError, Result};

/// Length of the per-envelope Argon2id salt, in bytes.
pub const SALT_LEN: usize = 16;

/// Argon2id cost parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KdfParams {
    /// Memory cost in KiB.
    pub memory_kib: u32,
    /// Number of passes.
    pub iterations: u32,
    /// Degree of parallelism.
    pub parallelism: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            memory_kib: 19 * 1024,
            iterations: 2,
            parallelism: 1,
        }
    }
}

impl KdfParams {
    /// Derive a key-encryption key from a password and salt.
    pub fn derive(&self, password: &[u8], salt: &[u8]) -> Result<SymmetricKey> {
        let params = Params::new(
            self.memory_kib,
            self.iterations,
            self.parallelism,
            Some(KEY_LEN),
        )
        .map_err(|e| CoreError::KeyDerivation(e.to_string()))?;

        let mut out = [0u8; KEY_LEN];
        Argon2::new(Algorithm::Argon2id, Version::V0x13, params)
            .hash_password_into(password, salt, &mut out)
            .map_err(|e| CoreError::KeyDerivation(e.to_string()))?;

        Ok(SymmetricKey::from_bytes(out))
    }
}

/// A password-sealed secret in its stored (base64) form.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WrappedSecret(String);

impl WrappedSecret {
    /// Wrap an already-encoded envelope string.
    pub fn new(encoded: impl Into<String>) -> Self {
        Self(encoded.into())
    }

    /// The base64 envelope.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume into the base64 envelope.
    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Debug for WrappedSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "WrappedSecret({} chars)", self.0.len())
    }
}

/// Seal `secret` under `password` with default KDF parameters.
pub fn wrap_secret(secret: &[u8], password: &str) -> Result<WrappedSecret> {
    wrap_secret_with(secret, password, &KdfParams::default())
}

/// Seal `secret` under `password` with explicit KDF parameters.
pub fn wrap_secret_with(secret: &[u8], password: &str, kdf: &KdfParams) -> Result<WrappedSecret> {
    let mut salt = [0u8; SALT_LEN];
    rand::thread_rng().fill_bytes(&mut salt);
    let nonce = AeadNonce::generate();

    let kek = kdf.derive(password.as_bytes(), &salt)?;
    let ciphertext = kek.encrypt(secret, &nonce)?;

    let mut out = Vec::with_capacity(SALT_LEN + NONCE_LEN + ciphertext.len());
    out.extend_from_slice(&salt);
    out.extend_from_slice(nonce.as_bytes());
    out.extend_from_slice(&ciphertext);

    Ok(WrappedSecret(STANDARD.encode(out)))
}

/// Open an envelope with default KDF parameters.
pub fn unwrap_secret(blob: &WrappedSecret, password: &str) -> Result<Vec<u8>> {
    unwrap_secret_with(blob, password, &KdfParams::default())
}

/// Open an envelope with explicit KDF parameters.
///
/// Fails closed: a wrong password or any tampering yields
/// [`CoreError::AuthFailure`], never corrupted plaintext.
pub fn unwrap_secret_with(blob: &WrappedSecret, password: &str, kdf: &KdfParams) -> Result<Vec<u8>> {
    let raw = STANDARD
        .decode(blob.as_str())
        .map_err(|e| CoreError::Malformed(e.to_string()))?;

    if raw.len() < SALT_LEN + NONCE_LEN + TAG_LEN {
        return Err(CoreError::Malformed(format!(
            "envelope too short: {} bytes",
            raw.len()
        )));
    }

    let (salt, rest) = raw.split_at(SALT_LEN);
    let (nonce, ciphertext) = rest.split_at(NONCE_LEN);
    let mut nonce_bytes = [0u8; NONCE_LEN];
    nonce_bytes.copy_from_slice(nonce);

    let kek = kdf.derive(password.as_bytes(), salt)?;
    kek.decrypt(ciphertext, &AeadNonce::from_bytes(nonce_bytes))
}
