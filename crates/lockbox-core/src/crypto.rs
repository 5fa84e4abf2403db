//! Cryptographic primitives for Lockbox.
//!
//! Provides X25519 identity keys, key agreement, and ChaCha20-Poly1305
//! authenticated encryption. Keys cross process boundaries as base64 of
//! their raw bytes.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use chacha20poly1305::{
    aead::{Aead, KeyInit},
    ChaCha20Poly1305, Nonce,
};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::fmt;
use x25519_dalek::{EphemeralSecret, PublicKey as DalekPublicKey, StaticSecret};

use crate::error::{CoreError, Result};

/// Length of every symmetric key and X25519 key, in bytes.
pub const KEY_LEN: usize = 32;

/// Length of a ChaCha20-Poly1305 nonce, in bytes.
pub const NONCE_LEN: usize = 12;

/// Length of the Poly1305 authentication tag, in bytes.
pub const TAG_LEN: usize = 16;

/// An X25519 public key (32 bytes).
///
/// Not secret. Served to anyone who may share a file with its holder.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PublicKey(pub [u8; KEY_LEN]);

impl PublicKey {
    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }

    /// Encode as standard base64, the interchange form.
    pub fn to_base64(&self) -> String {
        STANDARD.encode(self.0)
    }

    /// Decode from standard base64.
    pub fn from_base64(s: &str) -> Result<Self> {
        decode_key(s).map(Self)
    }

    fn to_dalek(self) -> DalekPublicKey {
        DalekPublicKey::from(self.0)
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", &hex::encode(self.0)[..16])
    }
}

impl From<DalekPublicKey> for PublicKey {
    fn from(pk: DalekPublicKey) -> Self {
        Self(*pk.as_bytes())
    }
}

/// A user's long-lived X25519 keypair.
///
/// The secret half is only ever persisted in password-wrapped form.
pub struct IdentityKeypair(StaticSecret);

impl IdentityKeypair {
    /// Generate a new random keypair.
    pub fn generate() -> Self {
        let mut bytes = [0u8; KEY_LEN];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(StaticSecret::from(bytes))
    }

    /// Create from secret bytes.
    pub fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self(StaticSecret::from(bytes))
    }

    /// Decode the secret half from standard base64.
    pub fn from_base64(s: &str) -> Result<Self> {
        decode_key(s).map(Self::from_bytes)
    }

    /// Derive the public key.
    pub fn public_key(&self) -> PublicKey {
        PublicKey::from(DalekPublicKey::from(&self.0))
    }

    /// Get the secret bytes.
    pub fn secret_bytes(&self) -> [u8; KEY_LEN] {
        self.0.to_bytes()
    }

    /// Encode the secret half as standard base64.
    pub fn secret_to_base64(&self) -> String {
        STANDARD.encode(self.0.to_bytes())
    }

    /// Perform key agreement with a peer's public key.
    pub fn diffie_hellman(&self, peer_public: &PublicKey) -> SharedKey {
        let shared = self.0.diffie_hellman(&peer_public.to_dalek());
        SharedKey(*shared.as_bytes())
    }
}

impl fmt::Debug for IdentityKeypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("IdentityKeypair")
            .field(&self.public_key())
            .finish()
    }
}

/// A shared secret derived from X25519 key agreement.
#[derive(Clone)]
pub struct SharedKey([u8; KEY_LEN]);

impl SharedKey {
    /// Get the raw bytes.
    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }

    /// Derive a symmetric key from this shared secret.
    ///
    /// Binds the derived key to `context` for domain separation.
    pub fn derive_key(&self, context: &[u8]) -> SymmetricKey {
        let mut hasher = blake3::Hasher::new_derive_key("lockbox-v1 key-wrap");
        hasher.update(&self.0);
        hasher.update(context);
        SymmetricKey(*hasher.finalize().as_bytes())
    }
}

/// A 256-bit symmetric key for ChaCha20-Poly1305.
///
/// Used both as a file's content key and as a key-encryption key.
#[derive(Clone, PartialEq, Eq)]
pub struct SymmetricKey([u8; KEY_LEN]);

impl SymmetricKey {
    /// Generate a new random key.
    pub fn generate() -> Self {
        let mut bytes = [0u8; KEY_LEN];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self(bytes)
    }

    /// Create from a slice, checking its length.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let arr: [u8; KEY_LEN] = bytes.try_into().map_err(|_| {
            CoreError::InvalidKey(format!(
                "expected {} bytes, got {}",
                KEY_LEN,
                bytes.len()
            ))
        })?;
        Ok(Self(arr))
    }

    /// Get the raw bytes.
    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }

    /// Encrypt data with this key.
    pub fn encrypt(&self, plaintext: &[u8], nonce: &AeadNonce) -> Result<Vec<u8>> {
        let cipher = ChaCha20Poly1305::new_from_slice(&self.0)
            .map_err(|e| CoreError::Encryption(e.to_string()))?;

        cipher
            .encrypt(Nonce::from_slice(&nonce.0), plaintext)
            .map_err(|e| CoreError::Encryption(e.to_string()))
    }

    /// Decrypt data with this key.
    ///
    /// A tag mismatch is reported as [`CoreError::AuthFailure`]; no
    /// partially decrypted bytes are ever returned.
    pub fn decrypt(&self, ciphertext: &[u8], nonce: &AeadNonce) -> Result<Vec<u8>> {
        let cipher = ChaCha20Poly1305::new_from_slice(&self.0)
            .map_err(|e| CoreError::Encryption(e.to_string()))?;

        cipher
            .decrypt(Nonce::from_slice(&nonce.0), ciphertext)
            .map_err(|_| CoreError::AuthFailure)
    }
}

impl fmt::Debug for SymmetricKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SymmetricKey(..)")
    }
}

/// A 96-bit nonce for ChaCha20-Poly1305.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AeadNonce(pub [u8; NONCE_LEN]);

impl AeadNonce {
    /// Generate a new random nonce.
    pub fn generate() -> Self {
        let mut bytes = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; NONCE_LEN]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; NONCE_LEN] {
        &self.0
    }
}

/// Ephemeral key pair for one-time key agreement.
pub struct EphemeralKeyPair {
    secret: EphemeralSecret,
    public: PublicKey,
}

impl EphemeralKeyPair {
    /// Generate a new ephemeral key pair.
    pub fn generate() -> Self {
        let secret = EphemeralSecret::random_from_rng(rand::thread_rng());
        let public = PublicKey::from(DalekPublicKey::from(&secret));
        Self { secret, public }
    }

    /// Get the public key.
    pub fn public_key(&self) -> PublicKey {
        self.public
    }

    /// Perform key agreement with a peer's public key.
    ///
    /// Consumes the ephemeral secret (can only be used once).
    pub fn diffie_hellman(self, peer_public: &PublicKey) -> SharedKey {
        let shared = self.secret.diffie_hellman(&peer_public.to_dalek());
        SharedKey(*shared.as_bytes())
    }
}

fn decode_key(s: &str) -> Result<[u8; KEY_LEN]> {
    let bytes = STANDARD
        .decode(s.trim())
        .map_err(|e| CoreError::InvalidKey(e.to_string()))?;
    bytes.as_slice().try_into().map_err(|_| {
        CoreError::InvalidKey(format!("expected {} bytes, got {}", KEY_LEN, bytes.len()))
    })
}
