//! Per-recipient content-key wrapping.
//!
//! This is the edge-side half of sharing: the owner wraps a file's content
//! key for a recipient's public key, and only the resulting opaque string is
//! handed to the server. The server never calls [`WrappedKey::open`].
//!
//! Wire form: `base64( ephemeral_public[32] || nonce[12] || ciphertext || tag )`.

use base64::{engine::general_purpose::STANDARD, Engine as _};

use crate::crypto::{
    AeadNonce, EphemeralKeyPair, IdentityKeypair, PublicKey, SymmetricKey, KEY_LEN, NONCE_LEN,
    TAG_LEN,
};
use crate::error::{CoreError, Result};

const WRAP_CONTEXT: &[u8] = b"content-key";

/// A content key sealed for one recipient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrappedKey {
    /// Ephemeral X25519 public key (sender's side of ECDH).
    pub ephemeral_public: PublicKey,

    /// Nonce used for encryption.
    pub nonce: AeadNonce,

    /// The content key, encrypted with the derived shared secret.
    pub encrypted_key: Vec<u8>,
}

impl WrappedKey {
    /// Seal a content key for the holder of `recipient_public`.
    pub fn seal(content_key: &SymmetricKey, recipient_public: &PublicKey) -> Result<Self> {
        let ephemeral = EphemeralKeyPair::generate();
        let ephemeral_public = ephemeral.public_key();

        let wrap_key = ephemeral
            .diffie_hellman(recipient_public)
            .derive_key(&context(&ephemeral_public, recipient_public));

        let nonce = AeadNonce::generate();
        let encrypted_key = wrap_key.encrypt(content_key.as_bytes(), &nonce)?;

        Ok(Self {
            ephemeral_public,
            nonce,
            encrypted_key,
        })
    }

    /// Recover the content key with the recipient's identity keypair.
    pub fn open(&self, recipient: &IdentityKeypair) -> Result<SymmetricKey> {
        let wrap_key = recipient
            .diffie_hellman(&self.ephemeral_public)
            .derive_key(&context(&self.ephemeral_public, &recipient.public_key()));

        let key_bytes = wrap_key.decrypt(&self.encrypted_key, &self.nonce)?;
        SymmetricKey::from_slice(&key_bytes)
    }

    /// Encode to the opaque string the server stores.
    pub fn encode(&self) -> String {
        let mut buf = Vec::with_capacity(KEY_LEN + NONCE_LEN + self.encrypted_key.len());
        buf.extend_from_slice(self.ephemeral_public.as_bytes());
        buf.extend_from_slice(self.nonce.as_bytes());
        buf.extend_from_slice(&self.encrypted_key);
        STANDARD.encode(buf)
    }

    /// Decode from the opaque string form.
    pub fn decode(s: &str) -> Result<Self> {
        let raw = STANDARD
            .decode(s.trim())
            .map_err(|e| CoreError::Malformed(e.to_string()))?;

        if raw.len() < KEY_LEN + NONCE_LEN + TAG_LEN {
            return Err(CoreError::Malformed(format!(
                "wrapped key too short: {} bytes",
                raw.len()
            )));
        }

        let mut public = [0u8; KEY_LEN];
        public.copy_from_slice(&raw[..KEY_LEN]);
        let mut nonce = [0u8; NONCE_LEN];
        nonce.copy_from_slice(&raw[KEY_LEN..KEY_LEN + NONCE_LEN]);

        Ok(Self {
            ephemeral_public: PublicKey::from_bytes(public),
            nonce: AeadNonce::from_bytes(nonce),
            encrypted_key: raw[KEY_LEN + NONCE_LEN..].to_vec(),
        })
    }
}

fn context(ephemeral: &PublicKey, recipient: &PublicKey) -> Vec<u8> {
    let mut ctx = Vec::with_capacity(WRAP_CONTEXT.len() + 2 * KEY_LEN);
    ctx.extend_from_slice(WRAP_CONTEXT);
    ctx.extend_from_slice(ephemeral.as_bytes());
    ctx.extend_from_slice(recipient.as_bytes());
    ctx
}
