//! Proptest generators for property-based testing.

use proptest::prelude::*;

use lockbox_core::{FileId, IdentityKeypair, KdfParams, SymmetricKey, UploadMetadata, UserId};

/// Generate a random UserId.
pub fn user_id() -> impl Strategy<Value = UserId> {
    any::<[u8; 16]>().prop_map(UserId::from_bytes)
}

/// Generate a random FileId.
pub fn file_id() -> impl Strategy<Value = FileId> {
    any::<[u8; 16]>().prop_map(FileId::from_bytes)
}

/// Generate an identity keypair.
pub fn identity_keypair() -> impl Strategy<Value = IdentityKeypair> {
    any::<[u8; 32]>().prop_map(IdentityKeypair::from_bytes)
}

/// Generate a content key.
pub fn content_key() -> impl Strategy<Value = SymmetricKey> {
    any::<[u8; 32]>().prop_map(SymmetricKey::from_bytes)
}

/// Generate a password, including non-ASCII ones.
pub fn password() -> impl Strategy<Value = String> {
    "\\PC{1,32}".prop_map(String::from)
}

/// Generate an email address with arbitrary letter case and padding.
pub fn email() -> impl Strategy<Value = String> {
    ("[a-zA-Z][a-zA-Z0-9.]{0,15}", "[a-z]{1,10}", " {0,2}")
        .prop_map(|(local, domain, pad)| format!("{pad}{local}@{domain}.example{pad}"))
}

/// Generate a filename with an optional extension.
pub fn filename() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9 _-]{1,24}(\\.[a-z0-9]{1,4})?".prop_map(String::from)
}

/// Generate client-side encryption metadata.
pub fn upload_metadata() -> impl Strategy<Value = UploadMetadata> {
    (any::<[u8; 12]>(), any::<[u8; 16]>()).prop_map(|(iv, salt)| UploadMetadata {
        iv: hex::encode(iv),
        salt: hex::encode(salt),
        algorithm: "ChaCha20-Poly1305".to_string(),
    })
}

/// Generate ciphertext-like payload bytes of at most `max_len`.
pub fn payload(max_len: usize) -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..=max_len)
}

/// Argon2id parameters cheap enough for property tests.
pub fn fast_kdf() -> KdfParams {
    KdfParams {
        memory_kib: 64,
        iterations: 1,
        parallelism: 1,
    }
}
