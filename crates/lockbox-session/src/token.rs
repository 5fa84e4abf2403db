//! Signed access tokens.
//!
//! Format: `base64url(CBOR claims) "." base64url(Ed25519 signature)`, both
//! unpadded. The signature covers the claim bytes exactly as transmitted.
//! Validation needs only the signer; there is no store lookup.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use ed25519_dalek::{Signature, Signer, SigningKey, VerifyingKey};
use serde::{Deserialize, Serialize};

use lockbox_core::UserId;

use crate::error::{Result, SessionError, TokenError};

const SIGNING_CONTEXT: &str = "lockbox-v1 access-token signing";

/// Claims carried by an access token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// The authenticated user.
    pub sub: UserId,
    /// Issued at, Unix millis.
    pub iat: i64,
    /// Expires at, Unix millis. Rejected from this instant on.
    pub exp: i64,
}

/// Signs and verifies access tokens.
///
/// The Ed25519 key is derived from the shared secret, so every process
/// configured with the same secret accepts the same tokens.
#[derive(Clone)]
pub struct TokenSigner {
    signing_key: SigningKey,
    verifying_key: VerifyingKey,
}

impl TokenSigner {
    /// Derive the signer from a shared secret.
    pub fn from_secret(secret: &[u8]) -> Self {
        let seed = blake3::derive_key(SIGNING_CONTEXT, secret);
        let signing_key = SigningKey::from_bytes(&seed);
        let verifying_key = signing_key.verifying_key();
        Self {
            signing_key,
            verifying_key,
        }
    }

    /// Encode and sign `claims`.
    pub fn sign(&self, claims: &Claims) -> Result<String> {
        let mut payload = Vec::new();
        ciborium::into_writer(claims, &mut payload)
            .map_err(|e| SessionError::Encoding(e.to_string()))?;

        let signature = self.signing_key.sign(&payload);

        Ok(format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(&payload),
            URL_SAFE_NO_PAD.encode(signature.to_bytes())
        ))
    }

    /// Check a token's signature, then its expiry.
    pub fn verify(&self, token: &str, now: i64) -> std::result::Result<Claims, TokenError> {
        let (payload, signature) = token.split_once('.').ok_or(TokenError::Invalid)?;

        let payload = URL_SAFE_NO_PAD
            .decode(payload)
            .map_err(|_| TokenError::Invalid)?;
        let signature: [u8; 64] = URL_SAFE_NO_PAD
            .decode(signature)
            .map_err(|_| TokenError::Invalid)?
            .try_into()
            .map_err(|_| TokenError::Invalid)?;

        self.verifying_key
            .verify_strict(&payload, &Signature::from_bytes(&signature))
            .map_err(|_| TokenError::Invalid)?;

        let claims: Claims =
            ciborium::from_reader(payload.as_slice()).map_err(|_| TokenError::Invalid)?;

        if now >= claims.exp {
            return Err(TokenError::Expired);
        }
        Ok(claims)
    }
}

impl std::fmt::Debug for TokenSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "TokenSigner({})",
            hex::encode(&self.verifying_key.to_bytes()[..8])
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn claims(exp: i64) -> Claims {
        Claims {
            sub: UserId::new(),
            iat: 0,
            exp,
        }
    }

    #[test]
    fn test_sign_verify() {
        let signer = TokenSigner::from_secret(b"secret");
        let c = claims(1_000);
        let token = signer.sign(&c).unwrap();

        assert_eq!(signer.verify(&token, 999).unwrap(), c);
        assert_eq!(signer.verify(&token, 1_000), Err(TokenError::Expired));
    }

    #[test]
    fn test_other_secret_is_invalid() {
        let token = TokenSigner::from_secret(b"one").sign(&claims(1_000)).unwrap();
        let other = TokenSigner::from_secret(b"two");
        assert_eq!(other.verify(&token, 0), Err(TokenError::Invalid));
    }

    #[test]
    fn test_expired_forgery_is_invalid_not_expired() {
        let signer = TokenSigner::from_secret(b"secret");
        let token = TokenSigner::from_secret(b"forger").sign(&claims(1)).unwrap();
        assert_eq!(signer.verify(&token, 10), Err(TokenError::Invalid));
    }

    #[test]
    fn test_malformed_tokens() {
        let signer = TokenSigner::from_secret(b"secret");
        for bad in ["", ".", "abc", "abc.def", "a.b.c", "!!!.???"] {
            assert_eq!(signer.verify(bad, 0), Err(TokenError::Invalid), "{bad}");
        }
    }

    #[test]
    fn test_tampered_claims_rejected() {
        let signer = TokenSigner::from_secret(b"secret");
        let token = signer.sign(&claims(1_000)).unwrap();
        let (_, sig) = token.split_once('.').unwrap();

        let mut forged = Vec::new();
        ciborium::into_writer(&claims(i64::MAX), &mut forged).unwrap();
        let forged = format!("{}.{}", URL_SAFE_NO_PAD.encode(forged), sig);

        assert_eq!(signer.verify(&forged, 0), Err(TokenError::Invalid));
    }

    proptest! {
        #[test]
        fn prop_flipped_byte_never_verifies(idx in any::<prop::sample::Index>(), bit in 0u8..8) {
            let signer = TokenSigner::from_secret(b"secret");
            let token = signer.sign(&claims(1_000)).unwrap();
            let mut bytes = token.into_bytes();
            let i = idx.index(bytes.len());
            bytes[i] ^= 1 << bit;

            if let Ok(mutated) = String::from_utf8(bytes) {
                prop_assert!(signer.verify(&mutated, 0).is_err());
            }
        }
    }
}
