//! Identity creation: a fresh keypair whose secret half is sealed under the
//! user's password before it ever leaves this function.

use crate::crypto::{IdentityKeypair, PublicKey, KEY_LEN};
use crate::envelope::{unwrap_secret_with, wrap_secret_with, KdfParams, WrappedSecret};
use crate::error::{CoreError, Result};

/// Output of [`register_identity`].
#[derive(Debug, Clone)]
pub struct RegisteredIdentity {
    /// Public half, stored and distributed in the clear.
    pub public_key: PublicKey,
    /// Secret half, sealed under the user's password. Stored only.
    pub encrypted_private_key: WrappedSecret,
}

/// Generate a keypair and seal its secret half under `password`.
pub fn register_identity(password: &str, kdf: &KdfParams) -> Result<RegisteredIdentity> {
    let keypair = IdentityKeypair::generate();
    let encrypted_private_key = wrap_secret_with(&keypair.secret_bytes(), password, kdf)?;

    Ok(RegisteredIdentity {
        public_key: keypair.public_key(),
        encrypted_private_key,
    })
}

/// Unseal a stored private key.
pub fn recover_identity(
    encrypted_private_key: &WrappedSecret,
    password: &str,
    kdf: &KdfParams,
) -> Result<IdentityKeypair> {
    let secret = unwrap_secret_with(encrypted_private_key, password, kdf)?;
    let bytes: [u8; KEY_LEN] = secret.as_slice().try_into().map_err(|_| {
        CoreError::InvalidKey(format!(
            "unsealed private key has {} bytes, expected {}",
            secret.len(),
            KEY_LEN
        ))
    })?;
    Ok(IdentityKeypair::from_bytes(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast() -> KdfParams {
        KdfParams {
            memory_kib: 64,
            iterations: 1,
            parallelism: 1,
        }
    }

    #[test]
    fn test_registered_identity_recovers_matching_keypair() {
        let identity = register_identity("hunter22", &fast()).unwrap();
        let keypair = recover_identity(&identity.encrypted_private_key, "hunter22", &fast()).unwrap();
        assert_eq!(keypair.public_key(), identity.public_key);
    }

    #[test]
    fn test_recover_with_wrong_password_fails() {
        let identity = register_identity("hunter22", &fast()).unwrap();
        assert!(matches!(
            recover_identity(&identity.encrypted_private_key, "hunter23", &fast()),
            Err(CoreError::AuthFailure)
        ));
    }

    #[test]
    fn test_private_key_is_not_stored_in_clear() {
        let identity = register_identity("pw", &fast()).unwrap();
        let keypair = recover_identity(&identity.encrypted_private_key, "pw", &fast()).unwrap();
        assert!(!identity
            .encrypted_private_key
            .as_str()
            .contains(&keypair.secret_to_base64()));
    }
}
