//! Session configuration.

use std::fmt;
use std::time::Duration;

use rand::RngCore;

/// Configuration for token issuance.
#[derive(Clone)]
pub struct SessionConfig {
    /// Shared secret the token signing key is derived from.
    pub secret: Vec<u8>,
    /// Lifetime of an access token.
    pub access_ttl: Duration,
    /// Lifetime of a refresh token.
    pub refresh_ttl: Duration,
}

impl SessionConfig {
    /// Configuration with the given secret and default lifetimes.
    pub fn with_secret(secret: impl Into<Vec<u8>>) -> Self {
        Self {
            secret: secret.into(),
            ..Self::default()
        }
    }
}

impl Default for SessionConfig {
    /// Default lifetimes and a random per-process secret. Tokens issued under
    /// a random secret do not survive a restart.
    fn default() -> Self {
        let mut secret = vec![0u8; 32];
        rand::thread_rng().fill_bytes(&mut secret);

        Self {
            secret,
            access_ttl: Duration::from_secs(60 * 60),
            refresh_ttl: Duration::from_secs(60 * 24 * 60 * 60),
        }
    }
}

impl fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionConfig")
            .field("secret", &format_args!("<{} bytes>", self.secret.len()))
            .field("access_ttl", &self.access_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .finish()
    }
}
