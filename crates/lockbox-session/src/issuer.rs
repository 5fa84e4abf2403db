//! Session issuance, refresh and revocation.

use std::sync::Arc;
use std::time::Duration;

use rand::RngCore;
use tracing::{debug, info};

use lockbox_core::{RefreshToken, UserId};
use lockbox_store::Store;

use crate::config::SessionConfig;
use crate::error::{Result, SessionError, TokenError};
use crate::token::{Claims, TokenSigner};

/// A freshly issued access token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessToken {
    pub token: String,
    pub expires_at: i64,
}

/// The credentials handed out at login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    pub access_expires_at: i64,
    pub refresh_expires_at: i64,
}

fn ttl_millis(ttl: Duration) -> i64 {
    i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX)
}

/// 32 random bytes, hex encoded.
fn generate_refresh_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Issues and checks session credentials.
pub struct SessionIssuer<S> {
    store: Arc<S>,
    signer: TokenSigner,
    access_ttl: i64,
    refresh_ttl: i64,
}

impl<S: Store> SessionIssuer<S> {
    /// Create an issuer. Refresh tokens are persisted in `store`.
    pub fn new(store: Arc<S>, config: &SessionConfig) -> Self {
        Self {
            store,
            signer: TokenSigner::from_secret(&config.secret),
            access_ttl: ttl_millis(config.access_ttl),
            refresh_ttl: ttl_millis(config.refresh_ttl),
        }
    }

    /// Issue an access token and a persisted refresh token for `user_id`.
    pub async fn issue_session(&self, user_id: UserId, now: i64) -> Result<Session> {
        let access = self.issue_access_token(user_id, now)?;

        let refresh = RefreshToken {
            token: generate_refresh_token(),
            user_id,
            created_at: now,
            expires_at: now.saturating_add(self.refresh_ttl),
            revoked_at: None,
        };
        self.store.insert_refresh_token(&refresh).await?;

        info!(user_id = %user_id, "issued session");
        Ok(Session {
            access_token: access.token,
            refresh_token: refresh.token,
            access_expires_at: access.expires_at,
            refresh_expires_at: refresh.expires_at,
        })
    }

    /// Check an access token's signature and expiry.
    pub fn validate_access_token(
        &self,
        token: &str,
        now: i64,
    ) -> std::result::Result<UserId, TokenError> {
        self.signer.verify(token, now).map(|claims| claims.sub)
    }

    /// Exchange a usable refresh token for a new access token.
    pub async fn refresh(&self, refresh_token: &str, now: i64) -> Result<AccessToken> {
        let stored = self
            .store
            .get_refresh_token(refresh_token)
            .await?
            .ok_or(SessionError::RefreshRejected)?;

        if !stored.is_usable(now) {
            debug!(user_id = %stored.user_id, "rejected unusable refresh token");
            return Err(SessionError::RefreshRejected);
        }

        self.issue_access_token(stored.user_id, now)
    }

    /// Revoke a refresh token. The row is kept with `revoked_at` set.
    pub async fn revoke_refresh_token(&self, refresh_token: &str, now: i64) -> Result<()> {
        if self.store.revoke_refresh_token(refresh_token, now).await? {
            info!("revoked refresh token");
            Ok(())
        } else {
            Err(SessionError::RefreshNotFound)
        }
    }

    fn issue_access_token(&self, user_id: UserId, now: i64) -> Result<AccessToken> {
        let claims = Claims {
            sub: user_id,
            iat: now,
            exp: now.saturating_add(self.access_ttl),
        };

        Ok(AccessToken {
            token: self.signer.sign(&claims)?,
            expires_at: claims.exp,
        })
    }
}
