//! # Lockbox Session
//!
//! Session credentials: short-lived signed access tokens and long-lived,
//! persisted, revocable refresh tokens.
//!
//! - [`SessionIssuer`] - Issues sessions, validates access tokens, refreshes
//! - [`TokenSigner`] - Ed25519 signing of CBOR claims
//! - [`bearer_token`] - `Authorization` header parsing
//!
//! Access tokens are self-contained and are not checked against the store;
//! logging out revokes the refresh token, and outstanding access tokens
//! lapse at their expiry.

pub mod bearer;
pub mod config;
pub mod error;
pub mod issuer;
pub mod token;

pub use bearer::bearer_token;
pub use config::SessionConfig;
pub use error::{Result, SessionError, TokenError};
pub use issuer::{AccessToken, Session, SessionIssuer};
pub use token::{Claims, TokenSigner};
