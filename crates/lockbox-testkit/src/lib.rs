//! # Lockbox Testkit
//!
//! Testing utilities for Lockbox.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Fixtures**: A service with cheap key derivation plus client-side
//!   helpers that encrypt, wrap, unwrap and decrypt like a real client
//! - **Generators**: Proptest strategies for ids, keys, passwords and metadata
//!
//! ## Test Fixtures
//!
//! ```rust,no_run
//! use lockbox_testkit::TestFixture;
//!
//! async fn example() {
//!     let fixture = TestFixture::new();
//!     let alice = fixture.register("alice").await.unwrap();
//!     let bob = fixture.register("bob").await.unwrap();
//!
//!     let uploaded = fixture.upload(&alice, "notes.txt", b"secret").await.unwrap();
//!     fixture
//!         .share(&alice, &uploaded.file, &bob, &uploaded.content_key)
//!         .await
//!         .unwrap();
//!
//!     let plaintext = fixture.download_plaintext(&bob, &uploaded.file, None).await.unwrap();
//!     assert_eq!(plaintext, b"secret");
//! }
//! ```
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use lockbox_testkit::generators::{content_key, identity_keypair};
//!
//! proptest! {
//!     #[test]
//!     fn wrapped_keys_open(kp in identity_keypair(), key in content_key()) {
//!         let wrapped = WrappedKey::seal(&key, &kp.public_key()).unwrap();
//!         prop_assert_eq!(wrapped.open(&kp).unwrap(), key);
//!     }
//! }
//! ```

pub mod fixtures;
pub mod generators;

pub use fixtures::{decrypt_download, test_config, TestFixture, TestUser, UploadedFile};
pub use generators::fast_kdf;
