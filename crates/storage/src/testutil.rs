//! Shared test utilities for key registry testing.
//!
//! RSA key generation is slow, so this module generates a small pool of
//! 2048-bit key pairs once per process and hands out references to them.
//! It is feature-gated behind `testutil` to prevent leaking into production
//! builds.
//!
//! # Usage
//!
//! In integration tests, enable the feature in `Cargo.toml`:
//!
//! ```toml
//! [dev-dependencies]
//! geotracker-common-storage = { path = "../storage", features = ["testutil"] }
//! ```
//!
//! Then import helpers:
//!
//! ```no_run
//! // Requires the `testutil` feature to be enabled.
//! use geotracker_common_storage::testutil::{fixture_keypair, test_registry};
//! ```

use std::{
    sync::{Arc, OnceLock},
    thread,
};

use rand_core::OsRng;
use rsa::{
    RsaPrivateKey,
    pkcs8::{EncodePrivateKey, EncodePublicKey, LineEnding},
};

use crate::{auth::KeyRegistry, clock::ManualClock, config::RegistryConfig};

/// Number of key pairs in the process-wide fixture pool.
pub const FIXTURE_POOL_SIZE: usize = 8;

/// A pre-generated RSA key pair in every form tests need.
#[derive(Debug)]
pub struct FixtureKeyPair {
    /// The parsed private key.
    pub private: RsaPrivateKey,
    /// SPKI PEM (`BEGIN PUBLIC KEY`).
    pub public_pem: String,
    /// PKCS#8 PEM (`BEGIN PRIVATE KEY`).
    pub private_pem: String,
}

static POOL: OnceLock<Vec<FixtureKeyPair>> = OnceLock::new();

/// Returns the fixture pool, generating it on first use.
///
/// # Panics
///
/// Panics if key generation or PEM encoding fails.
pub fn fixture_pool() -> &'static [FixtureKeyPair] {
    POOL.get_or_init(|| {
        thread::scope(|scope| {
            let handles: Vec<_> =
                (0..FIXTURE_POOL_SIZE).map(|_| scope.spawn(generate_fixture)).collect();
            handles.into_iter().map(|h| h.join().expect("fixture generation panicked")).collect()
        })
    })
}

/// First key pair of the pool.
pub fn fixture_keypair() -> &'static FixtureKeyPair {
    &fixture_pool()[0]
}

/// A key pair guaranteed to differ from [`fixture_keypair`].
pub fn other_fixture_keypair() -> &'static FixtureKeyPair {
    &fixture_pool()[1]
}

/// Key pair at `index`, wrapping around the pool.
pub fn fixture_keypair_at(index: usize) -> &'static FixtureKeyPair {
    let pool = fixture_pool();
    &pool[index % pool.len()]
}

/// Creates a registry with default configuration driven by a fresh
/// [`ManualClock`], returning both.
pub fn test_registry() -> (KeyRegistry, ManualClock) {
    test_registry_with(RegistryConfig::default())
}

/// Like [`test_registry`] with explicit configuration.
pub fn test_registry_with(config: RegistryConfig) -> (KeyRegistry, ManualClock) {
    let clock = ManualClock::starting_now();
    let registry = KeyRegistry::builder().config(config).clock(Arc::new(clock.clone())).build();
    (registry, clock)
}

fn generate_fixture() -> FixtureKeyPair {
    let private = RsaPrivateKey::new(&mut OsRng, 2048).expect("RSA key generation failed");
    let public_pem = private
        .to_public_key()
        .to_public_key_pem(LineEnding::LF)
        .expect("public key PEM encoding failed");
    let private_pem =
        private.to_pkcs8_pem(LineEnding::LF).expect("private key PEM encoding failed").to_string();
    FixtureKeyPair { private, public_pem, private_pem }
}

/// Assert that a [`RegistryResult`](crate::RegistryResult) is an error
/// matching the given pattern.
///
/// # Examples
///
/// ```no_run
/// // Requires the `testutil` feature to be enabled.
/// use geotracker_common_storage::{RegistryError, assert_registry_error};
///
/// let result: Result<(), RegistryError> = Err(RegistryError::key_not_found("key_1_1"));
/// assert_registry_error!(result, KeyNotFound { .. });
/// ```
#[macro_export]
macro_rules! assert_registry_error {
    ($result:expr, $($variant:tt)+) => {
        match $result {
            Err($crate::RegistryError::$($variant)+) => {}
            other => panic!(
                "expected RegistryError::{}, got {:?}",
                stringify!($($variant)+),
                other
            ),
        }
    };
}
