//! Shared test utilities for authentication testing.
//!
//! This module provides a pooled [`KeyGenerator`] over pre-generated RSA
//! keys, engines driven by a [`ManualClock`], helpers to sign arbitrary
//! payloads, and raw JWT crafting for attack testing. It is feature-gated
//! behind `testutil` to prevent leaking into production builds.
//!
//! # Usage
//!
//! In integration tests, enable the feature in `Cargo.toml`:
//!
//! ```toml
//! [dev-dependencies]
//! geotracker-common-authn = { path = "../authn", features = ["testutil"] }
//! ```
//!
//! Then import helpers:
//!
//! ```no_run
//! // Requires the `testutil` feature to be enabled.
//! use geotracker_common_authn::testutil::{craft_raw_jwt, test_service};
//! ```

use std::sync::Arc;

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use geotracker_common_storage::{
    ManualClock,
    auth::{KeyRegistry, PrivateKeyMaterial, PublicKeyMaterial},
    testutil::{FixtureKeyPair, fixture_pool},
};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde_json::Value;
use zeroize::Zeroizing;

use crate::{
    config::AuthnConfig,
    discovery::DiscoveryPublisher,
    issuer::TokenIssuer,
    keygen::{KeyGenerator, KeyPair, PresetKeyGenerator},
    metrics::AuthnMetrics,
    rotation::RotationPolicy,
    service::KeyService,
    verifier::TokenVerifier,
};

/// The storage fixture pool as [`KeyPair`]s.
pub fn fixture_key_pairs() -> Vec<KeyPair> {
    fixture_pool()
        .iter()
        .map(|pair| KeyPair {
            public_key_pem: pair.public_pem.clone(),
            private_key_pem: Zeroizing::new(pair.private_pem.clone()),
        })
        .collect()
}

/// A generator cycling through the fixture pool.
///
/// Rotation in tests then costs a clone instead of an RSA key generation.
pub fn pooled_generator() -> Arc<dyn KeyGenerator> {
    Arc::new(PresetKeyGenerator::new(fixture_key_pairs()))
}

/// Builds a [`KeyService`] with default configuration, a pooled generator
/// and a [`ManualClock`], returning both.
pub fn test_service() -> (KeyService, ManualClock) {
    test_service_with(AuthnConfig::default())
}

/// Like [`test_service`] with explicit configuration.
///
/// # Panics
///
/// Panics if `config` fails validation.
pub fn test_service_with(config: AuthnConfig) -> (KeyService, ManualClock) {
    let clock = ManualClock::starting_now();
    let service = KeyService::builder()
        .config(config)
        .clock(Arc::new(clock.clone()))
        .generator(pooled_generator())
        .build()
        .expect("test configuration must be valid");
    (service, clock)
}

/// Every engine component wired together with public access to each.
#[derive(Debug)]
pub struct TestEngine {
    /// Configuration the components were built with.
    pub config: AuthnConfig,
    /// Clock driving the registry.
    pub clock: ManualClock,
    /// Shared registry.
    pub registry: Arc<KeyRegistry>,
    /// Shared metrics.
    pub metrics: AuthnMetrics,
    /// Rotation policy over the pooled generator.
    pub rotation: RotationPolicy,
    /// Discovery publisher.
    pub publisher: DiscoveryPublisher,
    /// Token issuer.
    pub issuer: TokenIssuer,
    /// Token verifier.
    pub verifier: TokenVerifier,
}

impl TestEngine {
    /// Builds an engine with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(AuthnConfig::default())
    }

    /// Builds an engine with `config`, which is not validated.
    #[must_use]
    pub fn with_config(config: AuthnConfig) -> Self {
        let clock = ManualClock::starting_now();
        let registry = Arc::new(
            KeyRegistry::builder()
                .config(config.registry_config())
                .clock(Arc::new(clock.clone()))
                .build(),
        );
        let metrics = AuthnMetrics::new();
        let generator = pooled_generator();
        let rotation =
            RotationPolicy::new(Arc::clone(&registry), generator, &config, metrics.clone());
        let publisher =
            DiscoveryPublisher::new(Arc::clone(&registry), rotation.clone(), metrics.clone());
        let issuer =
            TokenIssuer::new(Arc::clone(&registry), rotation.clone(), &config, metrics.clone());
        let verifier =
            TokenVerifier::new(Arc::clone(&registry), publisher.clone(), &config, metrics.clone());
        Self { config, clock, registry, metrics, rotation, publisher, issuer, verifier }
    }

    /// Current clock reading in whole seconds since the epoch.
    #[must_use]
    pub fn clock_now(&self) -> i64 {
        use geotracker_common_storage::Clock;
        self.clock.now().timestamp()
    }
}

impl Default for TestEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Signs an arbitrary JSON `payload` with RS256 using `pair` under `kid`.
///
/// # Panics
///
/// Panics if the fixture key cannot be parsed or encoding fails.
pub fn sign_with_fixture(pair: &FixtureKeyPair, kid: &str, payload: &Value) -> String {
    let public = PublicKeyMaterial::from_pem(&pair.public_pem).expect("fixture public key");
    let private =
        PrivateKeyMaterial::from_pem(&pair.private_pem, &public).expect("fixture private key");
    let mut header = Header::new(Algorithm::RS256);
    header.kid = Some(kid.to_owned());
    jsonwebtoken::encode(&header, payload, &EncodingKey::from_rsa_der(private.pkcs1_der()))
        .expect("JWT encoding should succeed")
}

/// Crafts a raw JWT from arbitrary header and payload JSON.
///
/// The signature segment is a fixed placeholder, so the result never
/// verifies. Used to build tokens `jsonwebtoken` refuses to encode, such as
/// `alg: none`.
pub fn craft_raw_jwt(header: &Value, payload: &Value) -> String {
    let header_b64 = URL_SAFE_NO_PAD.encode(header.to_string().as_bytes());
    let payload_b64 = URL_SAFE_NO_PAD.encode(payload.to_string().as_bytes());
    let sig_b64 = URL_SAFE_NO_PAD.encode(b"fake-signature");
    format!("{header_b64}.{payload_b64}.{sig_b64}")
}

/// Asserts that a `Result` is an `Err` matching the given [`AuthError`](crate::AuthError)
/// variant pattern.
///
/// # Examples
///
/// ```no_run
/// // Requires the `testutil` feature to be enabled.
/// use geotracker_common_authn::{AuthError, assert_auth_error};
///
/// let result: Result<(), AuthError> = Err(AuthError::key_generation("boom"));
/// assert_auth_error!(result, KeyGeneration(_));
/// ```
#[macro_export]
macro_rules! assert_auth_error {
    ($result:expr, $($variant:tt)+) => {
        match $result {
            Err($crate::AuthError::$($variant)+) => {}
            other => panic!(
                "expected AuthError::{}, got {:?}",
                stringify!($($variant)+),
                other
            ),
        }
    };
}
