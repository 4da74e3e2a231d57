//! # GeoTracker Common Authentication
//!
//! Multi-tenant RSA signing key lifecycle and JWT issuance for GeoTracker
//! services.
//!
//! This crate provides:
//! - **Key generation**: RSA key pairs behind the [`KeyGenerator`] trait
//! - **Rotation**: fraction-of-ttl rotation that keeps superseded keys verifiable
//! - **Discovery**: per-tenant public key sets in JWKS shape
//! - **Issuance and verification**: RS256 tokens bound to a tenant
//!
//! ## Features
//!
//! - Only RS256 is accepted; `none` and HMAC algorithms are explicitly rejected
//! - A token only ever verifies for the tenant it was issued for
//! - Every verification failure is the same opaque [`VerificationFailed`]
//! - Private keys stay in process memory and are wiped on drop
//!
//! ## Example
//!
//! ```no_run
//! use geotracker_common_authn::{AuthnConfig, KeyService};
//! use geotracker_common_storage::TenantId;
//! use serde_json::json;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let service = KeyService::builder().config(AuthnConfig::from_env()?).build()?;
//! let tenant = TenantId::from(42);
//!
//! let claims = json!({"user": "a"}).as_object().cloned().unwrap_or_default();
//! let token = service.issue(tenant, claims, None).await?;
//!
//! // Publish the tenant's keys for external verifiers.
//! let document = service.publish(tenant).await?;
//! println!("{}", serde_json::to_string(&document)?);
//!
//! let verified = service.verify(&token, tenant)?;
//! assert_eq!(verified.get_str("user"), Some("a"));
//! assert!(service.verify(&token, TenantId::from(99)).is_err());
//! # Ok(())
//! # }
//! ```
//!
//! ## Feature Flags
//!
//! - **`testutil`**: Enables the `testutil` module (pooled key generator, manual-clock engines,
//!   raw JWT crafting, `assert_auth_error!`).
//! - **`failpoints`**: Compiles the `keygen-generate` and `registry-cleanup` fail points.

#![deny(unsafe_code)]
#![warn(missing_docs)]

/// Engine configuration.
pub mod config;
/// Discovery document publishing.
pub mod discovery;
/// Authentication error types.
pub mod error;
/// Token issuance.
pub mod issuer;
/// JWT claims and encoding.
pub mod jwt;
/// Signing key generation.
pub mod keygen;
/// Engine counters.
pub mod metrics;
/// Key rotation policy.
pub mod rotation;
/// The assembled engine.
pub mod service;
#[cfg(any(test, feature = "testutil"))]
#[allow(clippy::expect_used, clippy::panic)]
pub mod testutil;
/// Header validation.
pub mod validation;
/// Token verification.
pub mod verifier;

// Re-export key types for convenience
pub use config::AuthnConfig;
pub use discovery::DiscoveryPublisher;
pub use error::{AuthError, Result, VerificationFailed};
pub use issuer::TokenIssuer;
pub use jwt::TokenClaims;
pub use keygen::{KeyGenerator, KeyPair, PresetKeyGenerator, RsaKeyGenerator};
pub use metrics::{AuthnMetrics, AuthnMetricsSnapshot};
pub use rotation::RotationPolicy;
pub use service::{KeyRegistration, KeyService};
pub use validation::{ACCEPTED_ALGORITHMS, FORBIDDEN_ALGORITHMS, is_algorithm_accepted};
pub use verifier::TokenVerifier;
