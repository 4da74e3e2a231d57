//! Signing key types and the in-memory key registry.
//!
//! This module holds everything the registry knows about a key: its
//! lifecycle metadata, its validated RSA material and its public JWK
//! projection. The authn crate builds rotation, issuance and verification
//! on top of it.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐  register   ┌──────────────────────────────────────┐
//! │  rotation /  │────────────►│             KeyRegistry              │
//! │ registration │             │  DashMap<TenantId, RwLock<keys>>     │
//! └──────────────┘             │                                      │
//!                              │  tenant 7:  [key_7_.., key_7_..]     │
//! ┌──────────────┐  snapshot   │  tenant 42: [key_42_..]              │
//! │  issuer /    │◄────────────│                                      │
//! │  verifier    │             └──────────────────────────────────────┘
//! └──────────────┘
//! ```
//!
//! # Key lifecycle
//!
//! A key is `Issuable` while it is the newest active key of its tenant,
//! `VerifyOnly` once superseded, and `Expired` after `expires_at` plus the
//! skew tolerance, at which point [`KeyRegistry::cleanup`] removes it and
//! its private material.

pub mod audit;
mod jwk;
mod material;
mod metadata;
mod registry;

pub use jwk::{DiscoveryDocument, Jwk, KeyUse, RSA_KEY_TYPE, SIGNING_ALGORITHM};
pub use material::{MIN_RSA_BITS, PrivateKeyMaterial, PublicKeyMaterial};
pub use metadata::{KID_PREFIX, KeyMetadata, KeyState, format_kid, parse_kid_tenant};
pub use registry::{KeyRegistry, RegisteredKey};
