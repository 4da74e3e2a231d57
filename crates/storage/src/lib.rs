//! In-memory signing key registry for GeoTracker services.
//!
//! This crate owns the data side of the key lifecycle: tenant identifiers,
//! the injectable [`Clock`], validated RSA key material, key metadata and
//! the concurrent per-tenant [`KeyRegistry`](auth::KeyRegistry). Nothing is
//! persisted; the registry lives for the lifetime of the process.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::time::Duration;
//! use geotracker_common_storage::{TenantId, auth::KeyRegistry};
//!
//! # fn public_pem() -> String { unimplemented!() }
//! let registry = KeyRegistry::default();
//! let tenant = TenantId::from(7);
//!
//! let kid = registry.register(tenant, &public_pem(), None, Some(Duration::from_secs(60)))?;
//! let document = registry.public_keys(tenant);
//! assert!(document.find(&kid).is_some());
//! # Ok::<(), geotracker_common_storage::RegistryError>(())
//! ```
//!
//! # Error Handling
//!
//! Fallible operations return [`RegistryResult<T>`]. Lookups return
//! `Option` since an unknown kid is an ordinary outcome.
//!
//! # Feature Flags
//!
//! - **`testutil`**: Enables the `testutil` module with shared fixtures (a pool of pre-generated
//!   RSA key pairs, a registry driven by a manual clock, assertion macros). Enable this in
//!   `[dev-dependencies]` for integration tests.
//! - **`failpoints`**: Compiles the `registry-cleanup` fail point.

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod auth;
pub mod clock;
pub mod config;
pub mod error;
#[cfg(any(test, feature = "testutil"))]
#[allow(clippy::expect_used)]
pub mod testutil;
pub mod types;

// Re-export primary types at crate root for convenience
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::RegistryConfig;
pub use error::{ConfigError, RegistryError, RegistryResult};
pub use types::TenantId;
pub use zeroize::Zeroizing;
