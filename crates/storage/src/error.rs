//! Registry error types and result alias.
//!
//! This module defines the errors that can occur while registering, looking up
//! or pruning signing keys in the in-memory registry, plus the configuration
//! validation error shared by every crate in the workspace.
//!
//! # Error Types
//!
//! - [`RegistryError::KeyMaterialInvalid`] - Public or private key input was rejected
//! - [`RegistryError::InvalidTtl`] - A key lifetime of zero was requested
//! - [`RegistryError::KeyNotFound`] - No key with the given `kid` exists
//! - [`RegistryError::Internal`] - Unexpected registry fault
//!
//! # Example
//!
//! ```
//! use geotracker_common_storage::{RegistryError, RegistryResult};
//!
//! fn lookup(kid: &str) -> RegistryResult<()> {
//!     Err(RegistryError::key_not_found(kid))
//! }
//!
//! assert!(lookup("key_1_1").is_err());
//! ```

use thiserror::Error;

/// Result type alias for registry operations.
pub type RegistryResult<T> = Result<T, RegistryError>;

/// Errors that can occur during key registry operations.
///
/// # Non-exhaustive
///
/// This enum is marked `#[non_exhaustive]`; new variants may be added in
/// future minor releases without a semver-breaking change. Downstream match
/// expressions must include a wildcard arm (`_ =>`).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RegistryError {
    /// Malformed public or private key input.
    ///
    /// Raised before any state mutation, so a failed registration leaves the
    /// registry untouched.
    #[error("Invalid key material: {message}")]
    KeyMaterialInvalid {
        /// Description of what was wrong with the key input.
        message: String,
    },

    /// Requested key lifetime is not usable.
    #[error("Invalid key ttl: {message}")]
    InvalidTtl {
        /// Description of the rejected ttl.
        message: String,
    },

    /// No key with the given identifier exists.
    #[error("Key not found: {kid}")]
    KeyNotFound {
        /// Key ID that was not found.
        kid: String,
    },

    /// Internal registry error.
    #[error("Internal error: {message}")]
    Internal {
        /// Description of the internal failure.
        message: String,
    },
}

impl RegistryError {
    /// Creates a new `KeyMaterialInvalid` error.
    #[must_use]
    pub fn key_material_invalid(message: impl Into<String>) -> Self {
        Self::KeyMaterialInvalid { message: message.into() }
    }

    /// Creates a new `InvalidTtl` error.
    #[must_use]
    pub fn invalid_ttl(message: impl Into<String>) -> Self {
        Self::InvalidTtl { message: message.into() }
    }

    /// Creates a new `KeyNotFound` error.
    #[must_use]
    pub fn key_not_found(kid: impl Into<String>) -> Self {
        Self::KeyNotFound { kid: kid.into() }
    }

    /// Creates a new `Internal` error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal { message: message.into() }
    }
}

/// Configuration validation errors.
#[derive(Debug, Error, PartialEq)]
#[non_exhaustive]
pub enum ConfigError {
    /// A numeric or duration setting is below its allowed minimum.
    #[error("{field} must be at least {min}, got {value}")]
    BelowMinimum {
        /// Name of the offending setting.
        field: &'static str,
        /// Minimum accepted value, rendered for display.
        min: String,
        /// Rejected value, rendered for display.
        value: String,
    },

    /// A setting is outside its allowed range or otherwise unusable.
    #[error("invalid {field}: {message}")]
    Invalid {
        /// Name of the offending setting.
        field: &'static str,
        /// Why the value was rejected.
        message: String,
    },
}

impl ConfigError {
    /// Creates a new `BelowMinimum` error.
    #[must_use]
    pub fn below_minimum(
        field: &'static str,
        min: impl std::fmt::Display,
        value: impl std::fmt::Display,
    ) -> Self {
        Self::BelowMinimum { field, min: min.to_string(), value: value.to_string() }
    }

    /// Creates a new `Invalid` error.
    #[must_use]
    pub fn invalid(field: &'static str, message: impl Into<String>) -> Self {
        Self::Invalid { field, message: message.into() }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = RegistryError::key_material_invalid("not a PEM document");
        assert_eq!(err.to_string(), "Invalid key material: not a PEM document");

        let err = RegistryError::key_not_found("key_1_100");
        assert_eq!(err.to_string(), "Key not found: key_1_100");

        let err = RegistryError::invalid_ttl("ttl must be non-zero");
        assert_eq!(err.to_string(), "Invalid key ttl: ttl must be non-zero");
    }

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::below_minimum("key_bits", 2048, 1024);
        assert_eq!(err.to_string(), "key_bits must be at least 2048, got 1024");

        let err = ConfigError::invalid("audience", "must not be empty");
        assert_eq!(err.to_string(), "invalid audience: must not be empty");
    }
}
