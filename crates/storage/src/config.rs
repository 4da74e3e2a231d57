//! Registry configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// Default lifetime of a registered signing key.
pub const DEFAULT_KEY_TTL: Duration = Duration::from_secs(15 * 60);

/// Default tolerance applied to key validity and token time claims.
pub const DEFAULT_SKEW_TOLERANCE: Duration = Duration::from_secs(60);

/// Settings for a [`KeyRegistry`](crate::auth::KeyRegistry).
///
/// # Validation
///
/// - `default_key_ttl` must be non-zero
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use geotracker_common_storage::RegistryConfig;
///
/// let config = RegistryConfig::builder()
///     .default_key_ttl(Duration::from_secs(600))
///     .build()
///     .unwrap();
/// assert_eq!(config.skew_tolerance, Duration::from_secs(60));
///
/// assert!(RegistryConfig::builder().default_key_ttl(Duration::ZERO).build().is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RegistryConfig {
    /// Lifetime given to keys registered without an explicit ttl.
    #[serde(with = "humantime_serde")]
    pub default_key_ttl: Duration,
    /// Grace period past `expires_at` during which a key still counts as active.
    #[serde(with = "humantime_serde")]
    pub skew_tolerance: Duration,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self { default_key_ttl: DEFAULT_KEY_TTL, skew_tolerance: DEFAULT_SKEW_TOLERANCE }
    }
}

#[bon::bon]
impl RegistryConfig {
    /// Creates a validated registry configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if `default_key_ttl` is zero.
    #[builder]
    pub fn new(
        #[builder(default = DEFAULT_KEY_TTL)] default_key_ttl: Duration,
        #[builder(default = DEFAULT_SKEW_TOLERANCE)] skew_tolerance: Duration,
    ) -> Result<Self, ConfigError> {
        let config = Self { default_key_ttl, skew_tolerance };
        config.validate()?;
        Ok(config)
    }

    /// Checks a configuration obtained by deserialization or field mutation.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::BelowMinimum`] if `default_key_ttl` is zero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_key_ttl.is_zero() {
            return Err(ConfigError::below_minimum("default_key_ttl", "1ms", "0s"));
        }
        Ok(())
    }
}
