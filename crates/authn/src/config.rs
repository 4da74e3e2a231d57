//! Engine configuration.
//!
//! [`AuthnConfig`] gathers every tunable of the key lifecycle. It can be
//! built in code with [`AuthnConfig::builder`], deserialized (durations in
//! humantime syntax such as `"15m"` or `"60s"`), or read from the
//! environment with [`AuthnConfig::from_env`].
//!
//! # Environment
//!
//! | Variable | Setting | Default |
//! |----------|---------|---------|
//! | `GEOTRACKER_AUTH_SIGNING_KEY_TTL` | `signing_key_ttl` | `15m` |
//! | `GEOTRACKER_AUTH_ROTATION_FRACTION` | `rotation_fraction` | `0.5` |
//! | `GEOTRACKER_AUTH_CLOCK_SKEW` | `clock_skew` | `60s` |
//! | `GEOTRACKER_AUTH_TOKEN_TTL` | `token_ttl` | `5m` |
//! | `GEOTRACKER_AUTH_AUDIENCE` | `audience` | `geo-tracker` |
//! | `GEOTRACKER_AUTH_ISSUER_PREFIX` | `issuer_prefix` | `client-` |
//! | `GEOTRACKER_AUTH_KEY_BITS` | `key_bits` | `2048` |

use std::time::Duration;

use geotracker_common_storage::{
    ConfigError, RegistryConfig,
    auth::MIN_RSA_BITS,
    config::{DEFAULT_KEY_TTL, DEFAULT_SKEW_TOLERANCE},
};
use serde::{Deserialize, Serialize};

/// Default share of a key's ttl after which a replacement is generated.
pub const DEFAULT_ROTATION_FRACTION: f64 = 0.5;

/// Default token lifetime.
pub const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(5 * 60);

/// Default `aud` claim.
pub const DEFAULT_AUDIENCE: &str = "geo-tracker";

/// Default prefix of the `iss` claim; the tenant id is appended.
pub const DEFAULT_ISSUER_PREFIX: &str = "client-";

/// Default RSA modulus size for generated keys.
pub const DEFAULT_KEY_BITS: usize = 2048;

const ENV_PREFIX: &str = "GEOTRACKER_AUTH_";

/// Key lifecycle and token settings.
///
/// # Validation
///
/// - `signing_key_ttl` and `token_ttl` must be non-zero
/// - `rotation_fraction` must be in `(0, 1]`
/// - `key_bits` must be at least 2048
/// - `audience` must not be empty
/// - `token_ttl` must not exceed `(1 - rotation_fraction) × signing_key_ttl`
///   ([`max_token_ttl`](Self::max_token_ttl))
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AuthnConfig {
    /// Lifetime of generated signing keys.
    #[serde(with = "humantime_serde")]
    pub signing_key_ttl: Duration,
    /// Share of `signing_key_ttl` after which rotation is due.
    pub rotation_fraction: f64,
    /// Tolerance applied to key validity and token `exp`/`iat`.
    #[serde(with = "humantime_serde")]
    pub clock_skew: Duration,
    /// Lifetime of issued tokens when the caller does not choose one.
    #[serde(with = "humantime_serde")]
    pub token_ttl: Duration,
    /// Required `aud` claim.
    pub audience: String,
    /// Prefix of the default `iss` claim.
    pub issuer_prefix: String,
    /// RSA modulus size for generated keys.
    pub key_bits: usize,
}

impl Default for AuthnConfig {
    fn default() -> Self {
        Self {
            signing_key_ttl: DEFAULT_KEY_TTL,
            rotation_fraction: DEFAULT_ROTATION_FRACTION,
            clock_skew: DEFAULT_SKEW_TOLERANCE,
            token_ttl: DEFAULT_TOKEN_TTL,
            audience: DEFAULT_AUDIENCE.to_owned(),
            issuer_prefix: DEFAULT_ISSUER_PREFIX.to_owned(),
            key_bits: DEFAULT_KEY_BITS,
        }
    }
}

#[bon::bon]
impl AuthnConfig {
    /// Creates a validated configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if any setting fails [`validate`](Self::validate).
    ///
    /// # Example
    ///
    /// ```
    /// use std::time::Duration;
    /// use geotracker_common_authn::AuthnConfig;
    ///
    /// let config = AuthnConfig::builder()
    ///     .signing_key_ttl(Duration::from_secs(3600))
    ///     .token_ttl(Duration::from_secs(1800))
    ///     .build()
    ///     .unwrap();
    /// assert_eq!(config.audience, "geo-tracker");
    ///
    /// // A one-hour token cannot be signed by a 15 minute key.
    /// let err = AuthnConfig::builder().token_ttl(Duration::from_secs(3600)).build();
    /// assert!(err.is_err());
    /// ```
    #[builder]
    pub fn new(
        #[builder(default = DEFAULT_KEY_TTL)] signing_key_ttl: Duration,
        #[builder(default = DEFAULT_ROTATION_FRACTION)] rotation_fraction: f64,
        #[builder(default = DEFAULT_SKEW_TOLERANCE)] clock_skew: Duration,
        #[builder(default = DEFAULT_TOKEN_TTL)] token_ttl: Duration,
        #[builder(into, default = DEFAULT_AUDIENCE.to_owned())] audience: String,
        #[builder(into, default = DEFAULT_ISSUER_PREFIX.to_owned())] issuer_prefix: String,
        #[builder(default = DEFAULT_KEY_BITS)] key_bits: usize,
    ) -> Result<Self, ConfigError> {
        let config = Self {
            signing_key_ttl,
            rotation_fraction,
            clock_skew,
            token_ttl,
            audience,
            issuer_prefix,
            key_bits,
        };
        config.validate()?;
        Ok(config)
    }

    /// Reads settings from `GEOTRACKER_AUTH_*` environment variables over
    /// the defaults, then validates.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for an unparseable variable and any
    /// error from [`validate`](Self::validate).
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Like [`from_env`](Self::from_env), reading variables through `lookup`.
    ///
    /// # Errors
    ///
    /// Same as [`from_env`](Self::from_env).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |suffix: &str| lookup(&format!("{ENV_PREFIX}{suffix}"));
        let mut config = Self::default();

        if let Some(v) = var("SIGNING_KEY_TTL") {
            config.signing_key_ttl = parse_duration("signing_key_ttl", &v)?;
        }
        if let Some(v) = var("ROTATION_FRACTION") {
            config.rotation_fraction = v.trim().parse().map_err(|_| {
                ConfigError::invalid("rotation_fraction", format!("'{v}' is not a number"))
            })?;
        }
        if let Some(v) = var("CLOCK_SKEW") {
            config.clock_skew = parse_duration("clock_skew", &v)?;
        }
        if let Some(v) = var("TOKEN_TTL") {
            config.token_ttl = parse_duration("token_ttl", &v)?;
        }
        if let Some(v) = var("AUDIENCE") {
            config.audience = v;
        }
        if let Some(v) = var("ISSUER_PREFIX") {
            config.issuer_prefix = v;
        }
        if let Some(v) = var("KEY_BITS") {
            config.key_bits = v.trim().parse().map_err(|_| {
                ConfigError::invalid("key_bits", format!("'{v}' is not an integer"))
            })?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Checks a configuration obtained by deserialization or field mutation.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.signing_key_ttl.is_zero() {
            return Err(ConfigError::below_minimum("signing_key_ttl", "1ms", "0s"));
        }
        if self.token_ttl.is_zero() {
            return Err(ConfigError::below_minimum("token_ttl", "1ms", "0s"));
        }
        if !(self.rotation_fraction > 0.0 && self.rotation_fraction <= 1.0) {
            return Err(ConfigError::invalid(
                "rotation_fraction",
                format!("must be in (0, 1], got {}", self.rotation_fraction),
            ));
        }
        if self.key_bits < MIN_RSA_BITS {
            return Err(ConfigError::below_minimum("key_bits", MIN_RSA_BITS, self.key_bits));
        }
        if self.audience.trim().is_empty() {
            return Err(ConfigError::invalid("audience", "must not be empty"));
        }
        let window = self.max_token_ttl();
        if self.token_ttl > window {
            return Err(ConfigError::invalid(
                "token_ttl",
                format!(
                    "{} exceeds the {} a signing key stays verifiable after its last use",
                    humantime::format_duration(self.token_ttl),
                    humantime::format_duration(window),
                ),
            ));
        }
        Ok(())
    }

    /// Longest token lifetime the current key settings can honour.
    ///
    /// A key signs until `rotation_fraction` of its ttl and stays published
    /// until `expires_at + clock_skew`, while the verifier accepts a token
    /// until `exp + clock_skew`. The skew cancels out, so the window is the
    /// unrotated share of the key ttl.
    #[must_use]
    pub fn max_token_ttl(&self) -> Duration {
        let share = (1.0 - self.rotation_fraction).clamp(0.0, 1.0);
        self.signing_key_ttl.mul_f64(share)
    }

    /// Registry settings derived from this configuration.
    #[must_use]
    pub fn registry_config(&self) -> RegistryConfig {
        RegistryConfig { default_key_ttl: self.signing_key_ttl, skew_tolerance: self.clock_skew }
    }

    /// Default issuer for `tenant_id`.
    #[must_use]
    pub fn issuer_for(&self, tenant_id: impl std::fmt::Display) -> String {
        format!("{}{tenant_id}", self.issuer_prefix)
    }
}

fn parse_duration(field: &'static str, value: &str) -> Result<Duration, ConfigError> {
    humantime::parse_duration(value.trim())
        .map_err(|e| ConfigError::invalid(field, format!("'{value}': {e}")))
}
