//! Authentication error types.
//!
//! Hard failures of key management and issuance are [`AuthError`]s and
//! propagate to callers. Verification never fails hard: every rejected token
//! yields the single opaque [`VerificationFailed`], while the crate-private
//! [`RejectReason`] records why for debug logging and metrics.

use std::time::Duration;

use geotracker_common_storage::{ConfigError, RegistryError, TenantId};
use thiserror::Error;

/// Key management and token issuance errors.
///
/// # Non-exhaustive
///
/// This enum is marked `#[non_exhaustive]`; new variants may be added in
/// future minor releases without a semver-breaking change. Downstream match
/// expressions must include a wildcard arm (`_ =>`).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AuthError {
    /// Malformed public or private key input; nothing was registered.
    #[error("Invalid key material: {0}")]
    KeyMaterialInvalid(String),

    /// The key chosen for issuance has no private half.
    ///
    /// Indicates an internal consistency fault, for example a tenant whose
    /// newest active key was registered public-only.
    #[error("No private key available for {kid}")]
    NoPrivateKeyAvailable {
        /// Key ID selected for signing.
        kid: String,
    },

    /// Rotation finished but the tenant still has no active key.
    #[error("No active signing key for tenant {tenant_id}")]
    NoActiveKey {
        /// Tenant that was being served.
        tenant_id: TenantId,
    },

    /// The key generator failed.
    #[error("Key generation failed: {0}")]
    KeyGeneration(String),

    /// Token encoding or signing failed.
    #[error("Token signing failed: {0}")]
    Signing(String),

    /// Requested token lifetime is zero or longer than any key stays
    /// published after signing it.
    #[error("Token ttl of {}s must be between 1s and {}s", .requested.as_secs(), .max.as_secs())]
    InvalidTokenTtl {
        /// Lifetime asked for by the caller.
        requested: Duration,
        /// Longest lifetime the key settings allow.
        max: Duration,
    },

    /// Key registry error.
    ///
    /// Wraps the original [`RegistryError`] to preserve the full error source
    /// chain for debugging and structured logging.
    #[error("Key registry error: {0}")]
    Registry(
        /// The underlying registry error.
        #[source]
        RegistryError,
    ),

    /// Configuration rejected by validation.
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),
}

impl AuthError {
    /// Creates a new `KeyMaterialInvalid` error.
    #[must_use]
    pub fn key_material_invalid(message: impl Into<String>) -> Self {
        Self::KeyMaterialInvalid(message.into())
    }

    /// Creates a new `NoPrivateKeyAvailable` error.
    #[must_use]
    pub fn no_private_key_available(kid: impl Into<String>) -> Self {
        Self::NoPrivateKeyAvailable { kid: kid.into() }
    }

    /// Creates a new `NoActiveKey` error.
    #[must_use]
    pub fn no_active_key(tenant_id: TenantId) -> Self {
        Self::NoActiveKey { tenant_id }
    }

    /// Creates a new `KeyGeneration` error.
    #[must_use]
    pub fn key_generation(message: impl Into<String>) -> Self {
        Self::KeyGeneration(message.into())
    }

    /// Creates a new `Signing` error.
    #[must_use]
    pub fn signing(message: impl Into<String>) -> Self {
        Self::Signing(message.into())
    }

    /// Creates a new `InvalidTokenTtl` error.
    #[must_use]
    pub fn invalid_token_ttl(requested: Duration, max: Duration) -> Self {
        Self::InvalidTokenTtl { requested, max }
    }
}

impl From<RegistryError> for AuthError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::KeyMaterialInvalid { message } => AuthError::KeyMaterialInvalid(message),
            other => AuthError::Registry(other),
        }
    }
}

impl From<jsonwebtoken::errors::Error> for AuthError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;

        match err.kind() {
            ErrorKind::InvalidRsaKey(_) | ErrorKind::InvalidKeyFormat => {
                AuthError::key_material_invalid("signing key rejected by the JWT encoder")
            },
            _ => AuthError::signing(err.to_string()),
        }
    }
}

/// Result type alias for authentication operations.
pub type Result<T> = std::result::Result<T, AuthError>;

/// Opaque outcome of a rejected token.
///
/// Deliberately carries no detail so callers cannot leak which check failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Token verification failed")]
pub struct VerificationFailed;

/// Why a token was rejected. Internal to logging and metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RejectReason {
    MissingKid,
    UnsupportedAlgorithm,
    MalformedToken,
    InvalidKid,
    UnknownKid,
    BadSignature,
    TenantMismatch,
    Expired,
    IssuedInFuture,
    InvalidIssuer,
    InvalidAudience,
}

impl RejectReason {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::MissingKid => "missing_kid",
            Self::UnsupportedAlgorithm => "unsupported_algorithm",
            Self::MalformedToken => "malformed_token",
            Self::InvalidKid => "invalid_kid",
            Self::UnknownKid => "unknown_kid",
            Self::BadSignature => "bad_signature",
            Self::TenantMismatch => "tenant_mismatch",
            Self::Expired => "expired",
            Self::IssuedInFuture => "issued_in_future",
            Self::InvalidIssuer => "invalid_issuer",
            Self::InvalidAudience => "invalid_audience",
        }
    }
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
