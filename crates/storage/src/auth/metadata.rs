//! Key metadata and key identifier format.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{clock::add_duration, types::TenantId};

/// Prefix shared by every key identifier.
pub const KID_PREFIX: &str = "key_";

/// Lifecycle record of one registered signing key.
///
/// Metadata is immutable once registered. Activity is derived from the
/// current time and the registry's skew tolerance, never stored.
///
/// # Validation Rules
///
/// - active: `created_at <= now <= expires_at + skew`
/// - expired: `now > expires_at + skew`
///
/// A key whose `created_at` is still in the future is neither active nor
/// expired.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct KeyMetadata {
    /// Key ID, also carried in the token header.
    pub kid: String,
    /// Tenant that owns the key.
    pub tenant_id: TenantId,
    /// Registration instant.
    pub created_at: DateTime<Utc>,
    /// End of the key's nominal lifetime.
    pub expires_at: DateTime<Utc>,
}

impl KeyMetadata {
    /// Nominal lifetime of the key.
    #[must_use]
    pub fn ttl(&self) -> Duration {
        (self.expires_at - self.created_at).to_std().unwrap_or_default()
    }

    /// Time elapsed since registration, zero if `now` precedes it.
    #[must_use]
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        (now - self.created_at).to_std().unwrap_or_default()
    }

    /// Whether the key may currently verify tokens.
    #[must_use]
    pub fn is_active(&self, now: DateTime<Utc>, skew: Duration) -> bool {
        self.created_at <= now && now <= add_duration(self.expires_at, skew)
    }

    /// Whether the key is past its grace period and eligible for cleanup.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>, skew: Duration) -> bool {
        now > add_duration(self.expires_at, skew)
    }
}

/// Derived position of a key in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyState {
    /// Registered with a creation time still in the future.
    Pending,
    /// Active and the newest active key of its tenant: used for new tokens.
    Issuable,
    /// Active but superseded by a newer key: verification only.
    VerifyOnly,
    /// Past expiry plus skew.
    Expired,
}

/// Renders a key identifier from its tenant and microsecond timestamp.
#[must_use]
pub fn format_kid(tenant_id: TenantId, micros: i64) -> String {
    format!("{KID_PREFIX}{tenant_id}_{micros}")
}

/// Extracts the owning tenant from a key identifier.
///
/// Returns `None` for anything not shaped like `key_<tenant>_<micros>`.
#[must_use]
pub fn parse_kid_tenant(kid: &str) -> Option<TenantId> {
    let rest = kid.strip_prefix(KID_PREFIX)?;
    let (tenant, micros) = rest.rsplit_once('_')?;
    if micros.is_empty() || !micros.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    tenant.parse().ok()
}
