//! Concurrent per-tenant signing key registry.
//!
//! The registry is the sole source of truth for every tenant's keys. Tenants
//! live in a sharded [`DashMap`], each behind its own [`RwLock`], so writers
//! on one tenant never contend with readers or writers on another.
//!
//! Records are immutable once written and shared as [`Arc`]s: a reader that
//! takes a snapshot keeps a consistent view of each key even while cleanup
//! removes it from the registry.

use std::{sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use fail::fail_point;
use parking_lot::RwLock;
use tracing::debug;

use super::{
    audit::{self, AuditAction, AuditResult},
    jwk::{DiscoveryDocument, Jwk},
    material::{PrivateKeyMaterial, PublicKeyMaterial},
    metadata::{KeyMetadata, KeyState, format_kid, parse_kid_tenant},
};
use crate::{
    clock::{Clock, SystemClock, add_duration},
    config::RegistryConfig,
    error::{RegistryError, RegistryResult},
    types::TenantId,
};

/// One key as held by the registry.
#[derive(Debug)]
pub struct RegisteredKey {
    metadata: KeyMetadata,
    public: PublicKeyMaterial,
    private: Option<PrivateKeyMaterial>,
    jwk: Jwk,
}

impl RegisteredKey {
    /// Lifecycle metadata.
    #[must_use]
    pub fn metadata(&self) -> &KeyMetadata {
        &self.metadata
    }

    /// Key ID.
    #[must_use]
    pub fn kid(&self) -> &str {
        &self.metadata.kid
    }

    /// Public half.
    #[must_use]
    pub fn public(&self) -> &PublicKeyMaterial {
        &self.public
    }

    /// Private half, if it was supplied at registration.
    #[must_use]
    pub fn private(&self) -> Option<&PrivateKeyMaterial> {
        self.private.as_ref()
    }

    /// Published JWK for this key.
    #[must_use]
    pub fn jwk(&self) -> &Jwk {
        &self.jwk
    }
}

#[derive(Debug, Default)]
struct TenantKeys {
    /// Registration order, oldest first.
    keys: Vec<Arc<RegisteredKey>>,
    last_micros: i64,
}

impl TenantKeys {
    fn next_micros(&mut self, now: DateTime<Utc>) -> i64 {
        let micros = now.timestamp_micros().max(self.last_micros.saturating_add(1));
        self.last_micros = micros;
        micros
    }
}

/// In-memory registry of every tenant's signing keys.
///
/// # Example
///
/// ```no_run
/// use geotracker_common_storage::{TenantId, auth::KeyRegistry};
///
/// # fn pems() -> (String, String) { unimplemented!() }
/// let registry = KeyRegistry::default();
/// let (public_pem, private_pem) = pems();
///
/// let tenant = TenantId::from(42);
/// let kid = registry.register(tenant, &public_pem, Some(&private_pem), None).unwrap();
/// assert!(kid.starts_with("key_42_"));
/// assert_eq!(registry.active_kids(tenant), vec![kid]);
/// ```
#[derive(Debug)]
pub struct KeyRegistry {
    tenants: DashMap<TenantId, Arc<RwLock<TenantKeys>>>,
    clock: Arc<dyn Clock>,
    config: RegistryConfig,
}

impl Default for KeyRegistry {
    fn default() -> Self {
        Self::builder().build()
    }
}

#[bon::bon]
impl KeyRegistry {
    /// Creates an empty registry.
    ///
    /// Without a `clock` the registry reads the system clock.
    #[builder]
    pub fn new(#[builder(default)] config: RegistryConfig, clock: Option<Arc<dyn Clock>>) -> Self {
        Self {
            tenants: DashMap::new(),
            clock: clock.unwrap_or_else(|| Arc::new(SystemClock)),
            config,
        }
    }

    /// The registry's configuration.
    #[must_use]
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Tolerance applied to key and token time checks.
    #[must_use]
    pub fn skew(&self) -> Duration {
        self.config.skew_tolerance
    }

    /// Current time as seen by the registry.
    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Shared handle to the registry's clock.
    #[must_use]
    pub fn clock(&self) -> Arc<dyn Clock> {
        Arc::clone(&self.clock)
    }

    /// Registers a key for `tenant_id` and returns its kid.
    ///
    /// The key is valid from now until `now + ttl` (the configured default
    /// when `ttl` is `None`). Key text is fully parsed and checked before any
    /// state changes.
    ///
    /// # Errors
    ///
    /// - [`RegistryError::KeyMaterialInvalid`] if the public key is malformed or too short, or the
    ///   private key is malformed or belongs to a different public key
    /// - [`RegistryError::InvalidTtl`] if `ttl` is zero
    #[tracing::instrument(skip_all, fields(tenant_id = %tenant_id))]
    pub fn register(
        &self,
        tenant_id: TenantId,
        public_pem: &str,
        private_pem: Option<&str>,
        ttl: Option<Duration>,
    ) -> RegistryResult<String> {
        let ttl = ttl.unwrap_or(self.config.default_key_ttl);
        if ttl.is_zero() {
            return Err(RegistryError::invalid_ttl("ttl must be non-zero"));
        }
        let public = PublicKeyMaterial::from_pem(public_pem)?;
        let private =
            private_pem.map(|pem| PrivateKeyMaterial::from_pem(pem, &public)).transpose()?;

        let slot = Arc::clone(self.tenants.entry(tenant_id).or_default().value());
        let mut tenant = slot.write();

        let created_at = self.clock.now();
        let kid = format_kid(tenant_id, tenant.next_micros(created_at));
        let expires_at = add_duration(created_at, ttl);
        let metadata = KeyMetadata { kid: kid.clone(), tenant_id, created_at, expires_at };
        let jwk = Jwk::from_material(kid.clone(), &public);
        let has_private = private.is_some();
        tenant.keys.push(Arc::new(RegisteredKey { metadata, public, private, jwk }));
        drop(tenant);

        audit::emit(
            AuditAction::RegisterKey,
            &audit::key_resource(tenant_id, &kid),
            &AuditResult::Success,
            Some(if has_private { "private=true" } else { "private=false" }),
        );
        Ok(kid)
    }

    /// Snapshot of the key with the given kid.
    ///
    /// A kid that does not follow the `key_<tenant>_<micros>` format is not found.
    #[must_use]
    pub fn get(&self, kid: &str) -> Option<Arc<RegisteredKey>> {
        let tenant_id = parse_kid_tenant(kid)?;
        let slot = self.slot(tenant_id)?;
        let tenant = slot.read();
        tenant.keys.iter().find(|k| k.kid() == kid).cloned()
    }

    /// Metadata of the key with the given kid.
    #[must_use]
    pub fn get_metadata(&self, kid: &str) -> Option<KeyMetadata> {
        self.get(kid).map(|k| k.metadata.clone())
    }

    /// Derived lifecycle state of the key with the given kid.
    #[must_use]
    pub fn key_state(&self, kid: &str) -> Option<KeyState> {
        let key = self.get(kid)?;
        let now = self.clock.now();
        let skew = self.skew();
        let meta = key.metadata();
        if meta.is_expired(now, skew) {
            return Some(KeyState::Expired);
        }
        if !meta.is_active(now, skew) {
            return Some(KeyState::Pending);
        }
        let newest = self.newest_active(meta.tenant_id);
        if newest.is_some_and(|n| n.kid() == kid) {
            Some(KeyState::Issuable)
        } else {
            Some(KeyState::VerifyOnly)
        }
    }

    /// Active kids of `tenant_id`, oldest first.
    #[must_use]
    pub fn active_kids(&self, tenant_id: TenantId) -> Vec<String> {
        self.active_keys(tenant_id).iter().map(|k| k.kid().to_owned()).collect()
    }

    /// Snapshots of the active keys of `tenant_id`, oldest first.
    #[must_use]
    pub fn active_keys(&self, tenant_id: TenantId) -> Vec<Arc<RegisteredKey>> {
        let Some(slot) = self.slot(tenant_id) else {
            return Vec::new();
        };
        let now = self.clock.now();
        let skew = self.skew();
        let tenant = slot.read();
        tenant.keys.iter().filter(|k| k.metadata.is_active(now, skew)).cloned().collect()
    }

    /// The most recently registered active key of `tenant_id`.
    #[must_use]
    pub fn newest_active(&self, tenant_id: TenantId) -> Option<Arc<RegisteredKey>> {
        let slot = self.slot(tenant_id)?;
        let now = self.clock.now();
        let skew = self.skew();
        let tenant = slot.read();
        tenant.keys.iter().rev().find(|k| k.metadata.is_active(now, skew)).cloned()
    }

    /// Public projection of the active keys of `tenant_id`.
    #[must_use]
    pub fn public_keys(&self, tenant_id: TenantId) -> DiscoveryDocument {
        DiscoveryDocument {
            keys: self.active_keys(tenant_id).iter().map(|k| k.jwk.clone()).collect(),
        }
    }

    /// Removes every expired key of `tenant_id` and returns how many were removed.
    ///
    /// Dropping a removed record purges its private material once no
    /// in-flight snapshot still holds it.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Internal`] only through fault injection.
    #[tracing::instrument(skip(self), fields(tenant_id = %tenant_id))]
    pub fn cleanup(&self, tenant_id: TenantId) -> RegistryResult<usize> {
        fail_point!("registry-cleanup", |_| {
            Err(RegistryError::internal("injected failure during cleanup"))
        });

        let Some(slot) = self.slot(tenant_id) else {
            return Ok(0);
        };
        let now = self.clock.now();
        let skew = self.skew();

        // Readers only contend with the write lock when something expired.
        if !slot.read().keys.iter().any(|k| k.metadata.is_expired(now, skew)) {
            debug!("no expired keys");
            return Ok(0);
        }

        let mut tenant = slot.write();
        let before = tenant.keys.len();
        tenant.keys.retain(|k| !k.metadata.is_expired(now, skew));
        let removed = before - tenant.keys.len();
        drop(tenant);

        if removed > 0 {
            audit::emit(
                AuditAction::CleanupKeys,
                &audit::tenant_resource(tenant_id),
                &AuditResult::Success,
                Some(&format!("removed={removed}")),
            );
        } else {
            debug!("no expired keys");
        }
        Ok(removed)
    }

    /// Number of keys currently held for `tenant_id`, expired ones included.
    #[must_use]
    pub fn key_count(&self, tenant_id: TenantId) -> usize {
        self.slot(tenant_id).map_or(0, |slot| slot.read().keys.len())
    }

    /// Number of tenants that have ever registered a key.
    #[must_use]
    pub fn tenant_count(&self) -> usize {
        self.tenants.len()
    }

    fn slot(&self, tenant_id: TenantId) -> Option<Arc<RwLock<TenantKeys>>> {
        self.tenants.get(&tenant_id).map(|entry| Arc::clone(entry.value()))
    }
}
