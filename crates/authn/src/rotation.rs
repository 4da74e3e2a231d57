//! Key rotation policy.
//!
//! A tenant is due for a new key when it has no active key, or when its
//! newest active key has lived longer than `rotation_fraction` of its ttl.
//! Rotation never removes anything: the superseded key stays published for
//! verification until it expires, so tokens signed just before a rotation
//! keep verifying.

use std::{sync::Arc, time::Duration};

use geotracker_common_storage::{
    TenantId,
    auth::{
        KeyRegistry,
        audit::{self, AuditAction, AuditResult},
    },
};
use tracing::{debug, warn};

use crate::{
    config::AuthnConfig,
    error::AuthError,
    keygen::{KeyGenerator, generate_blocking},
    metrics::AuthnMetrics,
};

/// Decides when a tenant needs a new key and performs the rotation.
#[derive(Debug, Clone)]
pub struct RotationPolicy {
    registry: Arc<KeyRegistry>,
    generator: Arc<dyn KeyGenerator>,
    rotation_fraction: f64,
    key_ttl: Duration,
    metrics: AuthnMetrics,
}

impl RotationPolicy {
    /// Creates a policy rotating keys of `registry` with `generator`.
    #[must_use]
    pub fn new(
        registry: Arc<KeyRegistry>,
        generator: Arc<dyn KeyGenerator>,
        config: &AuthnConfig,
        metrics: AuthnMetrics,
    ) -> Self {
        Self {
            registry,
            generator,
            rotation_fraction: config.rotation_fraction,
            key_ttl: config.signing_key_ttl,
            metrics,
        }
    }

    /// Whether `tenant_id` should get a new key now.
    #[must_use]
    pub fn should_rotate(&self, tenant_id: TenantId) -> bool {
        let Some(newest) = self.registry.newest_active(tenant_id) else {
            return true;
        };
        let meta = newest.metadata();
        let age = meta.age(self.registry.now());
        age.as_secs_f64() > meta.ttl().as_secs_f64() * self.rotation_fraction
    }

    /// Generates and registers a new key for `tenant_id` unconditionally.
    ///
    /// Concurrent rotations of the same tenant each register their own key.
    ///
    /// # Errors
    ///
    /// Returns the generator's error, or the registry's if the generated
    /// key was rejected.
    #[tracing::instrument(skip_all, fields(tenant_id = %tenant_id))]
    pub async fn rotate(&self, tenant_id: TenantId) -> Result<String, AuthError> {
        match self.generate_and_register(tenant_id).await {
            Ok(kid) => {
                self.metrics.record_rotation();
                audit::emit(
                    AuditAction::RotateKey,
                    &audit::key_resource(tenant_id, &kid),
                    &AuditResult::Success,
                    None,
                );
                Ok(kid)
            },
            Err(e) => {
                self.metrics.record_rotation_failure();
                warn!(error = %e, "key rotation failed");
                audit::emit(
                    AuditAction::RotateKey,
                    &audit::tenant_resource(tenant_id),
                    &AuditResult::Failure(e.to_string()),
                    None,
                );
                Err(e)
            },
        }
    }

    /// Rotates only if [`should_rotate`](Self::should_rotate) says so.
    ///
    /// Returns the new kid, or `None` when the current key is still fresh.
    ///
    /// # Errors
    ///
    /// Same as [`rotate`](Self::rotate).
    pub async fn rotate_if_needed(&self, tenant_id: TenantId) -> Result<Option<String>, AuthError> {
        if !self.should_rotate(tenant_id) {
            return Ok(None);
        }
        debug!(tenant_id = %tenant_id, "rotation due");
        self.rotate(tenant_id).await.map(Some)
    }

    /// Lifetime given to rotated keys.
    #[must_use]
    pub fn key_ttl(&self) -> Duration {
        self.key_ttl
    }

    async fn generate_and_register(&self, tenant_id: TenantId) -> Result<String, AuthError> {
        let pair = generate_blocking(Arc::clone(&self.generator)).await?;
        let kid = self.registry.register(
            tenant_id,
            &pair.public_key_pem,
            Some(&pair.private_key_pem),
            Some(self.key_ttl),
        )?;
        Ok(kid)
    }
}
