//! Discovery document publishing.

use std::sync::Arc;

use geotracker_common_storage::{
    TenantId,
    auth::{DiscoveryDocument, KeyRegistry},
};
use tracing::{debug, warn};

use crate::{error::AuthError, metrics::AuthnMetrics, rotation::RotationPolicy};

/// Produces the public key set of a tenant.
#[derive(Debug, Clone)]
pub struct DiscoveryPublisher {
    registry: Arc<KeyRegistry>,
    rotation: RotationPolicy,
    metrics: AuthnMetrics,
}

impl DiscoveryPublisher {
    /// Creates a publisher over `registry`, rotating through `rotation`.
    #[must_use]
    pub fn new(
        registry: Arc<KeyRegistry>,
        rotation: RotationPolicy,
        metrics: AuthnMetrics,
    ) -> Self {
        Self { registry, rotation, metrics }
    }

    /// Cleans up expired keys and returns the active public keys.
    ///
    /// A tenant left without any active key gets exactly one rotation before
    /// the document is built.
    ///
    /// # Errors
    ///
    /// Returns the rotation error when a needed rotation fails. No document
    /// is produced in that case.
    #[tracing::instrument(skip_all, fields(tenant_id = %tenant_id))]
    pub async fn publish(&self, tenant_id: TenantId) -> Result<DiscoveryDocument, AuthError> {
        let document = self.document(tenant_id);
        if !document.is_empty() {
            return Ok(document);
        }

        // A concurrent rotation may have landed since the document was built.
        if self.rotation.should_rotate(tenant_id) {
            debug!("no active key, rotating before publishing");
            self.rotation.rotate(tenant_id).await?;
        }
        Ok(self.registry.public_keys(tenant_id))
    }

    /// Cleans up expired keys and returns the active public keys, never
    /// rotating.
    ///
    /// A cleanup failure is logged and the document is built from the
    /// uncleaned state, which the activity filter still narrows to valid
    /// keys.
    pub fn document(&self, tenant_id: TenantId) -> DiscoveryDocument {
        match self.registry.cleanup(tenant_id) {
            Ok(0) => {},
            Ok(removed) => self.metrics.record_cleaned_up(removed),
            Err(e) => warn!(tenant_id = %tenant_id, error = %e, "key cleanup failed"),
        }
        self.registry.public_keys(tenant_id)
    }
}
