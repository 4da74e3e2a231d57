//! The assembled engine.
//!
//! [`KeyService`] wires one registry, rotation policy, publisher, issuer and
//! verifier around a shared configuration and metrics collector. It is the
//! entry point embedders normally use; the individual components are public
//! for callers who need a different wiring.

use std::{sync::Arc, time::Duration};

use geotracker_common_storage::{
    Clock, ConfigError, RegistryError, TenantId,
    auth::{DiscoveryDocument, KeyMetadata, KeyRegistry},
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{
    config::AuthnConfig,
    discovery::DiscoveryPublisher,
    error::{AuthError, VerificationFailed},
    issuer::TokenIssuer,
    jwt::TokenClaims,
    keygen::{KeyGenerator, RsaKeyGenerator},
    metrics::AuthnMetrics,
    rotation::RotationPolicy,
    verifier::TokenVerifier,
};

/// Result of registering a key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyRegistration {
    /// Assigned key ID.
    pub kid: String,
    /// Key lifetime in whole minutes.
    pub expires_in_minutes: u64,
}

/// Multi-tenant signing key lifecycle and token engine.
///
/// Cloning is cheap and clones share all state.
#[derive(Debug, Clone)]
pub struct KeyService {
    config: Arc<AuthnConfig>,
    registry: Arc<KeyRegistry>,
    rotation: RotationPolicy,
    publisher: DiscoveryPublisher,
    issuer: TokenIssuer,
    verifier: TokenVerifier,
    metrics: AuthnMetrics,
}

#[bon::bon]
impl KeyService {
    /// Builds an engine.
    ///
    /// `clock` defaults to the system clock and `generator` to an
    /// [`RsaKeyGenerator`] sized by `config.key_bits`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if `config` fails validation.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use geotracker_common_authn::{AuthnConfig, KeyService};
    /// use geotracker_common_storage::TenantId;
    ///
    /// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// let service = KeyService::builder().config(AuthnConfig::default()).build()?;
    ///
    /// let tenant = TenantId::from(42);
    /// let token = service.issue(tenant, serde_json::Map::new(), None).await?;
    /// let claims = service.verify(&token, tenant)?;
    /// assert_eq!(claims.tenant_id, tenant);
    /// # Ok(())
    /// # }
    /// ```
    #[builder]
    pub fn new(
        #[builder(default)] config: AuthnConfig,
        clock: Option<Arc<dyn Clock>>,
        generator: Option<Arc<dyn KeyGenerator>>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let generator =
            generator.unwrap_or_else(|| Arc::new(RsaKeyGenerator::new(config.key_bits)));
        let registry = Arc::new(
            KeyRegistry::builder()
                .config(config.registry_config())
                .maybe_clock(clock)
                .build(),
        );
        let metrics = AuthnMetrics::new();

        let rotation =
            RotationPolicy::new(Arc::clone(&registry), generator, &config, metrics.clone());
        let publisher =
            DiscoveryPublisher::new(Arc::clone(&registry), rotation.clone(), metrics.clone());
        let issuer =
            TokenIssuer::new(Arc::clone(&registry), rotation.clone(), &config, metrics.clone());
        let verifier = TokenVerifier::new(
            Arc::clone(&registry),
            publisher.clone(),
            &config,
            metrics.clone(),
        );

        Ok(Self {
            config: Arc::new(config),
            registry,
            rotation,
            publisher,
            issuer,
            verifier,
            metrics,
        })
    }

    /// Registers externally provided key material for `tenant_id`.
    ///
    /// `ttl` defaults to the configured signing key ttl.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::KeyMaterialInvalid`] for malformed or mismatched
    /// key material, in which case nothing was registered.
    pub fn register_key(
        &self,
        tenant_id: TenantId,
        public_key_pem: &str,
        private_key_pem: Option<&str>,
        ttl: Option<Duration>,
    ) -> Result<KeyRegistration, AuthError> {
        let ttl = ttl.unwrap_or(self.config.signing_key_ttl);
        let kid = self.registry.register(tenant_id, public_key_pem, private_key_pem, Some(ttl))?;
        Ok(KeyRegistration { kid, expires_in_minutes: ttl.as_secs() / 60 })
    }

    /// Metadata of `kid`.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Registry`] wrapping
    /// [`RegistryError::KeyNotFound`] if the kid is unknown or malformed.
    pub fn get_metadata(&self, kid: &str) -> Result<KeyMetadata, AuthError> {
        self.registry.get_metadata(kid).ok_or_else(|| RegistryError::key_not_found(kid).into())
    }

    /// Active kids of `tenant_id`, oldest first.
    #[must_use]
    pub fn active_kids(&self, tenant_id: TenantId) -> Vec<String> {
        self.registry.active_kids(tenant_id)
    }

    /// Removes expired keys of `tenant_id`, returning how many were removed.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Registry`] if cleanup fails.
    pub fn cleanup(&self, tenant_id: TenantId) -> Result<usize, AuthError> {
        let removed = self.registry.cleanup(tenant_id)?;
        self.metrics.record_cleaned_up(removed);
        Ok(removed)
    }

    /// See [`RotationPolicy::should_rotate`].
    #[must_use]
    pub fn should_rotate(&self, tenant_id: TenantId) -> bool {
        self.rotation.should_rotate(tenant_id)
    }

    /// See [`RotationPolicy::rotate`].
    ///
    /// # Errors
    ///
    /// Returns the generation or registration error.
    pub async fn rotate(&self, tenant_id: TenantId) -> Result<String, AuthError> {
        self.rotation.rotate(tenant_id).await
    }

    /// See [`DiscoveryPublisher::publish`].
    ///
    /// # Errors
    ///
    /// Returns the rotation error when a needed rotation fails.
    pub async fn publish(&self, tenant_id: TenantId) -> Result<DiscoveryDocument, AuthError> {
        self.publisher.publish(tenant_id).await
    }

    /// See [`TokenIssuer::issue`].
    ///
    /// # Errors
    ///
    /// See [`TokenIssuer::issue`].
    pub async fn issue(
        &self,
        tenant_id: TenantId,
        claims: Map<String, Value>,
        ttl: Option<Duration>,
    ) -> Result<String, AuthError> {
        self.issuer.issue(tenant_id, claims, ttl).await
    }

    /// See [`TokenVerifier::verify`].
    ///
    /// # Errors
    ///
    /// Returns [`VerificationFailed`] for every rejected token.
    pub fn verify(
        &self,
        token: &str,
        tenant_id: TenantId,
    ) -> Result<TokenClaims, VerificationFailed> {
        self.verifier.verify(token, tenant_id)
    }

    /// Engine configuration.
    #[must_use]
    pub fn config(&self) -> &AuthnConfig {
        &self.config
    }

    /// Shared metrics collector.
    #[must_use]
    pub fn metrics(&self) -> &AuthnMetrics {
        &self.metrics
    }

    /// Underlying key registry.
    #[must_use]
    pub fn registry(&self) -> &Arc<KeyRegistry> {
        &self.registry
    }
}
