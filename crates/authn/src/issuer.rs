//! Token issuance.

use std::{sync::Arc, time::Duration};

use geotracker_common_storage::{
    TenantId,
    auth::KeyRegistry,
    clock::add_duration,
};
use serde_json::{Map, Value};
use tracing::error;

use crate::{
    config::AuthnConfig,
    error::AuthError,
    jwt::{self, TokenClaims},
    metrics::AuthnMetrics,
    rotation::RotationPolicy,
};

/// Signs tokens with the tenant's newest active key.
#[derive(Debug, Clone)]
pub struct TokenIssuer {
    registry: Arc<KeyRegistry>,
    rotation: RotationPolicy,
    token_ttl: Duration,
    max_token_ttl: Duration,
    audience: String,
    issuer_prefix: String,
    metrics: AuthnMetrics,
}

impl TokenIssuer {
    /// Creates an issuer using the token settings of `config`.
    #[must_use]
    pub fn new(
        registry: Arc<KeyRegistry>,
        rotation: RotationPolicy,
        config: &AuthnConfig,
        metrics: AuthnMetrics,
    ) -> Self {
        Self {
            registry,
            rotation,
            token_ttl: config.token_ttl,
            max_token_ttl: config.max_token_ttl(),
            audience: config.audience.clone(),
            issuer_prefix: config.issuer_prefix.clone(),
            metrics,
        }
    }

    /// Issues a token for `tenant_id` carrying `claims`.
    ///
    /// Rotates first when the tenant has no active key or its newest key is
    /// past the rotation point. `exp`, `iat`, `aud` and `tenant_id` are always
    /// set here and replace caller values; a non-empty string `iss` from the
    /// caller is kept, otherwise it defaults to `<issuer_prefix><tenant_id>`.
    /// `ttl` defaults to the configured token ttl and may not exceed
    /// [`AuthnConfig::max_token_ttl`]. `exp` never lands past the signing
    /// key's own `expires_at`, which only matters for keys registered with a
    /// shorter ttl than the configured one.
    ///
    /// # Errors
    ///
    /// - [`AuthError::InvalidTokenTtl`] if `ttl` is zero or above the maximum
    /// - [`AuthError::KeyGeneration`] or [`AuthError::Registry`] if a needed rotation fails
    /// - [`AuthError::NoActiveKey`] if no key is active even after rotating
    /// - [`AuthError::NoPrivateKeyAvailable`] if the newest key has no private half
    /// - [`AuthError::Signing`] if encoding fails
    #[tracing::instrument(skip_all, fields(tenant_id = %tenant_id))]
    pub async fn issue(
        &self,
        tenant_id: TenantId,
        claims: Map<String, Value>,
        ttl: Option<Duration>,
    ) -> Result<String, AuthError> {
        let ttl = ttl.unwrap_or(self.token_ttl);
        if ttl.is_zero() || ttl > self.max_token_ttl {
            return Err(AuthError::invalid_token_ttl(ttl, self.max_token_ttl));
        }
        self.rotation.rotate_if_needed(tenant_id).await?;

        let key = self
            .registry
            .newest_active(tenant_id)
            .ok_or_else(|| AuthError::no_active_key(tenant_id))?;
        let Some(private) = key.private() else {
            error!(kid = %key.kid(), "newest active key has no private material");
            return Err(AuthError::no_private_key_available(key.kid()));
        };

        let now = self.registry.now();
        let exp = add_duration(now, ttl).min(key.metadata().expires_at);
        let iss = match claims.get("iss") {
            Some(Value::String(iss)) if !iss.is_empty() => iss.clone(),
            _ => format!("{}{tenant_id}", self.issuer_prefix),
        };
        let body = TokenClaims::new(
            iss,
            self.audience.clone(),
            now.timestamp(),
            exp.timestamp(),
            tenant_id,
            claims,
        );

        let token = jwt::sign(&body, key.kid(), private.pkcs1_der())?;
        self.metrics.record_issued();
        Ok(token)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use geotracker_common_storage::testutil::fixture_keypair;
    use serde_json::json;

    use super::*;
    use crate::{assert_auth_error, jwt::decode_token_header, testutil::TestEngine};

    fn body(token: &str) -> Value {
        use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
        let payload = token.split('.').nth(1).unwrap();
        serde_json::from_slice(&URL_SAFE_NO_PAD.decode(payload).unwrap()).unwrap()
    }

    fn claims(value: Value) -> Map<String, Value> {
        value.as_object().unwrap().clone()
    }

    #[tokio::test]
    async fn test_issue_rotates_for_new_tenant() {
        let engine = TestEngine::new();
        let tenant = TenantId::from(42);
        let token = engine.issuer.issue(tenant, claims(json!({"user": "a"})), None).await.unwrap();

        let kids = engine.registry.active_kids(tenant);
        assert_eq!(kids.len(), 1);
        let header = decode_token_header(&token).unwrap();
        assert_eq!(header.kid.as_deref(), Some(kids[0].as_str()));
        assert_eq!(header.alg, "RS256");
        assert_eq!(engine.metrics.snapshot().tokens_issued, 1);
    }

    #[tokio::test]
    async fn test_issue_sets_reserved_claims() {
        let engine = TestEngine::new();
        let caller = claims(json!({
            "user": "a", "exp": 1, "iat": 2, "aud": "evil", "tenant_id": 99
        }));
        let token = engine.issuer.issue(TenantId::from(42), caller, None).await.unwrap();

        let body = body(&token);
        let now = engine.clock_now();
        assert_eq!(body["iat"], json!(now));
        assert_eq!(body["exp"], json!(now + 300));
        assert_eq!(body["aud"], json!("geo-tracker"));
        assert_eq!(body["tenant_id"], json!(42));
        assert_eq!(body["iss"], json!("client-42"));
        assert_eq!(body["user"], json!("a"));
    }

    #[tokio::test]
    async fn test_issue_keeps_caller_issuer() {
        let engine = TestEngine::new();
        let tenant = TenantId::from(5);

        let token =
            engine.issuer.issue(tenant, claims(json!({"iss": "dashboard"})), None).await.unwrap();
        assert_eq!(body(&token)["iss"], json!("dashboard"));

        let token = engine.issuer.issue(tenant, claims(json!({"iss": ""})), None).await.unwrap();
        assert_eq!(body(&token)["iss"], json!("client-5"));

        let token = engine.issuer.issue(tenant, claims(json!({"iss": 7})), None).await.unwrap();
        assert_eq!(body(&token)["iss"], json!("client-5"));
    }

    #[tokio::test]
    async fn test_issue_custom_ttl() {
        let engine = TestEngine::new();
        let token = engine
            .issuer
            .issue(TenantId::from(1), Map::new(), Some(Duration::from_secs(30)))
            .await
            .unwrap();
        assert_eq!(body(&token)["exp"], json!(engine.clock_now() + 30));
    }

    #[tokio::test]
    async fn test_issue_accepts_ttl_up_to_key_window() {
        let engine = TestEngine::new();
        let max = engine.config.max_token_ttl();
        assert_eq!(max, Duration::from_secs(450));

        let token = engine.issuer.issue(TenantId::from(1), Map::new(), Some(max)).await.unwrap();
        assert_eq!(body(&token)["exp"], json!(engine.clock_now() + 450));
    }

    #[tokio::test]
    async fn test_issue_rejects_ttl_outliving_key() {
        let engine = TestEngine::new();
        let tenant = TenantId::from(1);
        for ttl in [Duration::from_secs(451), Duration::from_secs(3600), Duration::ZERO] {
            let result = engine.issuer.issue(tenant, Map::new(), Some(ttl)).await;
            assert_auth_error!(result, InvalidTokenTtl { .. });
        }
        assert!(engine.registry.active_kids(tenant).is_empty(), "rejected before rotating");
        assert_eq!(engine.metrics.snapshot().tokens_issued, 0);
    }

    #[tokio::test]
    async fn test_issue_caps_exp_at_short_lived_key() {
        let engine = TestEngine::new();
        let tenant = TenantId::from(3);
        let pair = fixture_keypair();
        engine
            .registry
            .register(
                tenant,
                &pair.public_pem,
                Some(pair.private_pem.as_str()),
                Some(Duration::from_secs(120)),
            )
            .unwrap();

        let token = engine.issuer.issue(tenant, Map::new(), None).await.unwrap();
        assert_eq!(body(&token)["exp"], json!(engine.clock_now() + 120));
    }

    #[tokio::test]
    async fn test_issue_reuses_fresh_key() {
        let engine = TestEngine::new();
        let tenant = TenantId::from(1);
        let a = engine.issuer.issue(tenant, Map::new(), None).await.unwrap();
        let b = engine.issuer.issue(tenant, Map::new(), None).await.unwrap();
        assert_eq!(decode_token_header(&a).unwrap().kid, decode_token_header(&b).unwrap().kid);
        assert_eq!(engine.metrics.snapshot().rotations, 1);
    }

    #[tokio::test]
    async fn test_issue_rotates_past_rotation_point() {
        let engine = TestEngine::new();
        let tenant = TenantId::from(1);
        let a = engine.issuer.issue(tenant, Map::new(), None).await.unwrap();
        engine.clock.advance(Duration::from_secs(451));
        let b = engine.issuer.issue(tenant, Map::new(), None).await.unwrap();

        assert_ne!(decode_token_header(&a).unwrap().kid, decode_token_header(&b).unwrap().kid);
        assert_eq!(engine.registry.active_kids(tenant).len(), 2);
    }

    #[tokio::test]
    async fn test_issue_without_private_key_fails() {
        let engine = TestEngine::new();
        let tenant = TenantId::from(9);
        let kid = engine
            .registry
            .register(tenant, &fixture_keypair().public_pem, None, None)
            .unwrap();

        let result = engine.issuer.issue(tenant, Map::new(), None).await;
        assert!(result.as_ref().is_err_and(|e| e.to_string().contains(&kid)));
        assert_auth_error!(result, NoPrivateKeyAvailable { .. });
        assert_eq!(engine.metrics.snapshot().tokens_issued, 0);
    }
}
