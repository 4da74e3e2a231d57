//! Token verification.
//!
//! Checks run in a fixed order and stop at the first failure:
//!
//! 1. header decodes, carries a `kid`, and names RS256
//! 2. the `kid` is well formed, belongs to the claimed tenant, and is in the tenant's current
//!    discovery document
//! 3. the signature verifies against that key
//! 4. `tenant_id` matches the claimed tenant
//! 5. the token is not expired and not issued in the future, within the skew tolerance
//! 6. `iss` is non-empty and `aud` is the configured audience
//!
//! Every failure becomes the same [`VerificationFailed`]. The reason is only
//! logged at debug level and counted in [`AuthnMetrics`].

use std::{sync::Arc, time::Duration};

use geotracker_common_storage::{TenantId, auth::KeyRegistry};
use tracing::debug;

use crate::{
    config::AuthnConfig,
    discovery::DiscoveryPublisher,
    error::{RejectReason, VerificationFailed},
    jwt::{self, TokenClaims},
    metrics::AuthnMetrics,
    validation::{validate_algorithm, validate_kid},
};

/// Validates tokens against a tenant's discovery document.
#[derive(Debug, Clone)]
pub struct TokenVerifier {
    registry: Arc<KeyRegistry>,
    publisher: DiscoveryPublisher,
    skew: Duration,
    audience: String,
    metrics: AuthnMetrics,
}

impl TokenVerifier {
    /// Creates a verifier using the skew and audience of `config`.
    #[must_use]
    pub fn new(
        registry: Arc<KeyRegistry>,
        publisher: DiscoveryPublisher,
        config: &AuthnConfig,
        metrics: AuthnMetrics,
    ) -> Self {
        Self {
            registry,
            publisher,
            skew: config.clock_skew,
            audience: config.audience.clone(),
            metrics,
        }
    }

    /// Verifies `token` for `tenant_id` and returns its claims.
    ///
    /// Expired keys of the tenant are cleaned up as a side effect. Never
    /// rotates.
    ///
    /// # Errors
    ///
    /// Returns [`VerificationFailed`] for every rejected token.
    #[tracing::instrument(skip_all, fields(tenant_id = %tenant_id))]
    pub fn verify(
        &self,
        token: &str,
        tenant_id: TenantId,
    ) -> Result<TokenClaims, VerificationFailed> {
        match self.check(token, tenant_id) {
            Ok(claims) => {
                self.metrics.record_accepted();
                Ok(claims)
            },
            Err(reason) => {
                debug!(reason = %reason, "token rejected");
                self.metrics.record_rejected(reason);
                Err(VerificationFailed)
            },
        }
    }

    fn check(&self, token: &str, tenant_id: TenantId) -> Result<TokenClaims, RejectReason> {
        let header = jwt::decode_token_header(token).ok_or(RejectReason::MalformedToken)?;
        let kid = header.kid.filter(|kid| !kid.is_empty()).ok_or(RejectReason::MissingKid)?;
        validate_algorithm(&header.alg)?;
        validate_kid(&kid, tenant_id)?;

        let document = self.publisher.document(tenant_id);
        let jwk = document.find(&kid).ok_or(RejectReason::UnknownKid)?;
        let key = jwt::decoding_key(&jwk.n, &jwk.e)?;
        let claims = jwt::verify_signature(token, &key)?;

        jwt::validate_claims(&claims, tenant_id, self.registry.now(), self.skew, &self.audience)?;
        Ok(claims)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use geotracker_common_storage::testutil::{fixture_keypair, other_fixture_keypair};
    use rstest::rstest;
    use serde_json::{Map, json};

    use super::*;
    use crate::testutil::{TestEngine, craft_raw_jwt, sign_with_fixture};

    async fn issued(engine: &TestEngine, tenant: i64) -> String {
        let claims = json!({"user": "a"}).as_object().unwrap().clone();
        engine.issuer.issue(TenantId::from(tenant), claims, None).await.unwrap()
    }

    fn rejected(engine: &TestEngine, reason: &str) -> u64 {
        engine.metrics.snapshot().rejections_by_reason.get(reason).copied().unwrap_or(0)
    }

    #[tokio::test]
    async fn test_verify_issued_token() {
        let engine = TestEngine::new();
        let token = issued(&engine, 42).await;

        let claims = engine.verifier.verify(&token, TenantId::from(42)).unwrap();
        assert_eq!(claims.get_str("user"), Some("a"));
        assert_eq!(claims.tenant_id, TenantId::from(42));
        assert_eq!(claims.iss, "client-42");
        assert_eq!(engine.metrics.snapshot().verifications_accepted, 1);
    }

    #[tokio::test]
    async fn test_other_tenant_rejected_as_unknown_kid() {
        let engine = TestEngine::new();
        let token = issued(&engine, 42).await;
        assert_eq!(engine.verifier.verify(&token, TenantId::from(99)), Err(VerificationFailed));
        assert_eq!(rejected(&engine, "unknown_kid"), 1);
    }

    #[tokio::test]
    async fn test_expiry_boundary() {
        let engine = TestEngine::new();
        let token = issued(&engine, 1).await;
        let claims = engine.verifier.verify(&token, TenantId::from(1)).unwrap();

        // Advance to exactly `exp + skew - 1` in whole seconds.
        let target = claims.exp + 60 - 1;
        engine.clock.advance(Duration::from_secs((target - engine.clock_now()) as u64));
        assert!(engine.verifier.verify(&token, TenantId::from(1)).is_ok());

        engine.clock.advance(Duration::from_secs(2));
        assert!(engine.verifier.verify(&token, TenantId::from(1)).is_err());
        assert_eq!(rejected(&engine, "expired"), 1);
    }

    #[tokio::test]
    async fn test_signature_checked_before_tenant() {
        let engine = TestEngine::new();
        let tenant = TenantId::from(3);
        let kid = engine
            .registry
            .register(tenant, &fixture_keypair().public_pem, None, None)
            .unwrap();

        // Claims name tenant 4 and the signing key is not the registered one.
        let payload = json!({
            "iss": "client-4", "aud": "geo-tracker", "tenant_id": 4,
            "exp": engine.clock_now() + 60, "iat": engine.clock_now()
        });
        let token = sign_with_fixture(other_fixture_keypair(), &kid, &payload);
        assert!(engine.verifier.verify(&token, tenant).is_err());
        assert_eq!(rejected(&engine, "bad_signature"), 1);
        assert_eq!(rejected(&engine, "tenant_mismatch"), 0);
    }

    #[tokio::test]
    async fn test_tenant_mismatch_with_valid_signature() {
        let engine = TestEngine::new();
        let tenant = TenantId::from(3);
        let kid = engine
            .registry
            .register(tenant, &fixture_keypair().public_pem, None, None)
            .unwrap();

        // Expired as well: the tenant check must win.
        let payload = json!({
            "iss": "client-4", "aud": "geo-tracker", "tenant_id": 4,
            "exp": engine.clock_now() - 3600, "iat": engine.clock_now() - 7200
        });
        let token = sign_with_fixture(fixture_keypair(), &kid, &payload);
        assert!(engine.verifier.verify(&token, tenant).is_err());
        assert_eq!(rejected(&engine, "tenant_mismatch"), 1);
    }

    #[tokio::test]
    async fn test_foreign_signed_claims_rejected() {
        let engine = TestEngine::new();
        let tenant = TenantId::from(5);
        let kid = engine
            .registry
            .register(tenant, &fixture_keypair().public_pem, None, None)
            .unwrap();
        let now = engine.clock_now();

        let cases = [
            (
                json!({"aud": "geo-tracker", "tenant_id": 5, "exp": now + 60, "iat": now}),
                "invalid_issuer",
            ),
            (
                json!({"iss": "x", "aud": "other", "tenant_id": 5, "exp": now + 60, "iat": now}),
                "invalid_audience",
            ),
            (
                json!({
                    "iss": "x", "aud": "geo-tracker", "tenant_id": 5,
                    "exp": now + 600, "iat": now + 120
                }),
                "issued_in_future",
            ),
        ];
        for (payload, reason) in cases {
            let token = sign_with_fixture(fixture_keypair(), &kid, &payload);
            assert!(engine.verifier.verify(&token, tenant).is_err(), "{reason}");
            assert_eq!(rejected(&engine, reason), 1, "{reason}");
        }
    }

    #[rstest]
    #[case::alg_none(json!({"alg": "none", "kid": "key_1_1"}), "unsupported_algorithm")]
    #[case::alg_hs256(json!({"alg": "HS256", "kid": "key_1_1"}), "unsupported_algorithm")]
    #[case::no_kid(json!({"alg": "RS256"}), "missing_kid")]
    #[case::empty_kid(json!({"alg": "RS256", "kid": ""}), "missing_kid")]
    #[case::traversal_kid(json!({"alg": "RS256", "kid": "../../etc/passwd"}), "invalid_kid")]
    #[case::unregistered_kid(json!({"alg": "RS256", "kid": "key_1_1"}), "unknown_kid")]
    #[tokio::test]
    async fn test_header_rejections(#[case] header: serde_json::Value, #[case] reason: &str) {
        let engine = TestEngine::new();
        let payload =
            json!({"iss": "x", "aud": "geo-tracker", "tenant_id": 1, "exp": i64::MAX, "iat": 0});
        let token = craft_raw_jwt(&header, &payload);
        assert!(engine.verifier.verify(&token, TenantId::from(1)).is_err());
        assert_eq!(rejected(&engine, reason), 1);
    }

    #[tokio::test]
    async fn test_garbage_rejected_as_malformed() {
        let engine = TestEngine::new();
        for token in ["", "a.b", "a.b.c.d", "not a token"] {
            assert!(engine.verifier.verify(token, TenantId::from(1)).is_err());
        }
        assert_eq!(rejected(&engine, "malformed_token"), 4);
    }

    #[tokio::test]
    async fn test_verify_never_rotates() {
        let engine = TestEngine::new();
        let token = craft_raw_jwt(&json!({"alg": "RS256", "kid": "key_1_1"}), &json!({}));
        assert!(engine.verifier.verify(&token, TenantId::from(1)).is_err());
        assert_eq!(engine.registry.key_count(TenantId::from(1)), 0);
        assert_eq!(engine.metrics.snapshot().rotations, 0);
    }

    #[tokio::test]
    async fn test_empty_caller_claims() {
        let engine = TestEngine::new();
        let token = engine.issuer.issue(TenantId::from(2), Map::new(), None).await.unwrap();
        let claims = engine.verifier.verify(&token, TenantId::from(2)).unwrap();
        assert!(claims.extra.is_empty());
    }
}
