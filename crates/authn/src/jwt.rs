//! JWT claims, encoding and untrusted parsing.
//!
//! Header parsing here runs before any key is known, so it only decodes and
//! never trusts. Signature verification goes through `jsonwebtoken` with its
//! own time and audience checks disabled: those are applied afterwards by
//! [`validate_claims`] against the injected clock so that the tenant check
//! always runs before the time checks.
//!
//! # Example
//!
//! ```
//! use geotracker_common_authn::jwt::decode_token_header;
//!
//! // Headers are decoded without trusting them.
//! assert!(decode_token_header("not-a-jwt").is_none());
//! ```

use std::time::Duration;

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{DateTime, Utc};
use geotracker_common_storage::TenantId;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{AuthError, RejectReason};

/// `typ` header value of issued tokens.
pub const TOKEN_TYPE: &str = "JWT";

/// Claim names the issuer always sets itself.
pub const RESERVED_CLAIMS: &[&str] = &["exp", "iat", "aud", "iss", "tenant_id"];

/// Token body.
///
/// ```json
/// {
///   "iss": "client-42",
///   "aud": "geo-tracker",
///   "exp": 1700000300,
///   "iat": 1700000000,
///   "tenant_id": 42,
///   "user": "a"
/// }
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Issuer.
    #[serde(default)]
    pub iss: String,
    /// Audience.
    #[serde(default)]
    pub aud: String,
    /// Expiration time (seconds since epoch).
    pub exp: i64,
    /// Issued at (seconds since epoch).
    pub iat: i64,
    /// Tenant the token was issued for.
    pub tenant_id: TenantId,
    /// Caller-supplied claims.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl TokenClaims {
    /// Assembles a claim set, dropping reserved names from `extra` so the
    /// issuer's values cannot be shadowed.
    #[must_use]
    pub fn new(
        iss: String,
        aud: String,
        iat: i64,
        exp: i64,
        tenant_id: TenantId,
        mut extra: Map<String, Value>,
    ) -> Self {
        extra.retain(|name, _| !RESERVED_CLAIMS.contains(&name.as_str()));
        Self { iss, aud, exp, iat, tenant_id, extra }
    }

    /// Looks up a claim by name, reserved claims included.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Value> {
        match name {
            "iss" => Some(Value::from(self.iss.as_str())),
            "aud" => Some(Value::from(self.aud.as_str())),
            "exp" => Some(Value::from(self.exp)),
            "iat" => Some(Value::from(self.iat)),
            "tenant_id" => Some(Value::from(self.tenant_id.0)),
            other => self.extra.get(other).cloned(),
        }
    }

    /// Caller claim `name` as a string, if it is one.
    #[must_use]
    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.extra.get(name).and_then(Value::as_str)
    }
}

/// Token header fields read before verification.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct UntrustedHeader {
    /// Algorithm named by the token. Unconstrained until checked.
    pub alg: String,
    /// Key ID, if present.
    #[serde(default)]
    pub kid: Option<String>,
    /// Token type, if present.
    #[serde(default)]
    pub typ: Option<String>,
}

/// Decodes a token header without verifying anything.
///
/// Unlike `jsonwebtoken::decode_header`, any `alg` string is accepted here,
/// including `none`, so algorithm policy can reject it explicitly.
/// Returns `None` for anything that is not three dot-separated segments with
/// a base64url JSON header.
#[must_use]
pub fn decode_token_header(token: &str) -> Option<UntrustedHeader> {
    let mut parts = token.split('.');
    let (Some(header), Some(_), Some(_), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return None;
    };
    let bytes = URL_SAFE_NO_PAD.decode(header).ok()?;
    serde_json::from_slice(&bytes).ok()
}

/// Signs `claims` with RS256 under `kid`.
///
/// `pkcs1_der` is the PKCS#1 DER encoding of the RSA private key.
///
/// # Errors
///
/// Returns [`AuthError::KeyMaterialInvalid`] if the encoder rejects the key
/// and [`AuthError::Signing`] for any other encoding failure.
pub fn sign(claims: &TokenClaims, kid: &str, pkcs1_der: &[u8]) -> Result<String, AuthError> {
    let mut header = Header::new(Algorithm::RS256);
    header.typ = Some(TOKEN_TYPE.to_owned());
    header.kid = Some(kid.to_owned());
    let key = EncodingKey::from_rsa_der(pkcs1_der);
    Ok(encode(&header, claims, &key)?)
}

/// Builds a decoding key from base64url modulus and exponent.
pub(crate) fn decoding_key(n: &str, e: &str) -> Result<DecodingKey, RejectReason> {
    DecodingKey::from_rsa_components(n, e).map_err(|_| RejectReason::BadSignature)
}

/// Verifies the RS256 signature and decodes the body. No claim is checked.
pub(crate) fn verify_signature(
    token: &str,
    key: &DecodingKey,
) -> Result<TokenClaims, RejectReason> {
    use jsonwebtoken::errors::ErrorKind;

    let mut validation = Validation::new(Algorithm::RS256);
    validation.validate_exp = false;
    validation.validate_nbf = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();

    decode::<TokenClaims>(token, key, &validation).map(|data| data.claims).map_err(|e| {
        match e.kind() {
            ErrorKind::InvalidToken
            | ErrorKind::Base64(_)
            | ErrorKind::Json(_)
            | ErrorKind::Utf8(_) => RejectReason::MalformedToken,
            ErrorKind::InvalidAlgorithm => RejectReason::UnsupportedAlgorithm,
            _ => RejectReason::BadSignature,
        }
    })
}

/// Checks verified claims against the caller's tenant and the clock.
///
/// Order: tenant, expiry, issue time, issuer, audience. `skew` widens both
/// time checks.
pub(crate) fn validate_claims(
    claims: &TokenClaims,
    tenant_id: TenantId,
    now: DateTime<Utc>,
    skew: Duration,
    audience: &str,
) -> Result<(), RejectReason> {
    if claims.tenant_id != tenant_id {
        return Err(RejectReason::TenantMismatch);
    }

    let now = now.timestamp();
    let skew = i64::try_from(skew.as_secs()).unwrap_or(i64::MAX);
    if now > claims.exp.saturating_add(skew) {
        return Err(RejectReason::Expired);
    }
    if claims.iat > now.saturating_add(skew) {
        return Err(RejectReason::IssuedInFuture);
    }

    if claims.iss.is_empty() {
        return Err(RejectReason::InvalidIssuer);
    }
    if claims.aud != audience {
        return Err(RejectReason::InvalidAudience);
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use chrono::TimeZone;
    use geotracker_common_storage::auth::{PrivateKeyMaterial, PublicKeyMaterial};
    use geotracker_common_storage::testutil::{fixture_keypair, other_fixture_keypair};
    use rstest::rstest;
    use serde_json::json;

    use super::*;
    use crate::testutil::craft_raw_jwt;

    const SKEW: Duration = Duration::from_secs(60);

    fn base_time() -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000, 0).unwrap()
    }

    fn claims(tenant: i64, iat: i64, exp: i64) -> TokenClaims {
        TokenClaims::new(
            "client-42".into(),
            "geo-tracker".into(),
            iat,
            exp,
            TenantId::from(tenant),
            Map::new(),
        )
    }

    fn signing_der() -> Vec<u8> {
        let pair = fixture_keypair();
        let public = PublicKeyMaterial::from_pem(&pair.public_pem).unwrap();
        PrivateKeyMaterial::from_pem(&pair.private_pem, &public).unwrap().pkcs1_der().to_vec()
    }

    fn decoding_key_of(pem: &str) -> DecodingKey {
        let public = PublicKeyMaterial::from_pem(pem).unwrap();
        decoding_key(public.modulus(), public.exponent()).unwrap()
    }

    #[test]
    fn test_new_drops_reserved_caller_claims() {
        let extra = json!({"exp": 1, "tenant_id": 99, "aud": "x", "iss": "y", "user": "a"});
        let claims = TokenClaims::new(
            "client-42".into(),
            "geo-tracker".into(),
            10,
            20,
            TenantId::from(42),
            extra.as_object().unwrap().clone(),
        );
        assert_eq!(claims.extra.len(), 1);
        assert_eq!(claims.get_str("user"), Some("a"));
        assert_eq!(claims.get("exp"), Some(json!(20)));
        assert_eq!(claims.get("tenant_id"), Some(json!(42)));
        assert_eq!(claims.get("missing"), None);
    }

    #[test]
    fn test_claims_serialize_flat() {
        let mut extra = Map::new();
        extra.insert("user".into(), json!("a"));
        let claims = TokenClaims::new(
            "client-42".into(),
            "geo-tracker".into(),
            10,
            20,
            TenantId::from(42),
            extra,
        );
        let value = serde_json::to_value(&claims).unwrap();
        assert_eq!(
            value,
            json!({
                "iss": "client-42", "aud": "geo-tracker", "exp": 20, "iat": 10,
                "tenant_id": 42, "user": "a"
            })
        );
    }

    #[test]
    fn test_decode_header_accepts_any_alg() {
        let token = craft_raw_jwt(&json!({"alg": "none", "kid": "key_1_1"}), &json!({}));
        let header = decode_token_header(&token).unwrap();
        assert_eq!(header.alg, "none");
        assert_eq!(header.kid.as_deref(), Some("key_1_1"));
        assert_eq!(header.typ, None);
    }

    #[test]
    fn test_sign_then_verify_signature() {
        let token = sign(&claims(42, 10, 20), "key_42_1", &signing_der()).unwrap();

        let header = decode_token_header(&token).unwrap();
        assert_eq!(header.alg, "RS256");
        assert_eq!(header.typ.as_deref(), Some(TOKEN_TYPE));
        assert_eq!(header.kid.as_deref(), Some("key_42_1"));

        let decoded = verify_signature(&token, &decoding_key_of(&fixture_keypair().public_pem));
        assert_eq!(decoded.unwrap(), claims(42, 10, 20));
    }

    #[test]
    fn test_wrong_key_is_bad_signature() {
        let token = sign(&claims(42, 10, 20), "key_42_1", &signing_der()).unwrap();
        let other = decoding_key_of(&other_fixture_keypair().public_pem);
        assert_eq!(verify_signature(&token, &other), Err(RejectReason::BadSignature));
    }

    #[test]
    fn test_tampered_body_is_bad_signature() {
        let token = sign(&claims(42, 10, 20), "key_42_1", &signing_der()).unwrap();
        let mut parts: Vec<&str> = token.split('.').collect();
        let forged = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&claims(99, 10, 20)).unwrap());
        parts[1] = &forged;
        let tampered = parts.join(".");

        let key = decoding_key_of(&fixture_keypair().public_pem);
        assert_eq!(verify_signature(&tampered, &key), Err(RejectReason::BadSignature));
    }

    #[rstest]
    #[case::fresh(42, 0, 300, 0, Ok(()))]
    #[case::other_tenant(99, 0, 300, 0, Err(RejectReason::TenantMismatch))]
    #[case::expired_tenant_first(99, 0, 300, 10_000, Err(RejectReason::TenantMismatch))]
    #[case::within_skew_after_exp(42, 0, 300, 359, Ok(()))]
    #[case::at_exp_plus_skew(42, 0, 300, 360, Ok(()))]
    #[case::past_skew(42, 0, 300, 361, Err(RejectReason::Expired))]
    #[case::iat_within_skew(42, 60, 300, 0, Ok(()))]
    #[case::iat_in_future(42, 61, 300, 0, Err(RejectReason::IssuedInFuture))]
    fn test_validate_claims_timing(
        #[case] token_tenant: i64,
        #[case] iat_offset: i64,
        #[case] exp_offset: i64,
        #[case] now_offset: i64,
        #[case] expected: Result<(), RejectReason>,
    ) {
        let start = base_time().timestamp();
        let claims = claims(token_tenant, start + iat_offset, start + exp_offset);
        let now = base_time() + chrono::Duration::seconds(now_offset);
        assert_eq!(
            validate_claims(&claims, TenantId::from(42), now, SKEW, "geo-tracker"),
            expected
        );
    }

    #[test]
    fn test_validate_claims_issuer_and_audience() {
        let now = base_time();
        let start = now.timestamp();

        let mut no_issuer = claims(42, start, start + 300);
        no_issuer.iss.clear();
        assert_eq!(
            validate_claims(&no_issuer, TenantId::from(42), now, SKEW, "geo-tracker"),
            Err(RejectReason::InvalidIssuer)
        );

        let wrong_audience = claims(42, start, start + 300);
        assert_eq!(
            validate_claims(&wrong_audience, TenantId::from(42), now, SKEW, "other"),
            Err(RejectReason::InvalidAudience)
        );
    }

    #[test]
    fn test_extreme_timestamps_do_not_overflow() {
        let claims = claims(42, i64::MIN, i64::MAX);
        let result =
            validate_claims(&claims, TenantId::from(42), base_time(), Duration::MAX, "geo-tracker");
        assert!(result.is_ok());
    }

    /// Known-bad inputs must never panic.
    mod malformed_inputs {
        use super::*;

        fn exercise(token: &str) -> bool {
            let key = decoding_key_of(&fixture_keypair().public_pem);
            let _ = verify_signature(token, &key);
            decode_token_header(token).is_some()
        }

        #[rstest]
        #[case::empty("")]
        #[case::single_dot(".")]
        #[case::two_dots("..")]
        #[case::three_dots("...")]
        #[case::plain("not-a-jwt")]
        #[case::bad_base64("!!!.@@@.###")]
        #[case::newlines("eyJ\n.eyJ\n.sig\n")]
        #[case::brackets("[].{}.()")]
        fn test_malformed_header_rejected(#[case] token: &str) {
            assert!(!exercise(token));
        }

        #[test]
        fn test_header_json_not_object() {
            let header = URL_SAFE_NO_PAD.encode(b"[1,2,3]");
            assert!(!exercise(&format!("{header}.e30.sig")));
        }

        #[test]
        fn test_null_byte_kid() {
            let token = craft_raw_jwt(&json!({"alg": "RS256", "kid": "key\u{0}_1_1"}), &json!({}));
            assert!(exercise(&token));
        }

        #[test]
        fn test_oversized_payload() {
            let big = "x".repeat(64 * 1024);
            let token = craft_raw_jwt(&json!({"alg": "RS256", "kid": "key_1_1"}), &json!({
                "data": big
            }));
            assert!(exercise(&token));
        }

        #[test]
        fn test_unicode_claims() {
            let token = craft_raw_jwt(
                &json!({"alg": "RS256", "kid": "key_1_1"}),
                &json!({"iss": "\u{1F600}", "tenant_id": 1, "exp": 0, "iat": 0}),
            );
            assert!(exercise(&token));
        }
    }
}
