//! JWT header validation.
//!
//! This module provides the checks that run on the untrusted token header
//! before any key lookup: the algorithm must be the one the engine signs
//! with, and the `kid` must be a well-formed identifier owned by the tenant
//! the caller claims.
//!
//! # Security
//!
//! - Strict algorithm checks to prevent algorithm substitution attacks
//! - Only RS256 is accepted; symmetric algorithms and "none" are always rejected
//! - A kid naming another tenant is rejected before the registry is consulted

use geotracker_common_storage::{TenantId, auth::parse_kid_tenant};

use crate::error::RejectReason;

/// Forbidden JWT algorithms that are never accepted for security reasons.
///
/// These algorithms are blocked because:
/// - `none`: No signature verification (trivially bypassable)
/// - `HS256`, `HS384`, `HS512`: Symmetric algorithms (shared secret vulnerability)
pub const FORBIDDEN_ALGORITHMS: &[&str] = &["none", "HS256", "HS384", "HS512"];

/// Accepted JWT algorithms.
///
/// Every key the engine generates or registers is RSA, and tokens are signed
/// with RS256 only. Per RFC 8725 Section 3.1, validators must reject
/// algorithms they do not use.
pub const ACCEPTED_ALGORITHMS: &[&str] = &["RS256"];

/// Upper bound on accepted kid length.
pub const MAX_KID_LENGTH: usize = 64;

/// Validate a JWT header algorithm against security policies.
///
/// # Examples
///
/// ```
/// use geotracker_common_authn::validation::is_algorithm_accepted;
///
/// assert!(is_algorithm_accepted("RS256"));
/// assert!(!is_algorithm_accepted("HS256"));
/// assert!(!is_algorithm_accepted("none"));
/// assert!(!is_algorithm_accepted("ES256"));
/// ```
#[must_use]
pub fn is_algorithm_accepted(alg: &str) -> bool {
    !FORBIDDEN_ALGORITHMS.contains(&alg) && ACCEPTED_ALGORITHMS.contains(&alg)
}

pub(crate) fn validate_algorithm(alg: &str) -> Result<(), RejectReason> {
    if is_algorithm_accepted(alg) { Ok(()) } else { Err(RejectReason::UnsupportedAlgorithm) }
}

/// Validate a header `kid` for the tenant the caller claims.
///
/// The kid must be at most [`MAX_KID_LENGTH`] bytes of `[A-Za-z0-9_-]`,
/// follow the `key_<tenant>_<micros>` format, and name `tenant_id`. A kid
/// owned by another tenant can never be in this tenant's document, so it is
/// rejected as unknown without a lookup.
pub(crate) fn validate_kid(kid: &str, tenant_id: TenantId) -> Result<(), RejectReason> {
    if kid.is_empty() {
        return Err(RejectReason::MissingKid);
    }
    if kid.len() > MAX_KID_LENGTH
        || !kid.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
    {
        return Err(RejectReason::InvalidKid);
    }
    match parse_kid_tenant(kid) {
        Some(owner) if owner == tenant_id => Ok(()),
        Some(_) => Err(RejectReason::UnknownKid),
        None => Err(RejectReason::InvalidKid),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[test]
    fn test_rs256_accepted() {
        assert!(validate_algorithm("RS256").is_ok());
    }

    #[test]
    fn test_forbidden_algorithms_each_rejected() {
        for alg in FORBIDDEN_ALGORITHMS {
            assert_eq!(
                validate_algorithm(alg),
                Err(RejectReason::UnsupportedAlgorithm),
                "Expected rejection for forbidden algorithm '{alg}'"
            );
        }
    }

    #[rstest]
    #[case("RS384")]
    #[case("RS512")]
    #[case("PS256")]
    #[case("ES256")]
    #[case("EdDSA")]
    #[case("rs256")]
    #[case("")]
    fn test_other_algorithms_rejected(#[case] alg: &str) {
        assert!(!is_algorithm_accepted(alg));
    }

    #[test]
    fn test_forbidden_algorithms_constant() {
        assert_eq!(FORBIDDEN_ALGORITHMS.len(), 4);
        assert!(FORBIDDEN_ALGORITHMS.contains(&"none"));
        assert!(FORBIDDEN_ALGORITHMS.contains(&"HS256"));
        assert!(FORBIDDEN_ALGORITHMS.contains(&"HS384"));
        assert!(FORBIDDEN_ALGORITHMS.contains(&"HS512"));
        assert_eq!(ACCEPTED_ALGORITHMS, &["RS256"]);
    }

    #[rstest]
    #[case::valid("key_42_1700000000000000", Ok(()))]
    #[case::empty("", Err(RejectReason::MissingKid))]
    #[case::other_tenant("key_43_1700000000000000", Err(RejectReason::UnknownKid))]
    #[case::path_traversal("../../etc/passwd", Err(RejectReason::InvalidKid))]
    #[case::spaces("key_42_1 OR 1=1", Err(RejectReason::InvalidKid))]
    #[case::wrong_prefix("kid_42_1", Err(RejectReason::InvalidKid))]
    #[case::no_micros("key_42_", Err(RejectReason::InvalidKid))]
    #[case::too_long(&"key_42_1".repeat(10), Err(RejectReason::InvalidKid))]
    fn test_validate_kid(#[case] kid: &str, #[case] expected: Result<(), RejectReason>) {
        assert_eq!(validate_kid(kid, TenantId::from(42)), expected);
    }
}
