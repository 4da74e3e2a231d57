//! Counters for key lifecycle and token operations.
//!
//! # Examples
//!
//! ```
//! use geotracker_common_authn::AuthnMetrics;
//!
//! let metrics = AuthnMetrics::new();
//! metrics.record_issued();
//! metrics.record_rotation();
//!
//! let snapshot = metrics.snapshot();
//! assert_eq!(snapshot.tokens_issued, 1);
//! assert_eq!(snapshot.rotations, 1);
//! assert_eq!(snapshot.rejection_rate(), 0.0);
//! ```

use std::{
    collections::BTreeMap,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

use crate::error::RejectReason;

const REASONS: [RejectReason; 11] = [
    RejectReason::MissingKid,
    RejectReason::UnsupportedAlgorithm,
    RejectReason::MalformedToken,
    RejectReason::InvalidKid,
    RejectReason::UnknownKid,
    RejectReason::BadSignature,
    RejectReason::TenantMismatch,
    RejectReason::Expired,
    RejectReason::IssuedInFuture,
    RejectReason::InvalidIssuer,
    RejectReason::InvalidAudience,
];

/// Snapshot of engine metrics at a point in time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthnMetricsSnapshot {
    /// Tokens successfully signed.
    pub tokens_issued: u64,
    /// Tokens that passed verification.
    pub verifications_accepted: u64,
    /// Tokens that failed verification.
    pub verifications_rejected: u64,
    /// Successful rotations.
    pub rotations: u64,
    /// Rotations that failed in generation or registration.
    pub rotation_failures: u64,
    /// Expired keys removed by cleanup.
    pub keys_cleaned_up: u64,
    /// Rejections keyed by internal reason label (e.g. `"expired"`).
    pub rejections_by_reason: BTreeMap<&'static str, u64>,
}

impl AuthnMetricsSnapshot {
    /// Returns the share of verifications that were rejected (0.0 to 1.0).
    #[must_use]
    pub fn rejection_rate(&self) -> f64 {
        let total = self.verifications_accepted + self.verifications_rejected;
        if total == 0 { 0.0 } else { self.verifications_rejected as f64 / total as f64 }
    }
}

#[derive(Default)]
struct AuthnMetricsInner {
    tokens_issued: AtomicU64,
    verifications_accepted: AtomicU64,
    verifications_rejected: AtomicU64,
    rotations: AtomicU64,
    rotation_failures: AtomicU64,
    keys_cleaned_up: AtomicU64,
    rejections: [AtomicU64; REASONS.len()],
}

/// Thread-safe metrics collector.
///
/// Cloning is cheap and clones share the same counters.
#[derive(Clone, Default)]
pub struct AuthnMetrics {
    inner: Arc<AuthnMetricsInner>,
}

impl AuthnMetrics {
    /// Creates a collector with every counter at zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a signed token.
    pub fn record_issued(&self) {
        self.inner.tokens_issued.fetch_add(1, Ordering::Relaxed);
    }

    /// Records an accepted token.
    pub fn record_accepted(&self) {
        self.inner.verifications_accepted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_rejected(&self, reason: RejectReason) {
        self.inner.verifications_rejected.fetch_add(1, Ordering::Relaxed);
        if let Some(i) = REASONS.iter().position(|r| *r == reason) {
            self.inner.rejections[i].fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Records a successful rotation.
    pub fn record_rotation(&self) {
        self.inner.rotations.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a failed rotation.
    pub fn record_rotation_failure(&self) {
        self.inner.rotation_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Records `count` keys removed by cleanup.
    pub fn record_cleaned_up(&self, count: usize) {
        self.inner.keys_cleaned_up.fetch_add(count as u64, Ordering::Relaxed);
    }

    /// Takes a snapshot of all counters.
    #[must_use]
    pub fn snapshot(&self) -> AuthnMetricsSnapshot {
        let inner = &self.inner;
        let rejections_by_reason = REASONS
            .iter()
            .zip(inner.rejections.iter())
            .map(|(reason, count)| (reason.as_str(), count.load(Ordering::Relaxed)))
            .filter(|(_, count)| *count > 0)
            .collect();
        AuthnMetricsSnapshot {
            tokens_issued: inner.tokens_issued.load(Ordering::Relaxed),
            verifications_accepted: inner.verifications_accepted.load(Ordering::Relaxed),
            verifications_rejected: inner.verifications_rejected.load(Ordering::Relaxed),
            rotations: inner.rotations.load(Ordering::Relaxed),
            rotation_failures: inner.rotation_failures.load(Ordering::Relaxed),
            keys_cleaned_up: inner.keys_cleaned_up.load(Ordering::Relaxed),
            rejections_by_reason,
        }
    }
}

impl std::fmt::Debug for AuthnMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthnMetrics").field("snapshot", &self.snapshot()).finish()
    }
}
