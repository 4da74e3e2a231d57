//! Audit trail for signing key lifecycle operations.
//!
//! Every registration, rotation and cleanup emits one structured `tracing`
//! event at INFO with the message `audit_event`, suitable for forwarding to a
//! log aggregator through `tracing-subscriber` layers.
//!
//! Field mapping:
//! - `audit.action`: the operation (e.g. "register_key")
//! - `audit.resource`: what was affected (`tenant:<id>` or `tenant:<id>/kid:<kid>`)
//! - `audit.result`: "success" or "failure: ..."
//! - `audit.detail`: additional context, empty when absent
//!
//! Key material never appears in any field.

use std::fmt;

use crate::types::TenantId;

/// Action performed on a signing key resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditAction {
    /// A key was registered with the registry.
    RegisterKey,
    /// A fresh key was generated and registered by rotation.
    RotateKey,
    /// Expired keys were removed from a tenant's registry.
    CleanupKeys,
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RegisterKey => write!(f, "register_key"),
            Self::RotateKey => write!(f, "rotate_key"),
            Self::CleanupKeys => write!(f, "cleanup_keys"),
        }
    }
}

/// Outcome of an audited operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuditResult {
    /// Operation completed successfully.
    Success,
    /// Operation failed with the given reason.
    Failure(String),
}

impl fmt::Display for AuditResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::Failure(reason) => write!(f, "failure: {reason}"),
        }
    }
}

/// Emits one audit event.
pub fn emit(action: AuditAction, resource: &str, result: &AuditResult, detail: Option<&str>) {
    tracing::info!(
        audit.action = %action,
        audit.resource = %resource,
        audit.result = %result,
        audit.detail = detail.unwrap_or_default(),
        "audit_event"
    );
}

/// Constructs a resource identifier string from tenant and kid.
pub fn key_resource(tenant_id: TenantId, kid: &str) -> String {
    format!("tenant:{tenant_id}/kid:{kid}")
}

/// Constructs a resource identifier string for a whole tenant.
pub fn tenant_resource(tenant_id: TenantId) -> String {
    format!("tenant:{tenant_id}")
}
