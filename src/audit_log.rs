//!
//! Audit log entries as returned by `/api/v2.0/audit-logs`.
//!

/// One entry in the audit trail
#[derive(Clone, Debug, PartialEq, Eq, serde::Deserialize)]
pub struct AuditRecord {
    /// Identifier assigned by the registry
    pub id: i64,
    /// Operation tag, e.g. `create` or `delete`
    pub operation: String,
    /// User that performed the operation
    #[serde(rename = "username")]
    pub actor: String,
    /// Affected resource, e.g. `library/nginx:latest`
    pub resource: String,
    /// Kind of resource
    pub resource_type: String,
    /// When the operation happened
    #[serde(rename = "op_time")]
    pub timestamp: chrono::DateTime<chrono::FixedOffset>,
}
