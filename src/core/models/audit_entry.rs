use serde::{Deserialize, Serialize};

/// Actions that get recorded in the audit log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    Decrypt,
    Verify,
}

/// A single entry in the audit log (JSON lines format).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub action: AuditAction,
    /// File path, or a description of the in-memory input.
    pub source: String,
    /// `success`, `signer_imported`, or a failure reason code.
    pub outcome: String,
    pub signer: Option<String>,
    pub verification: Option<String>,
    pub dispatches: u32,
    pub input_sha256: Option<String>,
}
