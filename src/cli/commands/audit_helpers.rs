use chrono::Utc;

use unveil::adapters::audit::json_audit_logger::JsonAuditLogger;
use unveil::config::app_config::AppConfig;
use unveil::core::errors::Result;
use unveil::core::models::audit_entry::{AuditAction, AuditEntry};
use unveil::core::models::outcome::Completion;
use unveil::core::traits::audit::AuditLogger;

use crate::cli::output;

/// What the decrypt command knows about a finished attempt.
pub struct AttemptRecord<'a> {
    pub action: AuditAction,
    pub source: String,
    pub result: &'a Result<Completion>,
    pub dispatches: u32,
    pub input_sha256: Option<String>,
}

/// Record an attempt. Warns on failure instead of propagating the
/// error, since audit should not block the main operation.
pub fn log_attempt(config: &AppConfig, record: AttemptRecord<'_>) {
    let audit_section = config.audit.as_ref();
    if !JsonAuditLogger::is_enabled(audit_section) {
        return;
    }

    let logger = JsonAuditLogger::from_config(&config.data_dir(), audit_section);
    let entry = entry_for(record);

    if let Err(e) = logger.log_event(&entry) {
        output::warning(&format!("Could not write audit log: {e}"));
    }
}

fn entry_for(record: AttemptRecord<'_>) -> AuditEntry {
    let (outcome, signer, verification) = match record.result {
        Ok(Completion::Decrypted(report)) => (
            "success".to_string(),
            report.signature.as_ref().map(|s| s.signer.to_string()),
            Some(report.verification.label().to_string()),
        ),
        Ok(Completion::SignerKeyImported { signer }) => {
            ("signer_imported".to_string(), Some(signer.to_string()), None)
        }
        Err(e) => (e.reason().code().to_string(), None, None),
    };

    AuditEntry {
        timestamp: Utc::now(),
        action: record.action,
        source: record.source,
        outcome,
        signer,
        verification,
        dispatches: record.dispatches,
        input_sha256: record.input_sha256,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use unveil::core::errors::UnveilError;
    use unveil::core::models::key_id::KeyId;

    fn record(result: &Result<Completion>) -> AttemptRecord<'_> {
        AttemptRecord {
            action: AuditAction::Decrypt,
            source: "mail.asc".into(),
            result,
            dispatches: 1,
            input_sha256: None,
        }
    }

    #[test]
    fn failures_record_their_reason_code() {
        let result = Err(UnveilError::NoInputSelected);
        let entry = entry_for(record(&result));
        assert_eq!(entry.outcome, UnveilError::NoInputSelected.reason().code());
        assert!(entry.signer.is_none());
    }

    #[test]
    fn imported_signer_is_recorded() {
        let signer = KeyId::new(0xABCD);
        let result = Ok(Completion::SignerKeyImported { signer });
        let entry = entry_for(record(&result));
        assert_eq!(entry.outcome, "signer_imported");
        assert_eq!(entry.signer, Some(signer.to_string()));
    }
}
