use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use crate::config::app_config::AuditSection;
use crate::core::errors::{Result, UnveilError};
use crate::core::models::audit_entry::AuditEntry;
use crate::core::traits::audit::AuditLogger;

/// Audit logger that appends one JSON object per decryption attempt.
///
/// Entries never contain plaintext or passphrases, only where the input
/// came from, its hash, and how the attempt ended.
pub struct JsonAuditLogger {
    log_path: PathBuf,
}

impl JsonAuditLogger {
    /// Create a logger that writes to `{dir}/{log_file}`.
    pub fn new(dir: &Path, log_file: &str) -> Self {
        Self {
            log_path: dir.join(log_file),
        }
    }

    /// Create a logger from the `[audit]` section, falling back to
    /// defaults if it is missing.
    pub fn from_config(dir: &Path, audit_section: Option<&AuditSection>) -> Self {
        let log_file = audit_section
            .map(|a| a.log_file.as_str())
            .unwrap_or("audit.log");
        Self::new(dir, log_file)
    }

    /// Returns `true` when the section is absent (enabled by default).
    pub fn is_enabled(audit_section: Option<&AuditSection>) -> bool {
        audit_section.map(|a| a.enabled).unwrap_or(true)
    }

    pub fn path(&self) -> &Path {
        &self.log_path
    }
}

impl AuditLogger for JsonAuditLogger {
    fn log_event(&self, entry: &AuditEntry) -> Result<()> {
        let line = serde_json::to_string(entry).map_err(|e| UnveilError::AuditError {
            detail: format!("Failed to serialize audit entry: {e}"),
        })?;

        if let Some(parent) = self.log_path.parent()
            && !parent.exists()
        {
            fs::create_dir_all(parent).map_err(|e| UnveilError::AuditError {
                detail: format!("Cannot create {}: {e}", parent.display()),
            })?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_path)
            .map_err(|e| UnveilError::AuditError {
                detail: format!("Cannot open audit log at {}: {e}", self.log_path.display()),
            })?;

        writeln!(file, "{line}").map_err(|e| UnveilError::AuditError {
            detail: format!("Failed to write audit entry: {e}"),
        })?;

        Ok(())
    }

    fn query(&self, since: Option<DateTime<Utc>>) -> Result<Vec<AuditEntry>> {
        if !self.log_path.exists() {
            return Ok(Vec::new());
        }

        let file = fs::File::open(&self.log_path).map_err(|e| UnveilError::AuditError {
            detail: format!("Cannot read audit log: {e}"),
        })?;

        let mut entries = Vec::new();
        for (line_num, line) in BufReader::new(file).lines().enumerate() {
            let line = line.map_err(|e| UnveilError::AuditError {
                detail: format!("Error reading audit log line {}: {e}", line_num + 1),
            })?;

            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            let entry: AuditEntry =
                serde_json::from_str(trimmed).map_err(|e| UnveilError::AuditError {
                    detail: format!("Malformed audit entry at line {}: {e}", line_num + 1),
                })?;

            if since.is_some_and(|cutoff| entry.timestamp < cutoff) {
                continue;
            }
            entries.push(entry);
        }

        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::audit_entry::AuditAction;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn sample_entry(source: &str, outcome: &str) -> AuditEntry {
        AuditEntry {
            timestamp: Utc::now(),
            action: AuditAction::Decrypt,
            source: source.to_string(),
            outcome: outcome.to_string(),
            signer: None,
            verification: Some("unsigned".into()),
            dispatches: 1,
            input_sha256: None,
        }
    }

    #[test]
    fn log_and_query_round_trip() {
        let tmp = TempDir::new().unwrap();
        let logger = JsonAuditLogger::new(tmp.path(), "audit.log");

        logger.log_event(&sample_entry("report.pdf.gpg", "success")).unwrap();

        let results = logger.query(None).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].source, "report.pdf.gpg");
        assert_eq!(results[0].action, AuditAction::Decrypt);
    }

    #[test]
    fn entries_are_appended_in_order() {
        let tmp = TempDir::new().unwrap();
        let logger = JsonAuditLogger::new(tmp.path(), "nested/audit.log");

        logger.log_event(&sample_entry("a", "success")).unwrap();
        logger.log_event(&sample_entry("b", "bad_passphrase")).unwrap();

        let results = logger.query(None).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[1].outcome, "bad_passphrase");
    }

    #[test]
    fn filter_by_since() {
        let tmp = TempDir::new().unwrap();
        let logger = JsonAuditLogger::new(tmp.path(), "audit.log");

        let old = AuditEntry {
            timestamp: Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
            ..sample_entry("old", "success")
        };
        let recent = AuditEntry {
            timestamp: Utc.with_ymd_and_hms(2026, 6, 1, 0, 0, 0).unwrap(),
            ..sample_entry("recent", "success")
        };
        logger.log_event(&old).unwrap();
        logger.log_event(&recent).unwrap();

        let cutoff = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let results = logger.query(Some(cutoff)).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].source, "recent");
    }

    #[test]
    fn malformed_line_is_reported() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("audit.log"), "{not json}\n").unwrap();
        let logger = JsonAuditLogger::new(tmp.path(), "audit.log");

        let err = logger.query(None).unwrap_err();
        assert!(err.to_string().contains("line 1"));
    }

    #[test]
    fn query_nonexistent_file_returns_empty() {
        let logger = JsonAuditLogger::new(Path::new("/nonexistent"), "audit.log");
        assert!(logger.query(None).unwrap().is_empty());
    }

    #[test]
    fn is_enabled_respects_config() {
        let disabled = AuditSection {
            enabled: false,
            log_file: "audit.log".to_string(),
        };
        assert!(JsonAuditLogger::is_enabled(None));
        assert!(!JsonAuditLogger::is_enabled(Some(&disabled)));
    }
}
