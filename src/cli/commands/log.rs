use chrono::{NaiveDate, TimeZone, Utc};
use colored::Colorize;

use unveil::adapters::audit::json_audit_logger::JsonAuditLogger;
use unveil::core::errors::{Result, UnveilError};
use unveil::core::models::audit_entry::{AuditAction, AuditEntry};
use unveil::core::traits::audit::AuditLogger;

use crate::cli::{context, output};

/// Execute the `unveil log` command.
///
/// Displays past decryption attempts, optionally filtered by date and
/// limited to the most recent entries.
pub fn execute(since: Option<&str>, last: Option<usize>) -> Result<()> {
    let config = context::load_config()?;
    let logger = JsonAuditLogger::from_config(&config.data_dir(), config.audit.as_ref());

    let since_dt = since.map(parse_since).transpose()?;
    let entries = logger.query(since_dt)?;

    if entries.is_empty() {
        output::header("unveil log");
        output::warning("No audit entries found");
        if since.is_some() {
            output::detail("Try removing --since to see all entries.");
        }
        return Ok(());
    }

    let skip = last.map_or(0, |n| entries.len().saturating_sub(n));
    let display = &entries[skip..];

    output::header(&format!("unveil log ({} entries)", display.len()));
    for entry in display {
        print_entry(entry);
    }

    Ok(())
}

/// Parse a date string (ISO 8601: `YYYY-MM-DD`) into a UTC DateTime.
fn parse_since(s: &str) -> Result<chrono::DateTime<Utc>> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|_| UnveilError::InvalidConfig {
            detail: format!(
                "Invalid date format: '{s}'. Expected ISO 8601 (YYYY-MM-DD), e.g. 2026-01-15"
            ),
        })
        .map(|d| Utc.from_utc_datetime(&d.and_hms_opt(0, 0, 0).expect("midnight is always valid")))
}

fn print_entry(entry: &AuditEntry) {
    let date = entry.timestamp.format("%Y-%m-%d %H:%M:%S");
    let outcome = if entry.outcome == "success" {
        entry.outcome.green().to_string()
    } else {
        entry.outcome.yellow().to_string()
    };
    let signer = entry
        .signer
        .as_deref()
        .map(|s| format!("signer {s}"))
        .unwrap_or_default();
    let verification = entry.verification.as_deref().unwrap_or("");

    println!(
        "  {} {} {:<8} {} {} {} {}",
        date.to_string().dimmed(),
        "│".dimmed(),
        format_action(&entry.action),
        entry.source,
        outcome,
        verification.dimmed(),
        signer.dimmed(),
    );
}

fn format_action(action: &AuditAction) -> String {
    match action {
        AuditAction::Decrypt => "decrypt".blue().to_string(),
        AuditAction::Verify => "verify".cyan().to_string(),
    }
}
