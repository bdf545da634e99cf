use std::io::{self, BufRead, IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use colored::Colorize;
use tracing::debug;

use unveil::adapters::cache::memory_cache::MemoryCache;
use unveil::adapters::engine::gpg_engine::GpgEngine;
use unveil::adapters::keyserver::gpg_keyserver::GpgKeyserver;
use unveil::adapters::prompts::terminal::{
    TerminalOutputPrompt, TerminalPassphrasePrompt, TerminalSignerLookup,
};
use unveil::config::app_config::AppConfig;
use unveil::core::errors::Result;
use unveil::core::models::audit_entry::AuditAction;
use unveil::core::models::outcome::{
    Completion, DecryptedOutput, DecryptionReport, SignatureInfo, VerificationStatus,
};
use unveil::core::models::payload::Payload;
use unveil::core::models::probe_result::ProbeResult;
use unveil::core::services::orchestrator::{
    Collaborators, DecryptOptions, DecryptionOrchestrator,
};

use super::audit_helpers::{self, AttemptRecord};
use super::crypto_helpers;
use crate::cli::progress::ProgressEngine;
use crate::cli::{InputArgs, context, output};

/// Flags of the `unveil decrypt` command.
pub struct DecryptArgs<'a> {
    pub input: &'a InputArgs,
    pub output: Option<&'a str>,
    pub binary: bool,
    pub no_lookup: bool,
    pub delete_after: bool,
    pub yes: bool,
}

/// Execute the `unveil decrypt` command.
///
/// Runs a decryption attempt, prints the result and records every
/// attempt in the audit log whatever its outcome. When the signer's key
/// gets imported, the payload is decrypted once more so the signature can
/// be checked without asking for the passphrase again.
pub fn execute(args: DecryptArgs<'_>) -> Result<()> {
    let config = context::load_config()?;
    let payload = crypto_helpers::payload_from(args.input)?;
    let input_sha256 = crypto_helpers::input_sha256(&payload);
    let input_path = args.input.file.as_ref().map(PathBuf::from);

    let gpg_path = config.gpg_path();
    let gpg = GpgEngine::with_path(gpg_path.clone());
    if !gpg.is_available() {
        output::warning(&format!("gpg not found at {}", gpg_path.display()));
    }
    let cache = Arc::new(MemoryCache::new(config.cache_ttl()));
    let keyserver = Arc::new(GpgKeyserver::new(
        gpg_path,
        config.unveil.keyserver.clone(),
    ));

    let collaborators = Collaborators {
        engine: Arc::new(ProgressEngine::new(Arc::new(gpg))),
        keyring: crypto_helpers::keyring_for(&config)?,
        cache: cache.clone(),
        passphrase_prompt: Arc::new(TerminalPassphrasePrompt::new(Some(cache))),
        output_prompt: Arc::new(TerminalOutputPrompt::new(
            args.output.map(PathBuf::from),
            args.yes,
        )),
        signer_lookup: Arc::new(TerminalSignerLookup::new(keyserver)),
    };
    let options = DecryptOptions {
        lookup_unknown_signers: config.unveil.lookup_unknown_signers && !args.no_lookup,
        want_binary_output: args.binary,
        output_dir: config.output_dir(),
    };

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    let first = run_attempt(
        &runtime,
        &config,
        payload,
        collaborators.clone(),
        options.clone(),
        input_sha256.clone(),
    )?;

    let (report, action) = match first.completion {
        Completion::Decrypted(report) => (report, first.action),
        Completion::SignerKeyImported { signer } => {
            output::success(&format!("Imported public key {signer}"));
            let Some(payload) = first.replay else {
                output::detail("Run the command again to verify the signature.");
                return Ok(());
            };

            // Same cache, so the passphrase is not asked for again.
            let preset = first
                .output_path
                .or_else(|| args.output.map(PathBuf::from));
            let collaborators = Collaborators {
                output_prompt: Arc::new(TerminalOutputPrompt::new(preset, true)),
                ..collaborators
            };
            let options = DecryptOptions {
                lookup_unknown_signers: false,
                ..options
            };

            let second =
                run_attempt(&runtime, &config, payload, collaborators, options, input_sha256)?;
            match second.completion {
                Completion::Decrypted(report) => (report, second.action),
                Completion::SignerKeyImported { .. } => {
                    output::detail("Run the command again to verify the signature.");
                    return Ok(());
                }
            }
        }
    };

    present(&report, action)?;
    if args.delete_after {
        delete_input(input_path.as_deref(), &report.output, args.yes)?;
    }

    Ok(())
}

/// What one finished attempt leaves behind for the command.
struct Attempted {
    completion: Completion,
    action: AuditAction,
    replay: Option<Payload>,
    output_path: Option<PathBuf>,
}

/// Run one attempt to the end and audit it, successful or not.
fn run_attempt(
    runtime: &tokio::runtime::Runtime,
    config: &AppConfig,
    payload: Payload,
    collaborators: Collaborators,
    options: DecryptOptions,
    input_sha256: Option<String>,
) -> Result<Attempted> {
    let mut attempt = DecryptionOrchestrator::new(payload, collaborators, options);
    let source = attempt.source_description();
    debug!(%source, "starting decryption attempt");

    let result = runtime.block_on(attempt.run());

    let action = match attempt.probe_result() {
        Some(ProbeResult::SignedOnly) => AuditAction::Verify,
        _ => AuditAction::Decrypt,
    };
    audit_helpers::log_attempt(
        config,
        AttemptRecord {
            action: action.clone(),
            source,
            result: &result,
            dispatches: attempt.dispatches(),
            input_sha256,
        },
    );

    Ok(Attempted {
        completion: result?,
        action,
        replay: attempt.replay_payload(),
        output_path: attempt.output_path().map(PathBuf::from),
    })
}

fn present(report: &DecryptionReport, action: AuditAction) -> Result<()> {
    match action {
        AuditAction::Verify => output::header("unveil verify"),
        AuditAction::Decrypt => output::header("unveil decrypt"),
    }

    match &report.output {
        DecryptedOutput::File(path) => {
            output::success(&format!("Wrote {}", path.display()));
        }
        DecryptedOutput::Text(text) => {
            let mut stdout = io::stdout().lock();
            stdout.write_all(text.as_bytes())?;
            if !text.ends_with('\n') {
                writeln!(stdout)?;
            }
            stdout.flush()?;
        }
        DecryptedOutput::Bytes(bytes) => {
            let mut stdout = io::stdout().lock();
            stdout.write_all(bytes)?;
            stdout.flush()?;
        }
    }

    match (report.verification, report.signature.as_ref()) {
        (VerificationStatus::Unsigned, _) | (_, None) => output::detail("Not signed"),
        (VerificationStatus::Verified, Some(sig)) => {
            output::success(&format!("Good signature from {}", signer_label(sig)));
        }
        (VerificationStatus::SignerUnknown, Some(sig)) => output::warning(&format!(
            "Signed by unknown key {} (not verified)",
            sig.signer
        )),
        (VerificationStatus::Invalid, Some(sig)) => output::error(&format!(
            "{} signature from {}",
            "BAD".red().bold(),
            signer_label(sig)
        )),
    }

    Ok(())
}

/// `Name <email> (55667788)`, with whatever parts are known.
fn signer_label(sig: &SignatureInfo) -> String {
    let mut label = String::new();
    if let Some(name) = sig.display_name() {
        label.push_str(name);
    }
    if let Some(email) = sig.email() {
        if !label.is_empty() {
            label.push(' ');
        }
        label.push_str(&format!("<{email}>"));
    }
    if label.is_empty() {
        return sig.signer.small_fingerprint();
    }
    format!("{label} ({})", sig.signer.small_fingerprint())
}

fn delete_input(input: Option<&Path>, output: &DecryptedOutput, yes: bool) -> Result<()> {
    let Some(input) = input else {
        output::warning("--delete-after only applies to file input");
        return Ok(());
    };
    if !matches!(output, DecryptedOutput::File(_)) {
        output::warning("Nothing was written to disk; keeping the encrypted file");
        return Ok(());
    }

    if !yes {
        if !io::stdin().is_terminal() {
            output::warning(&format!("Keeping {} (use -y to delete)", input.display()));
            return Ok(());
        }
        eprint!("  Delete {}? [y/N] ", input.display());
        io::stderr().flush()?;
        let mut answer = String::new();
        io::stdin().lock().read_line(&mut answer)?;
        if !matches!(answer.trim().to_lowercase().as_str(), "y" | "yes") {
            output::detail("Kept the encrypted file");
            return Ok(());
        }
    }

    std::fs::remove_file(input)?;
    output::success(&format!("Deleted {}", input.display()));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use unveil::core::models::key_id::KeyId;
    use unveil::core::models::outcome::SignatureStatus;

    fn sig(uid: Option<&str>) -> SignatureInfo {
        SignatureInfo {
            signer: KeyId::new(0x1122_3344_5566_7788),
            user_id: uid.map(str::to_string),
            status: SignatureStatus::Verified,
        }
    }

    #[test]
    fn label_has_name_email_and_fingerprint() {
        let label = signer_label(&sig(Some("Alice <alice@example.org>")));
        assert!(label.starts_with("Alice <alice@example.org> ("));
    }

    #[test]
    fn label_without_user_id_is_the_fingerprint() {
        let s = sig(None);
        assert_eq!(signer_label(&s), s.signer.small_fingerprint());
    }
}
