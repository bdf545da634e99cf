use std::ffi::OsString;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use secrecy::ExposeSecret;
use tracing::debug;

use crate::core::models::credential::Credential;
use crate::core::models::key_id::KeyId;
use crate::core::models::outcome::{EngineOutput, EngineResponse, SignatureReport, SignatureVerdict};
use crate::core::models::request::{DecryptionRequest, DispatchInput};
use crate::core::traits::crypto_engine::{CryptoEngine, EngineError};

const STATUS_PREFIX: &str = "[GNUPG:] ";

/// `ERRSIG` return code meaning "public key not available".
const ERRSIG_NO_PUBKEY: &str = "9";

/// Decryption engine that shells out to the system `gpg` binary.
///
/// Outcomes are read from gpg's machine-readable status lines
/// (`--status-fd`), never from its exit code: gpg exits non-zero for a
/// perfectly good decryption whose signer is unknown.
pub struct GpgEngine {
    /// Path to the gpg binary (defaults to "gpg").
    gpg_path: PathBuf,
}

impl GpgEngine {
    pub fn new() -> Self {
        Self {
            gpg_path: PathBuf::from("gpg"),
        }
    }

    pub fn with_path(gpg_path: PathBuf) -> Self {
        Self { gpg_path }
    }

    /// Check if GPG is available on the system.
    pub fn is_available(&self) -> bool {
        Command::new(&self.gpg_path)
            .arg("--version")
            .output()
            .is_ok_and(|o| o.status.success())
    }

    fn run(
        &self,
        request: &DecryptionRequest,
        input: &Path,
        credential: Option<Credential>,
    ) -> Result<(Vec<u8>, String), EngineError> {
        let args = decrypt_args(request, input, credential.is_some());
        debug!(gpg = %self.gpg_path.display(), ?args, "running gpg");

        let mut cmd = Command::new(&self.gpg_path);
        cmd.args(&args)
            .stdin(if credential.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = cmd.spawn().map_err(|e| EngineError::Failed {
            detail: format!("Failed to run {}: {e}", self.gpg_path.display()),
        })?;

        if let (Some(credential), Some(mut stdin)) = (credential, child.stdin.take()) {
            let mut line = credential.passphrase().expose_secret().as_bytes().to_vec();
            line.push(b'\n');
            let written = stdin.write_all(&line);
            line.fill(0);
            written.map_err(|e| EngineError::Failed {
                detail: format!("Failed to pass passphrase to gpg: {e}"),
            })?;
        }

        let output = child.wait_with_output().map_err(|e| EngineError::Failed {
            detail: format!("gpg process failed: {e}"),
        })?;

        debug!(status = ?output.status, "gpg finished");
        Ok((output.stdout, String::from_utf8_lossy(&output.stderr).into_owned()))
    }
}

impl Default for GpgEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl CryptoEngine for GpgEngine {
    fn execute(
        &self,
        request: &DecryptionRequest,
        credential: Option<Credential>,
    ) -> Result<EngineResponse, EngineError> {
        if let Some(parent) = request.output_path.as_deref().and_then(Path::parent) {
            std::fs::create_dir_all(parent).map_err(|e| EngineError::Failed {
                detail: format!("Cannot create {}: {e}", parent.display()),
            })?;
        }

        // gpg reads from a path; in-memory input is spooled to a private
        // temp file that lives until the process is done.
        let (stdout, stderr) = match &request.input {
            DispatchInput::File(path) => self.run(request, path, credential)?,
            DispatchInput::Bytes(data) => {
                let mut spool = tempfile::NamedTempFile::new().map_err(|e| EngineError::Failed {
                    detail: format!("Cannot create temp file: {e}"),
                })?;
                spool.write_all(data).map_err(|e| EngineError::Failed {
                    detail: format!("Cannot write temp file: {e}"),
                })?;
                self.run(request, spool.path(), credential)?
            }
        };

        let status = parse_status(&stderr);
        let output = match &request.output_path {
            Some(path) if request.is_file_target() => EngineOutput::File(path.clone()),
            _ => EngineOutput::Bytes(stdout),
        };
        conclude(status, output, request.signed_only)
    }

    fn name(&self) -> &str {
        "gpg"
    }
}

/// Command line for one decryption.
fn decrypt_args(request: &DecryptionRequest, input: &Path, with_passphrase: bool) -> Vec<OsString> {
    let mut args: Vec<OsString> = ["--batch", "--yes", "--no-tty", "--status-fd", "2"]
        .iter()
        .map(OsString::from)
        .collect();

    if with_passphrase {
        args.extend(
            ["--pinentry-mode", "loopback", "--passphrase-fd", "0"]
                .iter()
                .map(OsString::from),
        );
        // The agent would otherwise answer with a cached symmetric
        // passphrase instead of the one supplied.
        if request.assume_symmetric {
            args.push("--no-symkey-cache".into());
        }
    }

    if let Some(path) = request.output_path.as_ref().filter(|_| request.is_file_target()) {
        args.push("--output".into());
        args.push(path.as_os_str().to_owned());
    }

    args.push("--decrypt".into());
    args.push(input.as_os_str().to_owned());
    args
}

/// Everything worth knowing from one gpg run's status lines.
#[derive(Debug, Default, PartialEq)]
pub(crate) struct StatusReport {
    decryption_okay: bool,
    decryption_failed: bool,
    plaintext: bool,
    no_data: bool,
    bad_passphrase: bool,
    missing_secret_keys: Vec<KeyId>,
    signature: Option<SignatureReport>,
    /// Human-readable gpg messages, in order.
    messages: Vec<String>,
}

impl StatusReport {
    fn detail(&self) -> String {
        self.messages.join("; ")
    }
}

/// Parse the stderr of a `--status-fd 2` run.
pub(crate) fn parse_status(stderr: &str) -> StatusReport {
    let mut report = StatusReport::default();

    for line in stderr.lines() {
        let Some(status) = line.strip_prefix(STATUS_PREFIX) else {
            let message = line.trim();
            if !message.is_empty() {
                report.messages.push(message.to_string());
            }
            continue;
        };

        let mut fields = status.splitn(3, ' ');
        let keyword = fields.next().unwrap_or_default();
        let first = fields.next().unwrap_or_default();
        let rest = fields.next();

        match keyword {
            "DECRYPTION_OKAY" => report.decryption_okay = true,
            "DECRYPTION_FAILED" => report.decryption_failed = true,
            "PLAINTEXT" => report.plaintext = true,
            "NODATA" => report.no_data = true,
            "BAD_PASSPHRASE" => report.bad_passphrase = true,
            "ERROR" if status.contains("Bad_passphrase") => report.bad_passphrase = true,
            "NO_SECKEY" => {
                if let Ok(id) = first.parse() {
                    report.missing_secret_keys.push(id);
                }
            }
            "GOODSIG" => set_signature(&mut report, first, rest, SignatureVerdict::Good),
            "BADSIG" | "EXPSIG" | "EXPKEYSIG" | "REVKEYSIG" => {
                set_signature(&mut report, first, rest, SignatureVerdict::Bad)
            }
            "ERRSIG" => {
                let code = rest.and_then(|r| r.split(' ').nth(4));
                if code == Some(ERRSIG_NO_PUBKEY) {
                    set_signature(&mut report, first, None, SignatureVerdict::MissingKey);
                }
            }
            "NO_PUBKEY" => {
                if report.signature.is_none() {
                    set_signature(&mut report, first, None, SignatureVerdict::MissingKey);
                }
            }
            _ => {}
        }
    }

    report
}

fn set_signature(report: &mut StatusReport, key: &str, user_id: Option<&str>, verdict: SignatureVerdict) {
    let Ok(key_id) = key.parse::<KeyId>() else {
        debug!(key, "unparseable signer key id in gpg status");
        return;
    };
    // A definite verdict about the signer wins over "key missing".
    if report
        .signature
        .as_ref()
        .is_some_and(|existing| existing.verdict != SignatureVerdict::MissingKey)
    {
        return;
    }
    report.signature = Some(SignatureReport {
        key_id,
        user_id: user_id.map(str::trim).filter(|u| !u.is_empty()).map(str::to_string),
        verdict,
    });
}

/// Turn a parsed run into the engine's answer.
pub(crate) fn conclude(
    status: StatusReport,
    output: EngineOutput,
    signed_only: bool,
) -> Result<EngineResponse, EngineError> {
    let detail = status.detail();

    if status.bad_passphrase {
        return Err(EngineError::BadPassphrase { detail });
    }
    if status.decryption_failed {
        return Err(if status.missing_secret_keys.is_empty() {
            EngineError::Failed { detail }
        } else {
            EngineError::NoSecretKey { detail }
        });
    }

    let produced = status.decryption_okay
        || status.plaintext
        || (signed_only && status.signature.is_some());
    if produced {
        return Ok(EngineResponse {
            output,
            signature: status.signature,
        });
    }

    if !status.missing_secret_keys.is_empty() {
        return Err(EngineError::NoSecretKey { detail });
    }
    if status.no_data {
        return Err(EngineError::NoContainer { detail });
    }
    Err(EngineError::Failed {
        detail: if detail.is_empty() {
            "gpg produced no output".into()
        } else {
            detail
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::credential::CredentialTarget;
    use crate::core::models::payload::{DecryptTarget, PayloadKind};
    use std::sync::Arc;

    const GOOD_RUN: &str = "\
[GNUPG:] ENC_TO 1122334455667788 1 0
gpg: encrypted with rsa3072 key, ID 1122334455667788, created 2024-01-01
[GNUPG:] DECRYPTION_KEY 0102 0304 u
[GNUPG:] BEGIN_DECRYPTION
[GNUPG:] PLAINTEXT 62 1700000000 note.txt
[GNUPG:] GOODSIG 8899AABBCCDDEEFF Alice Example <alice@example.org>
[GNUPG:] VALIDSIG 0000 2024-01-01 1700000000
[GNUPG:] DECRYPTION_OKAY
[GNUPG:] END_DECRYPTION
";

    fn bytes_output() -> EngineOutput {
        EngineOutput::Bytes(b"plain".to_vec())
    }

    #[test]
    fn gpg_engine_has_correct_name() {
        assert_eq!(GpgEngine::new().name(), "gpg");
    }

    #[test]
    fn good_signature_is_parsed() {
        let status = parse_status(GOOD_RUN);
        assert!(status.decryption_okay);
        assert_eq!(
            status.signature,
            Some(SignatureReport {
                key_id: KeyId::new(0x8899_AABB_CCDD_EEFF),
                user_id: Some("Alice Example <alice@example.org>".into()),
                verdict: SignatureVerdict::Good,
            })
        );
        assert_eq!(status.messages.len(), 1);

        let response = conclude(status, bytes_output(), false).unwrap();
        assert_eq!(response.output, bytes_output());
    }

    #[test]
    fn bad_and_expired_signatures_are_invalid() {
        for keyword in ["BADSIG", "EXPKEYSIG", "REVKEYSIG"] {
            let run = format!("[GNUPG:] {keyword} 8899AABBCCDDEEFF Bob\n[GNUPG:] DECRYPTION_OKAY\n");
            let sig = parse_status(&run).signature.unwrap();
            assert_eq!(sig.verdict, SignatureVerdict::Bad, "{keyword}");
        }
    }

    #[test]
    fn missing_public_key_is_reported() {
        let run = "\
[GNUPG:] PLAINTEXT 62 0
[GNUPG:] NEWSIG
[GNUPG:] ERRSIG 8899AABBCCDDEEFF 1 8 00 1700000000 9 -
[GNUPG:] NO_PUBKEY 8899AABBCCDDEEFF
[GNUPG:] DECRYPTION_OKAY
gpg: Can't check signature: No public key
";
        let status = parse_status(run);
        let sig = status.signature.clone().unwrap();
        assert_eq!(sig.verdict, SignatureVerdict::MissingKey);
        assert_eq!(sig.user_id, None);
        assert!(conclude(status, bytes_output(), false).is_ok());
    }

    #[test]
    fn errsig_for_other_reasons_is_ignored() {
        let run = "[GNUPG:] ERRSIG 8899AABBCCDDEEFF 1 8 00 1700000000 4 -\n";
        assert_eq!(parse_status(run).signature, None);
    }

    #[test]
    fn no_secret_key() {
        let run = "\
[GNUPG:] ENC_TO 1122334455667788 1 0
[GNUPG:] NO_SECKEY 1122334455667788
[GNUPG:] BEGIN_DECRYPTION
[GNUPG:] DECRYPTION_FAILED
[GNUPG:] END_DECRYPTION
gpg: decryption failed: No secret key
";
        let err = conclude(parse_status(run), bytes_output(), false).unwrap_err();
        assert_eq!(
            err,
            EngineError::NoSecretKey {
                detail: "gpg: decryption failed: No secret key".into()
            }
        );
    }

    #[test]
    fn bad_passphrase_wins() {
        let run = "\
[GNUPG:] BAD_PASSPHRASE 1122334455667788
[GNUPG:] DECRYPTION_FAILED
gpg: public key decryption failed: Bad passphrase
";
        let err = conclude(parse_status(run), bytes_output(), false).unwrap_err();
        assert!(matches!(err, EngineError::BadPassphrase { .. }));
    }

    #[test]
    fn nodata_is_no_container() {
        let run = "[GNUPG:] NODATA 1\ngpg: no valid OpenPGP data found.\n";
        let err = conclude(parse_status(run), bytes_output(), false).unwrap_err();
        assert_eq!(
            err,
            EngineError::NoContainer {
                detail: "gpg: no valid OpenPGP data found.".into()
            }
        );
    }

    #[test]
    fn signed_only_succeeds_on_signature_alone() {
        let run = "[GNUPG:] GOODSIG 8899AABBCCDDEEFF Alice\n";
        assert!(conclude(parse_status(run), bytes_output(), true).is_ok());
        assert!(conclude(parse_status(run), bytes_output(), false).is_err());
    }

    #[test]
    fn args_for_file_target_with_passphrase() {
        let request = DecryptionRequest {
            input: DispatchInput::File(PathBuf::from("/in/msg.gpg")),
            kind: PayloadKind::FilePath,
            target: DecryptTarget::File,
            output_path: Some(PathBuf::from("/out/msg")),
            credential_target: None,
            signed_only: false,
            lookup_unknown_signer: true,
            want_binary_output: false,
            assume_symmetric: false,
        };
        let args = decrypt_args(&request, Path::new("/in/msg.gpg"), true);
        let args: Vec<_> = args.iter().map(|a| a.to_string_lossy().into_owned()).collect();

        assert!(args.windows(2).any(|w| w == ["--pinentry-mode", "loopback"]));
        assert!(args.windows(2).any(|w| w == ["--output", "/out/msg"]));
        assert_eq!(&args[args.len() - 2..], ["--decrypt", "/in/msg.gpg"]);
    }

    #[test]
    fn args_for_message_target_without_passphrase() {
        let request = DecryptionRequest {
            input: DispatchInput::Bytes(Arc::from(&b"x"[..])),
            kind: PayloadKind::Bytes,
            target: DecryptTarget::Message,
            output_path: None,
            credential_target: None,
            signed_only: true,
            lookup_unknown_signer: false,
            want_binary_output: false,
            assume_symmetric: false,
        };
        let args = decrypt_args(&request, Path::new("/tmp/spool"), false);
        assert!(!args.iter().any(|a| a == "--passphrase-fd" || a == "--output"));
    }

    #[test]
    fn symmetric_passphrase_bypasses_agent_cache() {
        let mut request = DecryptionRequest {
            input: DispatchInput::Bytes(Arc::from(&b"x"[..])),
            kind: PayloadKind::Bytes,
            target: DecryptTarget::Message,
            output_path: None,
            credential_target: Some(CredentialTarget::Symmetric),
            signed_only: false,
            lookup_unknown_signer: true,
            want_binary_output: false,
            assume_symmetric: true,
        };
        let args = decrypt_args(&request, Path::new("/tmp/spool"), true);
        assert!(args.iter().any(|a| a == "--no-symkey-cache"));

        request.assume_symmetric = false;
        let args = decrypt_args(&request, Path::new("/tmp/spool"), true);
        assert!(!args.iter().any(|a| a == "--no-symkey-cache"));
    }
}
