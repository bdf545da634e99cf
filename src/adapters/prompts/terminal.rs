use std::io::{self, BufRead, IsTerminal, Write};
use std::path::PathBuf;
use std::sync::Arc;

use secrecy::{ExposeSecret, SecretString};
use tracing::warn;

use crate::adapters::cache::memory_cache::MemoryCache;
use crate::adapters::keyserver::gpg_keyserver::GpgKeyserver;
use crate::core::models::credential::{Credential, CredentialTarget};
use crate::core::models::key_id::KeyId;
use crate::core::suspension::{Resumer, Suspension, suspension};
use crate::core::traits::prompts::{
    LookupReply, OutputPathPrompt, OutputPathReply, PassphrasePrompt, PassphraseReply, SignerLookup,
};

/// Run `ask` on a blocking worker and resume with its answer.
fn ask_in_background<T, F>(ask: F) -> Suspension<T>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    let (resumer, waiting): (Resumer<T>, Suspension<T>) = suspension();
    tokio::task::spawn_blocking(move || resumer.resume(ask()));
    waiting
}

/// Indentation shared by every terminal question.
fn prompt_line(question: &str) -> String {
    format!("  {question} ")
}

fn passphrase_question(target: CredentialTarget) -> String {
    match target {
        CredentialTarget::SecretKey(id) => format!("Passphrase for key {id}:"),
        CredentialTarget::Symmetric => "Passphrase for this message:".to_string(),
    }
}

/// Ask a question on stderr and read one line from stdin.
fn read_answer(question: &str) -> io::Result<String> {
    eprint!("{}", prompt_line(question));
    io::stderr().flush()?;
    let mut input = String::new();
    io::stdin().lock().read_line(&mut input)?;
    Ok(input.trim().to_string())
}

/// Reads passphrases from the controlling terminal without echo.
///
/// An empty answer cancels. Collected passphrases go into the shared cache
/// when one is configured.
pub struct TerminalPassphrasePrompt {
    cache: Option<Arc<MemoryCache>>,
}

impl TerminalPassphrasePrompt {
    pub fn new(cache: Option<Arc<MemoryCache>>) -> Self {
        Self { cache }
    }
}

impl PassphrasePrompt for TerminalPassphrasePrompt {
    fn request(&self, target: CredentialTarget) -> Suspension<PassphraseReply> {
        let cache = self.cache.clone();
        ask_in_background(move || {
            let question = prompt_line(&passphrase_question(target));
            let answer = match rpassword::prompt_password(question) {
                Ok(answer) => answer,
                Err(e) => {
                    warn!("cannot read passphrase: {e}");
                    return PassphraseReply::Cancelled;
                }
            };
            if answer.is_empty() {
                return PassphraseReply::Cancelled;
            }

            let passphrase = SecretString::from(answer);
            if let Some(cache) = cache {
                cache.insert(target, SecretString::from(passphrase.expose_secret().to_owned()));
            }
            PassphraseReply::Provided(Credential::user_supplied(target, passphrase))
        })
    }
}

/// Confirms where decrypted files are written.
///
/// A path given on the command line wins; `assume_yes` accepts the
/// suggestion without asking.
pub struct TerminalOutputPrompt {
    preset: Option<PathBuf>,
    assume_yes: bool,
}

impl TerminalOutputPrompt {
    pub fn new(preset: Option<PathBuf>, assume_yes: bool) -> Self {
        Self { preset, assume_yes }
    }
}

/// Interpret an answer to "write here? [Y/n/other path]".
fn output_answer(answer: &str, suggested: PathBuf) -> OutputPathReply {
    match answer {
        "" | "y" | "Y" | "yes" => OutputPathReply::Confirmed(suggested),
        "n" | "N" | "no" => OutputPathReply::Cancelled,
        other => OutputPathReply::Confirmed(PathBuf::from(other)),
    }
}

impl OutputPathPrompt for TerminalOutputPrompt {
    fn confirm(&self, suggested: PathBuf) -> Suspension<OutputPathReply> {
        if let Some(path) = &self.preset {
            return Suspension::ready(OutputPathReply::Confirmed(path.clone()));
        }
        if self.assume_yes || !io::stdin().is_terminal() {
            return Suspension::ready(OutputPathReply::Confirmed(suggested));
        }

        ask_in_background(move || {
            let question = format!(
                "Write decrypted file to {}? [Y/n/other path]:",
                suggested.display()
            );
            match read_answer(&question) {
                Ok(answer) => output_answer(&answer, suggested),
                Err(e) => {
                    warn!("cannot read answer: {e}");
                    OutputPathReply::Cancelled
                }
            }
        })
    }
}

/// Offers to fetch an unknown signer's key from the keyserver.
///
/// Without a terminal the offer is declined, so the attempt falls through
/// to a single retry without lookup.
pub struct TerminalSignerLookup {
    keyserver: Arc<GpgKeyserver>,
}

impl TerminalSignerLookup {
    pub fn new(keyserver: Arc<GpgKeyserver>) -> Self {
        Self { keyserver }
    }
}

impl SignerLookup for TerminalSignerLookup {
    fn lookup(&self, signer: KeyId) -> Suspension<LookupReply> {
        if !io::stdin().is_terminal() {
            return Suspension::ready(LookupReply::Cancelled);
        }

        let keyserver = Arc::clone(&self.keyserver);
        ask_in_background(move || {
            let question = format!(
                "Signed by unknown key {signer}. Fetch it from {}? [y/N]:",
                keyserver.keyserver()
            );
            match read_answer(&question).as_deref() {
                Ok("y" | "Y" | "yes") => match keyserver.fetch(signer) {
                    Ok(()) => LookupReply::Imported,
                    Err(e) => {
                        warn!("{e}");
                        LookupReply::Cancelled
                    }
                },
                _ => LookupReply::Cancelled,
            }
        })
    }
}
