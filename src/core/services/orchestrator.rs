//! The decryption state machine.
//!
//! One [`DecryptionOrchestrator`] drives one user-initiated attempt:
//!
//! ```text
//! Init → Classifying → ResolvingCredential → ResolvingOutputTarget → Dispatching
//!      → Interpreting → Done | AwaitingSignerLookup | Failed
//! ```
//!
//! `run` advances until the attempt finishes, fails, or a user answer
//! cancels it. Cancelling a passphrase or output-path prompt leaves the
//! attempt where it was, so calling `run` again asks again. Declining a
//! signer lookup re-enters `Dispatching` once with lookups disabled.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::core::errors::{CancelledAt, FailureReason, Result, UnveilError};
use crate::core::models::credential::{Credential, CredentialTarget};
use crate::core::models::key_id::KeyId;
use crate::core::models::outcome::{
    Completion, DecryptionOutcome, DecryptionReport, EngineResponse, VerificationStatus,
};
use crate::core::models::payload::{DecryptTarget, Payload};
use crate::core::models::probe_result::{MalformedReason, ProbeResult};
use crate::core::models::request::{DecryptionRequest, DispatchInput};
use crate::core::services::credential_resolver::{CredentialResolver, Resolution};
use crate::core::services::key_probe::KeyProbe;
use crate::core::services::output_target::default_output_path;
use crate::core::services::payload_source::{PayloadSource, PayloadStream};
use crate::core::services::result_interpreter::interpret;
use crate::core::traits::crypto_engine::{CryptoEngine, EngineError};
use crate::core::traits::keyring::SecretKeyring;
use crate::core::traits::passphrase_cache::PassphraseCache;
use crate::core::traits::prompts::{
    LookupReply, OutputPathPrompt, OutputPathReply, PassphrasePrompt, PassphraseReply, SignerLookup,
};

/// Everything outside the core that an attempt talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub engine: Arc<dyn CryptoEngine>,
    pub keyring: Arc<dyn SecretKeyring>,
    pub cache: Arc<dyn PassphraseCache>,
    pub passphrase_prompt: Arc<dyn PassphrasePrompt>,
    pub output_prompt: Arc<dyn OutputPathPrompt>,
    pub signer_lookup: Arc<dyn SignerLookup>,
}

/// Per-attempt switches chosen by the caller.
#[derive(Debug, Clone)]
pub struct DecryptOptions {
    /// Offer a keyserver lookup when the signer is unknown.
    pub lookup_unknown_signers: bool,
    /// Return message plaintext as bytes instead of text.
    pub want_binary_output: bool,
    /// Root for default output paths of file targets.
    pub output_dir: PathBuf,
}

impl Default for DecryptOptions {
    fn default() -> Self {
        Self {
            lookup_unknown_signers: true,
            want_binary_output: false,
            output_dir: PathBuf::from("."),
        }
    }
}

/// Observable position of an attempt in the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Init,
    Classifying,
    ResolvingCredential,
    ResolvingOutputTarget,
    Dispatching,
    Interpreting,
    AwaitingSignerLookup,
    Done,
    Failed(FailureReason),
}

enum Phase {
    Init,
    Classifying(PayloadStream),
    ResolvingCredential,
    ResolvingOutputTarget,
    Dispatching,
    Interpreting(
        Arc<DecryptionRequest>,
        std::result::Result<EngineResponse, EngineError>,
    ),
    AwaitingSignerLookup(KeyId),
    Done,
    Failed(FailureReason),
}

impl Phase {
    fn stage(&self) -> Stage {
        match self {
            Self::Init => Stage::Init,
            Self::Classifying(_) => Stage::Classifying,
            Self::ResolvingCredential => Stage::ResolvingCredential,
            Self::ResolvingOutputTarget => Stage::ResolvingOutputTarget,
            Self::Dispatching => Stage::Dispatching,
            Self::Interpreting(..) => Stage::Interpreting,
            Self::AwaitingSignerLookup(_) => Stage::AwaitingSignerLookup,
            Self::Done => Stage::Done,
            Self::Failed(reason) => Stage::Failed(*reason),
        }
    }

    /// Where the attempt stands if a step is abandoned halfway.
    fn parked(&self) -> Phase {
        match self {
            Self::Init | Self::Classifying(_) => Self::Init,
            Self::ResolvingCredential => Self::ResolvingCredential,
            Self::ResolvingOutputTarget => Self::ResolvingOutputTarget,
            Self::Dispatching | Self::Interpreting(..) => Self::Dispatching,
            Self::AwaitingSignerLookup(signer) => Self::AwaitingSignerLookup(*signer),
            Self::Done => Self::Done,
            Self::Failed(reason) => Self::Failed(*reason),
        }
    }
}

/// Result of one state transition.
enum Step {
    Next(Phase),
    Complete(Completion),
    Fail(UnveilError),
    /// Stop in `Phase` and hand the error to the caller; `run` may be
    /// called again.
    Interrupt(Phase, UnveilError),
}

/// An engine call that has been started but not yet collected.
struct InFlight {
    request: Arc<DecryptionRequest>,
    worker: JoinHandle<std::result::Result<EngineResponse, EngineError>>,
}

struct Classified {
    probe: ProbeResult,
    input: DispatchInput,
}

/// Mutable bookkeeping for one attempt.
struct AttemptState {
    classified: Option<Classified>,
    credential: Option<Credential>,
    output_path: Option<PathBuf>,
    lookup_unknown_key: bool,
    dispatches: u32,
    suspensions: u32,
}

/// Drives a single decryption attempt from raw payload to outcome.
pub struct DecryptionOrchestrator {
    source: PayloadSource,
    probe: KeyProbe,
    resolver: CredentialResolver,
    engine: Arc<dyn CryptoEngine>,
    output_prompt: Arc<dyn OutputPathPrompt>,
    signer_lookup: Arc<dyn SignerLookup>,
    options: DecryptOptions,
    state: AttemptState,
    phase: Phase,
    in_flight: Option<InFlight>,
}

impl DecryptionOrchestrator {
    pub fn new(payload: Payload, collaborators: Collaborators, options: DecryptOptions) -> Self {
        let Collaborators {
            engine,
            keyring,
            cache,
            passphrase_prompt,
            output_prompt,
            signer_lookup,
        } = collaborators;

        let state = AttemptState {
            classified: None,
            credential: None,
            output_path: None,
            lookup_unknown_key: options.lookup_unknown_signers,
            dispatches: 0,
            suspensions: 0,
        };

        Self {
            source: PayloadSource::new(payload),
            probe: KeyProbe::new(keyring),
            resolver: CredentialResolver::new(cache, passphrase_prompt),
            engine,
            output_prompt,
            signer_lookup,
            options,
            state,
            phase: Phase::Init,
            in_flight: None,
        }
    }

    pub fn stage(&self) -> Stage {
        self.phase.stage()
    }

    /// Classification of the payload, once known.
    pub fn probe_result(&self) -> Option<ProbeResult> {
        self.state.classified.as_ref().map(|c| c.probe)
    }

    /// Engine dispatches issued so far.
    pub fn dispatches(&self) -> u32 {
        self.state.dispatches
    }

    /// Times the attempt waited on a collaborator.
    pub fn suspensions(&self) -> u32 {
        self.state.suspensions
    }

    /// Output path confirmed for a file target.
    pub fn output_path(&self) -> Option<&Path> {
        self.state.output_path.as_deref()
    }

    /// Payload for an independent follow-up attempt, such as decrypting
    /// again once a signer key has been imported.
    pub fn replay_payload(&self) -> Option<Payload> {
        self.source.replay()
    }

    /// Human-readable description of the input.
    pub fn source_description(&self) -> String {
        self.source.describe()
    }

    /// Advance the attempt until it completes, fails or is cancelled.
    ///
    /// Dropping the returned future while it waits on a collaborator
    /// abandons the wait; the attempt stays at that stage. An engine call
    /// already started keeps running and the next `run` collects its
    /// response instead of dispatching again.
    pub async fn run(&mut self) -> Result<Completion> {
        if matches!(self.phase, Phase::Done | Phase::Failed(_)) {
            return Err(UnveilError::AttemptFinished);
        }

        loop {
            let parked = self.phase.parked();
            let phase = std::mem::replace(&mut self.phase, parked);

            match self.step(phase).await {
                Step::Next(next) => {
                    debug!(stage = ?next.stage(), "attempt advanced");
                    self.phase = next;
                }
                Step::Complete(completion) => {
                    debug!(dispatches = self.state.dispatches, "attempt done");
                    self.phase = Phase::Done;
                    return Ok(completion);
                }
                Step::Fail(error) => {
                    let reason = error.reason();
                    warn!(reason = %reason, "attempt failed");
                    self.phase = Phase::Failed(reason);
                    return Err(error);
                }
                Step::Interrupt(phase, error) => {
                    debug!(stage = ?phase.stage(), "attempt interrupted: {error}");
                    self.phase = phase;
                    return Err(error);
                }
            }
        }
    }

    async fn step(&mut self, phase: Phase) -> Step {
        match phase {
            Phase::Init => match self.source.open() {
                Ok(stream) => Step::Next(Phase::Classifying(stream)),
                Err(e) => Step::Fail(e),
            },
            Phase::Classifying(stream) => self.classify(stream),
            Phase::ResolvingCredential => self.resolve_credential().await,
            Phase::ResolvingOutputTarget => self.resolve_output_target().await,
            Phase::Dispatching => self.dispatch().await,
            Phase::Interpreting(request, raw) => self.interpret(&request, raw),
            Phase::AwaitingSignerLookup(signer) => self.await_signer_lookup(signer).await,
            finished @ (Phase::Done | Phase::Failed(_)) => {
                Step::Interrupt(finished, UnveilError::AttemptFinished)
            }
        }
    }

    fn classify(&mut self, mut stream: PayloadStream) -> Step {
        let probe = match self.probe.classify(&mut stream) {
            Ok(probe) => probe,
            Err(e) => return Step::Fail(e),
        };
        info!(source = %self.source.describe(), %probe, "payload classified");

        match probe {
            ProbeResult::Malformed(MalformedReason::Unrecognized) => {
                return Step::Fail(UnveilError::NoRecognizedEncryption { detail: None });
            }
            ProbeResult::Malformed(MalformedReason::NoKnownEncryption) => {
                return Step::Fail(UnveilError::NoKnownEncryptionFound);
            }
            _ => {}
        }

        let input = match self.source.settle(stream) {
            Ok(input) => input,
            Err(e) => return Step::Fail(e),
        };
        self.state.classified = Some(Classified { probe, input });

        if probe.is_signed_only() {
            Step::Next(self.after_credential())
        } else {
            Step::Next(Phase::ResolvingCredential)
        }
    }

    async fn resolve_credential(&mut self) -> Step {
        let Some(probe) = self.probe_result() else {
            return Step::Next(Phase::Init);
        };

        match self.resolver.resolve(&probe) {
            Resolution::NotNeeded => {
                self.state.credential = None;
                Step::Next(self.after_credential())
            }
            Resolution::Ready(credential) => {
                self.state.credential = Some(credential);
                Step::Next(self.after_credential())
            }
            Resolution::Suspend(target) => {
                self.state.suspensions += 1;
                match self.resolver.collect(target).resumed().await {
                    PassphraseReply::Provided(credential) => {
                        self.state.credential = Some(credential);
                        Step::Next(self.after_credential())
                    }
                    PassphraseReply::NotRequired => {
                        debug!(%target, "key has no passphrase");
                        self.state.credential = None;
                        Step::Next(self.after_credential())
                    }
                    PassphraseReply::Cancelled => Step::Interrupt(
                        Phase::ResolvingCredential,
                        UnveilError::UserCancelled {
                            at: CancelledAt::Passphrase,
                        },
                    ),
                }
            }
        }
    }

    fn after_credential(&self) -> Phase {
        if self.target() == DecryptTarget::File {
            Phase::ResolvingOutputTarget
        } else {
            Phase::Dispatching
        }
    }

    async fn resolve_output_target(&mut self) -> Step {
        let input = self.source.input_path().unwrap_or(Path::new(""));
        let suggested = default_output_path(input, &self.options.output_dir);

        self.state.suspensions += 1;
        match self.output_prompt.confirm(suggested).resumed().await {
            OutputPathReply::Confirmed(path) => {
                debug!(path = %path.display(), "output path confirmed");
                self.state.output_path = Some(path);
                Step::Next(Phase::Dispatching)
            }
            OutputPathReply::Cancelled => Step::Interrupt(
                Phase::ResolvingOutputTarget,
                UnveilError::UserCancelled {
                    at: CancelledAt::OutputPath,
                },
            ),
        }
    }

    async fn dispatch(&mut self) -> Step {
        if self.in_flight.is_none() {
            let Some(request) = self.build_request() else {
                return Step::Next(Phase::Init);
            };
            self.in_flight = Some(self.start_dispatch(Arc::new(request)));
        } else {
            debug!("resuming the dispatch already in flight");
        }

        let Some(in_flight) = self.in_flight.as_mut() else {
            return Step::Next(Phase::Init);
        };
        // Dropping `run` here leaves the worker in `in_flight` for the next call.
        let raw = (&mut in_flight.worker).await.unwrap_or_else(|e| {
            Err(EngineError::Failed {
                detail: format!("engine worker stopped: {e}"),
            })
        });
        let request = Arc::clone(&in_flight.request);
        self.in_flight = None;

        Step::Next(Phase::Interpreting(request, raw))
    }

    fn start_dispatch(&mut self, request: Arc<DecryptionRequest>) -> InFlight {
        let credential = self.state.credential.clone();

        self.state.dispatches += 1;
        info!(
            dispatch = self.state.dispatches,
            engine = self.engine.name(),
            target = ?request.target,
            lookup = request.lookup_unknown_signer,
            "dispatching to engine"
        );

        let engine = Arc::clone(&self.engine);
        let worker_request = Arc::clone(&request);
        let worker =
            tokio::task::spawn_blocking(move || engine.execute(&worker_request, credential));

        InFlight { request, worker }
    }

    fn build_request(&self) -> Option<DecryptionRequest> {
        let classified = self.state.classified.as_ref()?;
        let target = self.target();
        let credential_target = classified.probe.credential_target();

        Some(DecryptionRequest {
            input: classified.input.clone(),
            kind: self.source.kind(),
            target,
            output_path: match target {
                DecryptTarget::File => self.state.output_path.clone(),
                _ => None,
            },
            credential_target,
            signed_only: classified.probe.is_signed_only(),
            lookup_unknown_signer: self.state.lookup_unknown_key,
            want_binary_output: self.options.want_binary_output,
            assume_symmetric: credential_target == Some(CredentialTarget::Symmetric),
        })
    }

    fn interpret(
        &mut self,
        request: &DecryptionRequest,
        raw: std::result::Result<EngineResponse, EngineError>,
    ) -> Step {
        match interpret(request, raw) {
            DecryptionOutcome::Ok { output, signature } => {
                let verification = VerificationStatus::of(signature.as_ref());
                Step::Complete(Completion::Decrypted(DecryptionReport {
                    output,
                    signature,
                    verification,
                    dispatches: self.state.dispatches,
                }))
            }
            DecryptionOutcome::UnknownSigner { signer } => {
                info!(%signer, "signature by unknown key");
                Step::Next(Phase::AwaitingSignerLookup(signer))
            }
            DecryptionOutcome::Failed { reason, detail } => Step::Fail(failure(reason, detail)),
        }
    }

    async fn await_signer_lookup(&mut self, signer: KeyId) -> Step {
        self.state.suspensions += 1;
        match self.signer_lookup.lookup(signer).resumed().await {
            LookupReply::Imported => {
                info!(%signer, "signer key imported");
                Step::Complete(Completion::SignerKeyImported { signer })
            }
            LookupReply::Cancelled => {
                info!(%signer, "lookup declined, retrying without it");
                self.state.lookup_unknown_key = false;
                Step::Next(Phase::Dispatching)
            }
        }
    }

    fn target(&self) -> DecryptTarget {
        self.source.kind().target()
    }
}

/// Turn an interpreted failure back into a caller-facing error.
fn failure(reason: FailureReason, detail: Option<String>) -> UnveilError {
    match reason {
        FailureReason::NoSecretKeyAvailable => UnveilError::NoSecretKeyAvailable { detail },
        FailureReason::NoRecognizedEncryption => UnveilError::NoRecognizedEncryption { detail },
        FailureReason::BadPassphrase => UnveilError::BadPassphrase { detail },
        _ => UnveilError::EngineFailure {
            detail: detail.unwrap_or_else(|| reason.to_string()),
        },
    }
}
