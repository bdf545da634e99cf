use crate::core::models::credential::Credential;
use crate::core::models::outcome::EngineResponse;
use crate::core::models::request::DecryptionRequest;

/// Failures an engine reports for one dispatch.
///
/// `NoSecretKey` and `NoContainer` must stay distinguishable: the first
/// means the data is fine but nothing here can unlock it, the second means
/// the data is not an encrypted or signed OpenPGP container at all.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    #[error("no usable secret key or passphrase: {detail}")]
    NoSecretKey { detail: String },

    #[error("no recognizable OpenPGP container: {detail}")]
    NoContainer { detail: String },

    #[error("bad passphrase: {detail}")]
    BadPassphrase { detail: String },

    #[error("{detail}")]
    Failed { detail: String },
}

/// Port for the component that performs the actual OpenPGP decryption and
/// verification.
///
/// Implementations live in `adapters::engine`. Calls are blocking; the
/// orchestrator runs them on a worker thread, one request per call.
pub trait CryptoEngine: Send + Sync {
    /// Decrypt and/or verify the request's input.
    ///
    /// The credential is moved in so it is used for this dispatch only.
    fn execute(
        &self,
        request: &DecryptionRequest,
        credential: Option<Credential>,
    ) -> std::result::Result<EngineResponse, EngineError>;

    /// Human-readable name of this engine (e.g. "gpg").
    fn name(&self) -> &str;
}
