use crate::core::models::credential::{Credential, CredentialTarget};

/// Port for the shared passphrase cache.
///
/// The orchestration core only reads from it. Whoever collects a
/// passphrase decides whether to populate it.
pub trait PassphraseCache: Send + Sync {
    fn get(&self, target: &CredentialTarget) -> Option<Credential>;
}
