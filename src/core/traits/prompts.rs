use std::path::PathBuf;

use crate::core::models::credential::{Credential, CredentialTarget};
use crate::core::models::key_id::KeyId;
use crate::core::suspension::Suspension;

/// Answer from passphrase collection.
#[derive(Debug)]
pub enum PassphraseReply {
    Provided(Credential),
    /// The secret key is not protected; go ahead without a passphrase.
    NotRequired,
    Cancelled,
}

/// Answer from output path collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputPathReply {
    Confirmed(PathBuf),
    Cancelled,
}

/// Answer from the keyserver lookup collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupReply {
    Imported,
    Cancelled,
}

/// Collects a passphrase from the user.
pub trait PassphrasePrompt: Send + Sync {
    fn request(&self, target: CredentialTarget) -> Suspension<PassphraseReply>;
}

/// Confirms (or overrides) where a decrypted file goes.
pub trait OutputPathPrompt: Send + Sync {
    fn confirm(&self, suggested: PathBuf) -> Suspension<OutputPathReply>;
}

/// Offers to fetch an unknown signer's public key from a keyserver.
pub trait SignerLookup: Send + Sync {
    fn lookup(&self, signer: KeyId) -> Suspension<LookupReply>;
}
