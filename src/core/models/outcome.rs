use std::path::PathBuf;

use crate::core::errors::FailureReason;

use super::key_id::KeyId;

/// What the engine produced, before interpretation.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineOutput {
    Bytes(Vec<u8>),
    File(PathBuf),
}

/// The engine's verdict on a signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureVerdict {
    Good,
    /// Made by a key that is known locally, but does not verify (bad,
    /// expired or revoked).
    Bad,
    /// The signer's public key is not in the local keyring.
    MissingKey,
}

/// Raw signature report from the engine.
#[derive(Debug, Clone, PartialEq)]
pub struct SignatureReport {
    pub key_id: KeyId,
    pub user_id: Option<String>,
    pub verdict: SignatureVerdict,
}

/// Raw successful engine response.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineResponse {
    pub output: EngineOutput,
    pub signature: Option<SignatureReport>,
}

/// Decrypted data as shown to the caller.
#[derive(Debug, Clone, PartialEq)]
pub enum DecryptedOutput {
    Text(String),
    Bytes(Vec<u8>),
    File(PathBuf),
}

/// Caller-facing signature status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureStatus {
    Verified,
    SignerUnknown,
    Invalid,
}

/// Signature metadata extracted from a successful decryption.
#[derive(Debug, Clone, PartialEq)]
pub struct SignatureInfo {
    pub signer: KeyId,
    pub user_id: Option<String>,
    pub status: SignatureStatus,
}

impl SignatureInfo {
    pub fn verified(&self) -> bool {
        self.status == SignatureStatus::Verified
    }

    /// Name part of a `Name <email>` user ID.
    pub fn display_name(&self) -> Option<&str> {
        let uid = self.user_id.as_deref()?;
        let name = uid.split_once(" <").map_or(uid, |(name, _)| name).trim();
        (!name.is_empty()).then_some(name)
    }

    /// E-mail part of a `Name <email>` user ID.
    pub fn email(&self) -> Option<&str> {
        let uid = self.user_id.as_deref()?;
        let (_, rest) = uid.split_once('<')?;
        rest.strip_suffix('>').or(Some(rest)).map(str::trim)
    }
}

/// Verification status of a completed decryption.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationStatus {
    Unsigned,
    Verified,
    SignerUnknown,
    Invalid,
}

impl VerificationStatus {
    pub fn of(signature: Option<&SignatureInfo>) -> Self {
        match signature.map(|s| s.status) {
            None => Self::Unsigned,
            Some(SignatureStatus::Verified) => Self::Verified,
            Some(SignatureStatus::SignerUnknown) => Self::SignerUnknown,
            Some(SignatureStatus::Invalid) => Self::Invalid,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Unsigned => "unsigned",
            Self::Verified => "verified",
            Self::SignerUnknown => "signer_unknown",
            Self::Invalid => "invalid",
        }
    }
}

/// Interpreted result of one dispatch.
#[derive(Debug, Clone, PartialEq)]
pub enum DecryptionOutcome {
    Ok {
        output: DecryptedOutput,
        signature: Option<SignatureInfo>,
    },
    UnknownSigner {
        signer: KeyId,
    },
    Failed {
        reason: FailureReason,
        detail: Option<String>,
    },
}

/// What the caller receives when an attempt reaches `Done`.
#[derive(Debug, Clone, PartialEq)]
pub struct DecryptionReport {
    pub output: DecryptedOutput,
    pub signature: Option<SignatureInfo>,
    pub verification: VerificationStatus,
    pub dispatches: u32,
}

/// Terminal result of a successful attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum Completion {
    Decrypted(DecryptionReport),
    /// The lookup collaborator imported the signer's key. Nothing was
    /// retried; a fresh attempt will see the key.
    SignerKeyImported { signer: KeyId },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(uid: Option<&str>) -> SignatureInfo {
        SignatureInfo {
            signer: KeyId::new(0x1122_3344_5566_7788),
            user_id: uid.map(str::to_string),
            status: SignatureStatus::Verified,
        }
    }

    #[test]
    fn user_id_is_split_into_name_and_email() {
        let sig = info(Some("Alice Example <alice@example.org>"));
        assert_eq!(sig.display_name(), Some("Alice Example"));
        assert_eq!(sig.email(), Some("alice@example.org"));
    }

    #[test]
    fn user_id_without_email() {
        let sig = info(Some("Alice"));
        assert_eq!(sig.display_name(), Some("Alice"));
        assert_eq!(sig.email(), None);
        assert_eq!(info(None).display_name(), None);
    }

    #[test]
    fn verification_status_follows_signature() {
        assert_eq!(VerificationStatus::of(None), VerificationStatus::Unsigned);
        let mut sig = info(None);
        sig.status = SignatureStatus::Invalid;
        assert_eq!(VerificationStatus::of(Some(&sig)), VerificationStatus::Invalid);
        assert!(!sig.verified());
    }
}
