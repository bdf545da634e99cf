use std::fmt;

use super::credential::CredentialTarget;
use super::key_id::KeyId;

/// Why a payload could not be classified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MalformedReason {
    /// Not OpenPGP data at all.
    Unrecognized,
    /// OpenPGP data, but no asymmetric or symmetric encryption layer.
    NoKnownEncryption,
}

/// Classification of a payload header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeResult {
    SignedOnly,
    AsymmetricRequiresKey(KeyId),
    Symmetric,
    Malformed(MalformedReason),
}

impl ProbeResult {
    /// The credential this classification asks for, if any.
    ///
    /// The `NONE` key id has no secret key to unlock and falls back to a
    /// symmetric passphrase.
    pub fn credential_target(&self) -> Option<CredentialTarget> {
        match self {
            Self::AsymmetricRequiresKey(id) if id.is_none() => Some(CredentialTarget::Symmetric),
            Self::AsymmetricRequiresKey(id) => Some(CredentialTarget::SecretKey(*id)),
            Self::Symmetric => Some(CredentialTarget::Symmetric),
            Self::SignedOnly | Self::Malformed(_) => None,
        }
    }

    pub fn is_signed_only(&self) -> bool {
        matches!(self, Self::SignedOnly)
    }
}

impl fmt::Display for ProbeResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SignedOnly => f.write_str("signed only"),
            Self::AsymmetricRequiresKey(id) => write!(f, "encrypted to secret key {id}"),
            Self::Symmetric => f.write_str("passphrase encrypted"),
            Self::Malformed(MalformedReason::Unrecognized) => f.write_str("not OpenPGP data"),
            Self::Malformed(MalformedReason::NoKnownEncryption) => {
                f.write_str("OpenPGP data without known encryption")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn none_key_id_asks_for_symmetric_passphrase() {
        let probe = ProbeResult::AsymmetricRequiresKey(KeyId::NONE);
        assert_eq!(probe.credential_target(), Some(CredentialTarget::Symmetric));
    }

    #[test]
    fn signed_only_needs_no_credential() {
        assert_eq!(ProbeResult::SignedOnly.credential_target(), None);
        assert!(ProbeResult::SignedOnly.is_signed_only());
    }

    #[test]
    fn asymmetric_targets_the_key() {
        let id = KeyId::new(42);
        assert_eq!(
            ProbeResult::AsymmetricRequiresKey(id).credential_target(),
            Some(CredentialTarget::SecretKey(id))
        );
    }
}
