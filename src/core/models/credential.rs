use std::fmt;

use secrecy::{ExposeSecret, SecretString};

use super::key_id::KeyId;

/// What a passphrase unlocks: a secret key, or a symmetric session key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CredentialTarget {
    SecretKey(KeyId),
    Symmetric,
}

impl fmt::Display for CredentialTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SecretKey(id) => write!(f, "secret key {id}"),
            Self::Symmetric => f.write_str("symmetric encryption"),
        }
    }
}

/// Where a credential came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialOrigin {
    Cached,
    UserSupplied,
}

/// Passphrase material for one target.
///
/// The engine takes credentials by value, so each dispatch consumes its
/// own copy.
pub struct Credential {
    target: CredentialTarget,
    origin: CredentialOrigin,
    passphrase: SecretString,
}

impl Credential {
    pub fn new(target: CredentialTarget, origin: CredentialOrigin, passphrase: SecretString) -> Self {
        Self {
            target,
            origin,
            passphrase,
        }
    }

    pub fn cached(target: CredentialTarget, passphrase: SecretString) -> Self {
        Self::new(target, CredentialOrigin::Cached, passphrase)
    }

    pub fn user_supplied(target: CredentialTarget, passphrase: SecretString) -> Self {
        Self::new(target, CredentialOrigin::UserSupplied, passphrase)
    }

    pub fn target(&self) -> CredentialTarget {
        self.target
    }

    pub fn origin(&self) -> CredentialOrigin {
        self.origin
    }

    pub fn passphrase(&self) -> &SecretString {
        &self.passphrase
    }
}

impl Clone for Credential {
    fn clone(&self) -> Self {
        Self {
            target: self.target,
            origin: self.origin,
            passphrase: SecretString::from(self.passphrase.expose_secret().to_owned()),
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("target", &self.target)
            .field("origin", &self.origin)
            .field("passphrase", &"[REDACTED]")
            .finish()
    }
}
