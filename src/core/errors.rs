use std::path::PathBuf;

/// Reason codes surfaced to the initiating context when an attempt fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureReason {
    NoRecognizedEncryption,
    NoSecretKeyAvailable,
    NoKnownEncryptionFound,
    StorageUnavailable,
    NotFound,
    UserCancelled,
    NoInputSelected,
    BadPassphrase,
    EngineFailure,
}

impl FailureReason {
    /// Stable snake_case code, used in the audit log.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NoRecognizedEncryption => "no_recognized_encryption",
            Self::NoSecretKeyAvailable => "no_secret_key_available",
            Self::NoKnownEncryptionFound => "no_known_encryption_found",
            Self::StorageUnavailable => "storage_unavailable",
            Self::NotFound => "not_found",
            Self::UserCancelled => "user_cancelled",
            Self::NoInputSelected => "no_input_selected",
            Self::BadPassphrase => "bad_passphrase",
            Self::EngineFailure => "engine_failure",
        }
    }
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

/// Which suspension point the user walked away from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelledAt {
    Passphrase,
    OutputPath,
}

impl std::fmt::Display for CancelledAt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Passphrase => f.write_str("passphrase entry"),
            Self::OutputPath => f.write_str("output file selection"),
        }
    }
}

/// All domain errors for Unveil.
///
/// Each variant provides enough context to diagnose the issue
/// without needing a debugger.
#[derive(Debug, thiserror::Error)]
pub enum UnveilError {
    #[error(
        "No OpenPGP data recognized{}\n\n  \
         The input is neither an OpenPGP message nor a signed message.\n  \
         Check that you selected the right file or copied the whole block,\n  \
         including the -----BEGIN PGP MESSAGE----- line.",
        detail_suffix(.detail)
    )]
    NoRecognizedEncryption { detail: Option<String> },

    #[error(
        "Decryption failed: no matching secret key found{}\n\n  \
         The message is encrypted for keys that are not in your keyring.\n\n  \
         Solutions:\n    \
         → Import the secret key the message was encrypted to\n    \
         → Ask the sender to encrypt for one of your keys",
        detail_suffix(.detail)
    )]
    NoSecretKeyAvailable { detail: Option<String> },

    #[error(
        "No known encryption found\n\n  \
         The input is OpenPGP data but neither a public-key nor a\n  \
         passphrase-protected session key could be found."
    )]
    NoKnownEncryptionFound,

    #[error(
        "Storage not available: {path}\n\n  \
         The medium holding this file is not mounted or cannot be read.{}",
        detail_suffix(.detail)
    )]
    StorageUnavailable {
        path: PathBuf,
        detail: Option<String>,
    },

    #[error(
        "File not found: {path}\n\n  \
         Check that the path is correct and points to a regular file."
    )]
    NotFound { path: PathBuf },

    #[error("Cancelled during {at}")]
    UserCancelled { at: CancelledAt },

    #[error("No file selected")]
    NoInputSelected,

    #[error(
        "Bad passphrase{}\n\n  \
         The passphrase did not unlock the key or the message.\n  \
         Run the command again to retry.",
        detail_suffix(.detail)
    )]
    BadPassphrase { detail: Option<String> },

    #[error("Decryption engine failed: {detail}")]
    EngineFailure { detail: String },

    #[error("This decryption attempt already finished; start a new one")]
    AttemptFinished,

    #[error("Invalid configuration: {detail}")]
    InvalidConfig { detail: String },

    #[error("Audit log error: {detail}")]
    AuditError { detail: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

fn detail_suffix(detail: &Option<String>) -> String {
    match detail {
        Some(d) if !d.is_empty() => format!(": {d}"),
        _ => String::new(),
    }
}

impl UnveilError {
    /// Map this error onto the reason-code taxonomy.
    pub fn reason(&self) -> FailureReason {
        match self {
            Self::NoRecognizedEncryption { .. } => FailureReason::NoRecognizedEncryption,
            Self::NoSecretKeyAvailable { .. } => FailureReason::NoSecretKeyAvailable,
            Self::NoKnownEncryptionFound => FailureReason::NoKnownEncryptionFound,
            Self::StorageUnavailable { .. } => FailureReason::StorageUnavailable,
            Self::NotFound { .. } => FailureReason::NotFound,
            Self::UserCancelled { .. } => FailureReason::UserCancelled,
            Self::NoInputSelected => FailureReason::NoInputSelected,
            Self::BadPassphrase { .. } => FailureReason::BadPassphrase,
            Self::Io(_) => FailureReason::StorageUnavailable,
            Self::EngineFailure { .. }
            | Self::AttemptFinished
            | Self::InvalidConfig { .. }
            | Self::AuditError { .. } => FailureReason::EngineFailure,
        }
    }

    /// Collaborator-supplied detail, when there is one.
    pub fn detail(&self) -> Option<&str> {
        match self {
            Self::NoRecognizedEncryption { detail }
            | Self::NoSecretKeyAvailable { detail }
            | Self::StorageUnavailable { detail, .. }
            | Self::BadPassphrase { detail } => detail.as_deref(),
            Self::EngineFailure { detail } => Some(detail),
            _ => None,
        }
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, UnveilError>;
