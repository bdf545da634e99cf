use std::fs::File;
use std::io;
use std::sync::Arc;

use sha2::{Digest, Sha256};

use unveil::adapters::keyrings::file_keyring::FileKeyring;
use unveil::adapters::keyrings::gpg_keyring::GpgKeyring;
use unveil::config::app_config::{AppConfig, KeyringKind};
use unveil::core::errors::{Result, UnveilError};
use unveil::core::models::payload::{ContentStream, Payload};
use unveil::core::traits::keyring::SecretKeyring;

use crate::cli::InputArgs;

/// Build the payload selected on the command line.
pub fn payload_from(input: &InputArgs) -> Result<Payload> {
    if let Some(file) = &input.file {
        return Ok(Payload::file(file));
    }
    if let Some(text) = &input.text {
        return Ok(Payload::from_text(text));
    }
    if input.stdin {
        return Ok(Payload::stream(ContentStream::new("stdin", io::stdin())));
    }
    Err(UnveilError::NoInputSelected)
}

/// The secret keyring configured for this machine.
pub fn keyring_for(config: &AppConfig) -> Result<Arc<dyn SecretKeyring>> {
    match config.unveil.keyring {
        KeyringKind::Gpg => Ok(Arc::new(GpgKeyring::new(config.gpg_path()))),
        KeyringKind::File => Ok(Arc::new(FileKeyring::new(file_keyring_path(config)?))),
    }
}

/// The file keyring, when one is configured. Used to label key IDs.
pub fn file_keyring(config: &AppConfig) -> Option<FileKeyring> {
    match config.unveil.keyring {
        KeyringKind::File => file_keyring_path(config).ok().map(FileKeyring::new),
        KeyringKind::Gpg => None,
    }
}

fn file_keyring_path(config: &AppConfig) -> Result<std::path::PathBuf> {
    config
        .unveil
        .keyring_file
        .clone()
        .ok_or_else(|| UnveilError::InvalidConfig {
            detail: "keyring = \"file\" requires keyring_file".into(),
        })
}

/// SHA-256 of the input, for the audit log.
///
/// Streams are consumed by the attempt and are not hashed.
pub fn input_sha256(payload: &Payload) -> Option<String> {
    let mut hasher = Sha256::new();
    match payload {
        Payload::Bytes(data) => hasher.update(data),
        Payload::FilePath(path) => {
            let mut file = File::open(path).ok()?;
            io::copy(&mut file, &mut hasher).ok()?;
        }
        Payload::ContentStream(_) => return None,
    }
    Some(format!("{:x}", hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(file: Option<&str>, text: Option<&str>, stdin: bool) -> InputArgs {
        InputArgs {
            file: file.map(str::to_string),
            text: text.map(str::to_string),
            stdin,
        }
    }

    #[test]
    fn no_input_is_an_error() {
        let err = payload_from(&args(None, None, false)).unwrap_err();
        assert!(matches!(err, UnveilError::NoInputSelected));
    }

    #[test]
    fn file_input_is_a_path_payload() {
        let payload = payload_from(&args(Some("mail.asc"), None, false)).unwrap();
        assert!(matches!(payload, Payload::FilePath(ref p) if p.ends_with("mail.asc")));
    }

    #[test]
    fn bytes_are_hashed() {
        let hash = input_sha256(&Payload::bytes(b"abc".to_vec())).unwrap();
        assert_eq!(
            hash,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn streams_are_not_hashed() {
        let payload = Payload::stream(ContentStream::new("pipe", io::empty()));
        assert!(input_sha256(&payload).is_none());
    }
}
