use unveil::core::errors::Result;
use unveil::core::models::credential::CredentialTarget;
use unveil::core::models::probe_result::{MalformedReason, ProbeResult};
use unveil::core::services::key_probe::KeyProbe;
use unveil::core::services::payload_source::PayloadSource;

use super::crypto_helpers;
use crate::cli::{InputArgs, context, output};

/// Execute the `unveil probe` command.
///
/// Classifies the payload header against the local keyring and prints
/// what a decryption would need. Nothing is decrypted.
pub fn execute(input: &InputArgs) -> Result<()> {
    let config = context::load_config()?;
    let payload = crypto_helpers::payload_from(input)?;
    let mut source = PayloadSource::new(payload);
    let stream = source.open()?;

    let probe = KeyProbe::new(crypto_helpers::keyring_for(&config)?);
    let result = probe.classify(stream)?;

    output::header(&format!("unveil probe: {}", source.describe()));
    println!("{result}");

    match result.credential_target() {
        Some(CredentialTarget::SecretKey(key_id)) => {
            let label = crypto_helpers::file_keyring(&config)
                .and_then(|keyring| keyring.label_for(key_id));
            match label {
                Some(label) => output::detail(&format!("Needs the passphrase of {key_id} ({label})")),
                None => output::detail(&format!("Needs the passphrase of {key_id}")),
            }
        }
        Some(CredentialTarget::Symmetric) => output::detail("Needs the message passphrase"),
        None => match result {
            ProbeResult::SignedOnly => output::detail("No credential needed"),
            ProbeResult::Malformed(MalformedReason::Unrecognized) => {
                output::warning("Input does not look like an OpenPGP message")
            }
            _ => output::warning("No encryption layer this tool can open"),
        },
    }

    Ok(())
}
