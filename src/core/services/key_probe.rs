use std::io::{self, BufRead, BufReader, Read};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::core::codec::armor::{self, ArmorKind, Dearmor};
use crate::core::codec::packet::{self, PacketHeader, tag};
use crate::core::errors::{Result, UnveilError};
use crate::core::models::key_id::KeyId;
use crate::core::models::probe_result::{MalformedReason, ProbeResult};
use crate::core::services::payload_source::{PROBE_LOOKAHEAD, ProbeStream};
use crate::core::traits::keyring::SecretKeyring;

/// Enough of a PKESK body to read a v3 key ID or a v6 fingerprint.
const PKESK_PREFIX: usize = 64;

/// What the asymmetric pass found at the start of the packet stream.
enum AsymmetricScan {
    Signed,
    Recipients {
        recipients: Vec<KeyId>,
        has_skesk: bool,
    },
    /// The first packet is not a public-key session key.
    NotAsymmetric,
}

/// Classifies a payload by reading its leading packet headers.
pub struct KeyProbe {
    keyring: Arc<dyn SecretKeyring>,
}

impl KeyProbe {
    pub fn new(keyring: Arc<dyn SecretKeyring>) -> Self {
        Self { keyring }
    }

    /// Decide what the payload needs before it can be decrypted.
    ///
    /// Parse failures become `Malformed`; only a public-key container with
    /// no usable recipient and keyring/I/O problems are errors.
    pub fn classify<R: Read>(&self, stream: R) -> Result<ProbeResult> {
        let mut input = BufReader::new(stream);

        let Some(first) = peek_first_byte(&mut input)? else {
            debug!("empty payload");
            return Ok(ProbeResult::Malformed(MalformedReason::Unrecognized));
        };

        if armor::looks_armored(first) {
            let dearmored = match Dearmor::new(&mut input) {
                Ok(d) => d,
                Err(e) => return parse_failure(e),
            };
            return match dearmored.kind().clone() {
                ArmorKind::SignedMessage => Ok(ProbeResult::SignedOnly),
                ArmorKind::Message => self.classify_packets(dearmored),
                other => {
                    debug!(?other, "armor block is not a message");
                    Ok(ProbeResult::Malformed(MalformedReason::Unrecognized))
                }
            };
        }

        if first & 0x80 == 0 {
            return Ok(ProbeResult::Malformed(MalformedReason::Unrecognized));
        }

        self.classify_packets(input)
    }

    fn classify_packets<R: Read>(&self, packets: R) -> Result<ProbeResult> {
        let mut packets = ProbeStream::bounded(packets, PROBE_LOOKAHEAD);

        let scan = match scan_asymmetric(&mut packets) {
            Ok(scan) => scan,
            Err(e) => return parse_failure(e),
        };

        match scan {
            AsymmetricScan::Signed => Ok(ProbeResult::SignedOnly),
            AsymmetricScan::Recipients {
                recipients,
                has_skesk,
            } => self.pick_recipient(&recipients, has_skesk),
            AsymmetricScan::NotAsymmetric => {
                debug!("not a public-key container, trying symmetric headers");
                if let Err(e) = packets.rewind() {
                    warn!("cannot rewind for symmetric probe: {e}");
                    return Ok(ProbeResult::Malformed(MalformedReason::Unrecognized));
                }
                match scan_symmetric(&mut packets) {
                    Ok(true) => Ok(ProbeResult::Symmetric),
                    Ok(false) => Ok(ProbeResult::Malformed(MalformedReason::NoKnownEncryption)),
                    Err(e) => parse_failure(e),
                }
            }
        }
    }

    fn pick_recipient(&self, recipients: &[KeyId], has_skesk: bool) -> Result<ProbeResult> {
        let local = self.keyring.secret_key_ids()?;

        if let Some(id) = recipients
            .iter()
            .find(|id| !id.is_none() && local.contains(id))
        {
            debug!(key = %id, "recipient key found in local keyring");
            return Ok(ProbeResult::AsymmetricRequiresKey(*id));
        }

        if recipients.iter().any(KeyId::is_none) {
            debug!("anonymous recipient, falling back to passphrase");
            return Ok(ProbeResult::Symmetric);
        }

        if has_skesk {
            debug!("no local recipient key, using the passphrase alternative");
            return Ok(ProbeResult::Symmetric);
        }

        let names: Vec<String> = recipients.iter().map(KeyId::to_string).collect();
        Err(UnveilError::NoSecretKeyAvailable {
            detail: Some(format!("encrypted for {}", names.join(", "))),
        })
    }
}

/// Skip leading whitespace and return the next byte without consuming it.
fn peek_first_byte<R: BufRead>(input: &mut R) -> Result<Option<u8>> {
    loop {
        let buf = input.fill_buf()?;
        if buf.is_empty() {
            return Ok(None);
        }
        match buf.iter().position(|b| !b.is_ascii_whitespace()) {
            Some(pos) => {
                let byte = buf[pos];
                input.consume(pos);
                return Ok(Some(byte));
            }
            None => {
                let len = buf.len();
                input.consume(len);
            }
        }
    }
}

/// Truncated or garbled framing means "not OpenPGP"; anything else is a
/// real read failure.
fn parse_failure(e: io::Error) -> Result<ProbeResult> {
    match e.kind() {
        io::ErrorKind::InvalidData | io::ErrorKind::UnexpectedEof => {
            debug!("payload framing not understood: {e}");
            Ok(ProbeResult::Malformed(MalformedReason::Unrecognized))
        }
        _ => Err(UnveilError::Io(e)),
    }
}

/// Next header that is not a marker or padding packet.
fn next_meaningful<R: Read>(reader: &mut R) -> io::Result<Option<PacketHeader>> {
    while let Some(header) = packet::read_header(reader)? {
        if header.is_filler() {
            packet::skip_body(reader, header.definite_len()?)?;
            continue;
        }
        return Ok(Some(header));
    }
    Ok(None)
}

fn scan_asymmetric<R: Read>(reader: &mut R) -> io::Result<AsymmetricScan> {
    let Some(first) = next_meaningful(reader)? else {
        return Ok(AsymmetricScan::NotAsymmetric);
    };

    if first.starts_signed_message() {
        return Ok(AsymmetricScan::Signed);
    }
    if first.tag != tag::PKESK {
        return Ok(AsymmetricScan::NotAsymmetric);
    }

    let mut recipients = Vec::new();
    let mut has_skesk = false;
    let mut current = Some(first);

    while let Some(header) = current {
        match header.tag {
            tag::PKESK => {
                let body = packet::read_body_prefix(reader, header.definite_len()?, PKESK_PREFIX)?;
                recipients.push(packet::pkesk_recipient(&body)?);
            }
            tag::SKESK => {
                has_skesk = true;
                packet::skip_body(reader, header.definite_len()?)?;
            }
            _ if header.is_filler() => packet::skip_body(reader, header.definite_len()?)?,
            _ => break,
        }
        current = packet::read_header(reader)?;
    }

    Ok(AsymmetricScan::Recipients {
        recipients,
        has_skesk,
    })
}

/// Whether the stream opens with a passphrase-encrypted layer.
fn scan_symmetric<R: Read>(reader: &mut R) -> io::Result<bool> {
    Ok(match next_meaningful(reader)? {
        Some(header) if header.tag == tag::SKESK => true,
        // Old-style encrypted data with no session key packet at all.
        Some(header) if header.is_encrypted_data() => true,
        _ => false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::codec::armor::armor_message;
    use crate::core::codec::packet::build;
    use crate::core::errors::FailureReason;

    struct FixedKeyring(Vec<KeyId>);

    impl SecretKeyring for FixedKeyring {
        fn secret_key_ids(&self) -> Result<Vec<KeyId>> {
            Ok(self.0.clone())
        }
    }

    const LOCAL: u64 = 0xAAAA_BBBB_CCCC_DDDD;
    const FOREIGN: u64 = 0x1111_2222_3333_4444;

    fn probe() -> KeyProbe {
        KeyProbe::new(Arc::new(FixedKeyring(vec![KeyId::new(LOCAL)])))
    }

    fn concat(parts: &[Vec<u8>]) -> Vec<u8> {
        parts.concat()
    }

    #[test]
    fn armored_message_for_local_key() {
        let data = concat(&[build::pkesk_v3(LOCAL), build::seipd()]);
        let armored = armor_message(&data);
        let result = probe().classify(armored.as_bytes()).unwrap();
        assert_eq!(result, ProbeResult::AsymmetricRequiresKey(KeyId::new(LOCAL)));
    }

    #[test]
    fn second_recipient_may_be_the_local_one() {
        let data = concat(&[build::pkesk_v3(FOREIGN), build::pkesk_v3(LOCAL), build::seipd()]);
        let result = probe().classify(data.as_slice()).unwrap();
        assert_eq!(result, ProbeResult::AsymmetricRequiresKey(KeyId::new(LOCAL)));
    }

    #[test]
    fn foreign_recipient_without_alternative_has_no_key() {
        let data = concat(&[build::pkesk_v3(FOREIGN), build::seipd()]);
        let err = probe().classify(data.as_slice()).unwrap_err();
        assert_eq!(err.reason(), FailureReason::NoSecretKeyAvailable);
        assert!(err.detail().unwrap().contains("1111222233334444"));
    }

    #[test]
    fn foreign_recipient_with_passphrase_alternative() {
        let data = concat(&[build::pkesk_v3(FOREIGN), build::skesk(), build::seipd()]);
        assert_eq!(probe().classify(data.as_slice()).unwrap(), ProbeResult::Symmetric);
    }

    #[test]
    fn anonymous_recipient_asks_for_passphrase() {
        let data = concat(&[
            build::packet(tag::PKESK, &[6, 0, 1, 2, 3]),
            build::seipd(),
        ]);
        assert_eq!(probe().classify(data.as_slice()).unwrap(), ProbeResult::Symmetric);
    }

    #[test]
    fn symmetric_message_found_after_fallback() {
        let data = concat(&[build::marker(), build::skesk(), build::seipd()]);
        let armored = armor_message(&data);
        assert_eq!(probe().classify(armored.as_bytes()).unwrap(), ProbeResult::Symmetric);
    }

    #[test]
    fn bare_encrypted_data_is_symmetric() {
        let data = build::seipd();
        assert_eq!(probe().classify(data.as_slice()).unwrap(), ProbeResult::Symmetric);
    }

    #[test]
    fn one_pass_signed_is_signed_only() {
        let data = concat(&[build::one_pass_signature(FOREIGN), build::literal("hi")]);
        assert_eq!(probe().classify(data.as_slice()).unwrap(), ProbeResult::SignedOnly);
    }

    #[test]
    fn cleartext_signature_is_signed_only() {
        let text = "\n\n-----BEGIN PGP SIGNED MESSAGE-----\nHash: SHA256\n\nhello\n";
        assert_eq!(probe().classify(text.as_bytes()).unwrap(), ProbeResult::SignedOnly);
    }

    #[test]
    fn literal_only_has_no_known_encryption() {
        let data = build::literal("plain");
        assert_eq!(
            probe().classify(data.as_slice()).unwrap(),
            ProbeResult::Malformed(MalformedReason::NoKnownEncryption)
        );
    }

    #[test]
    fn text_and_key_blocks_are_unrecognized() {
        let unrecognized = ProbeResult::Malformed(MalformedReason::Unrecognized);
        assert_eq!(probe().classify(&b"hello world"[..]).unwrap(), unrecognized);
        assert_eq!(probe().classify(&b""[..]).unwrap(), unrecognized);

        let key_block = "-----BEGIN PGP PUBLIC KEY BLOCK-----\n\nAQID\n-----END PGP PUBLIC KEY BLOCK-----\n";
        assert_eq!(probe().classify(key_block.as_bytes()).unwrap(), unrecognized);
    }

    #[test]
    fn truncated_packet_is_unrecognized() {
        let mut data = build::pkesk_v3(LOCAL);
        data.truncate(5);
        assert_eq!(
            probe().classify(data.as_slice()).unwrap(),
            ProbeResult::Malformed(MalformedReason::Unrecognized)
        );
    }
}
