use std::io::{self, Read};

use crate::core::models::key_id::KeyId;

/// OpenPGP packet tags this crate cares about.
pub mod tag {
    pub const PKESK: u8 = 1;
    pub const SIGNATURE: u8 = 2;
    pub const SKESK: u8 = 3;
    pub const ONE_PASS_SIGNATURE: u8 = 4;
    pub const COMPRESSED: u8 = 8;
    pub const SED: u8 = 9;
    pub const MARKER: u8 = 10;
    pub const LITERAL: u8 = 11;
    pub const SEIPD: u8 = 18;
    pub const AEAD: u8 = 20;
    pub const PADDING: u8 = 21;
}

/// Body length encoding of a packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyLength {
    Definite(u64),
    /// First chunk of a partial-length body.
    Partial(u64),
    /// Old-format "until end of input".
    Indeterminate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketHeader {
    pub tag: u8,
    pub length: BodyLength,
}

impl PacketHeader {
    /// Packets that carry no meaning for classification.
    pub fn is_filler(&self) -> bool {
        matches!(self.tag, tag::MARKER | tag::PADDING)
    }

    pub fn is_encrypted_data(&self) -> bool {
        matches!(self.tag, tag::SED | tag::SEIPD | tag::AEAD)
    }

    /// Packets that start an unencrypted (possibly signed) message.
    pub fn starts_signed_message(&self) -> bool {
        matches!(
            self.tag,
            tag::ONE_PASS_SIGNATURE | tag::SIGNATURE | tag::COMPRESSED
        )
    }

    /// The definite body length, for packets we need to skip or read.
    pub fn definite_len(&self) -> io::Result<u64> {
        match self.length {
            BodyLength::Definite(len) => Ok(len),
            _ => Err(invalid(&format!(
                "packet with tag {} has no definite length",
                self.tag
            ))),
        }
    }
}

fn invalid(msg: &str) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, msg.to_string())
}

fn read_u8<R: Read>(reader: &mut R) -> io::Result<u8> {
    let mut byte = [0u8; 1];
    reader.read_exact(&mut byte)?;
    Ok(byte[0])
}

fn read_be<R: Read>(reader: &mut R, width: usize) -> io::Result<u64> {
    let mut value = 0u64;
    for _ in 0..width {
        value = (value << 8) | u64::from(read_u8(reader)?);
    }
    Ok(value)
}

/// Read the next packet header, or `None` at a clean end of input.
pub fn read_header<R: Read>(reader: &mut R) -> io::Result<Option<PacketHeader>> {
    let mut first = [0u8; 1];
    if reader.read(&mut first)? == 0 {
        return Ok(None);
    }
    let ctb = first[0];

    if ctb & 0x80 == 0 {
        return Err(invalid(&format!("byte 0x{ctb:02X} is not a packet tag")));
    }

    if ctb & 0x40 != 0 {
        let tag = ctb & 0x3F;
        let length = match read_u8(reader)? {
            len @ 0..=191 => BodyLength::Definite(u64::from(len)),
            o1 @ 192..=223 => {
                let o2 = read_u8(reader)?;
                BodyLength::Definite(((u64::from(o1) - 192) << 8) + u64::from(o2) + 192)
            }
            255 => BodyLength::Definite(read_be(reader, 4)?),
            o1 => BodyLength::Partial(1 << (o1 & 0x1F)),
        };
        Ok(Some(PacketHeader { tag, length }))
    } else {
        let tag = (ctb >> 2) & 0x0F;
        let length = match ctb & 0x03 {
            0 => BodyLength::Definite(read_be(reader, 1)?),
            1 => BodyLength::Definite(read_be(reader, 2)?),
            2 => BodyLength::Definite(read_be(reader, 4)?),
            _ => BodyLength::Indeterminate,
        };
        Ok(Some(PacketHeader { tag, length }))
    }
}

/// Discard `len` body bytes.
pub fn skip_body<R: Read>(reader: &mut R, len: u64) -> io::Result<()> {
    let copied = io::copy(&mut reader.take(len), &mut io::sink())?;
    if copied < len {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "packet body truncated",
        ));
    }
    Ok(())
}

/// Read a body of at most `max` bytes, skipping whatever is left over.
pub fn read_body_prefix<R: Read>(reader: &mut R, len: u64, max: usize) -> io::Result<Vec<u8>> {
    let keep = len.min(max as u64);
    let mut body = vec![0u8; keep as usize];
    reader.read_exact(&mut body)?;
    skip_body(reader, len - keep)?;
    Ok(body)
}

/// Recipient key ID named by a public-key encrypted session key packet.
///
/// Supports v3 packets (explicit key ID) and v6 packets (fingerprint,
/// or anonymous when the fingerprint is omitted).
pub fn pkesk_recipient(body: &[u8]) -> io::Result<KeyId> {
    let truncated = || invalid("truncated PKESK packet");

    match body.first().copied() {
        Some(3) => {
            let id: [u8; 8] = body.get(1..9).ok_or_else(truncated)?.try_into().map_err(|_| truncated())?;
            Ok(KeyId::from_be_bytes(id))
        }
        Some(6) => {
            let count = usize::from(*body.get(1).ok_or_else(truncated)?);
            if count == 0 {
                return Ok(KeyId::NONE);
            }
            let key_version = *body.get(2).ok_or_else(truncated)?;
            let fpr = body.get(3..2 + count).ok_or_else(truncated)?;
            let id = match key_version {
                4 => KeyId::from_v4_fingerprint(fpr),
                6 => KeyId::from_v6_fingerprint(fpr),
                v => return Err(invalid(&format!("unsupported key version {v} in PKESK"))),
            };
            id.ok_or_else(truncated)
        }
        Some(v) => Err(invalid(&format!("unsupported PKESK version {v}"))),
        None => Err(truncated()),
    }
}

/// Test helpers that build minimal packet streams.
#[cfg(test)]
pub(crate) mod build {
    use super::tag;

    /// New-format packet with a one-octet length.
    pub fn packet(tag: u8, body: &[u8]) -> Vec<u8> {
        assert!(body.len() < 192);
        let mut out = vec![0xC0 | tag, body.len() as u8];
        out.extend_from_slice(body);
        out
    }

    pub fn pkesk_v3(key_id: u64) -> Vec<u8> {
        let mut body = vec![3];
        body.extend_from_slice(&key_id.to_be_bytes());
        body.push(1);
        body.extend_from_slice(&[0x00, 0x08, 0xAB]);
        packet(tag::PKESK, &body)
    }

    pub fn skesk() -> Vec<u8> {
        packet(tag::SKESK, &[4, 9, 3, 8, 1, 2, 3, 4, 5, 6, 7, 8, 0x60])
    }

    pub fn seipd() -> Vec<u8> {
        packet(tag::SEIPD, &[1, 0xDE, 0xAD, 0xBE, 0xEF])
    }

    pub fn one_pass_signature(key_id: u64) -> Vec<u8> {
        let mut body = vec![3, 0, 8, 1];
        body.extend_from_slice(&key_id.to_be_bytes());
        body.push(1);
        packet(tag::ONE_PASS_SIGNATURE, &body)
    }

    pub fn literal(text: &str) -> Vec<u8> {
        let mut body = vec![b'b', 0, 0, 0, 0, 0];
        body.extend_from_slice(text.as_bytes());
        packet(tag::LITERAL, &body)
    }

    pub fn marker() -> Vec<u8> {
        packet(tag::MARKER, b"PGP")
    }
}
