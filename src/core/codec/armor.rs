use std::io::{self, BufRead, Read};
use std::sync::LazyLock;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use regex::Regex;

static PGP_MESSAGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)(-----BEGIN PGP MESSAGE-----.*?-----END PGP MESSAGE-----)")
        .expect("static regex is valid")
});

static PGP_SIGNED_MESSAGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)(-----BEGIN PGP SIGNED MESSAGE-----.*?-----END PGP SIGNATURE-----)")
        .expect("static regex is valid")
});

/// The label of an ASCII armor header line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArmorKind {
    Message,
    SignedMessage,
    Signature,
    PublicKeyBlock,
    PrivateKeyBlock,
    Other(String),
}

impl ArmorKind {
    /// Parse a `-----BEGIN PGP ...-----` line.
    pub fn from_header_line(line: &str) -> Option<Self> {
        let label = line
            .trim()
            .strip_prefix("-----BEGIN PGP ")?
            .strip_suffix("-----")?;

        Some(match label {
            "MESSAGE" => Self::Message,
            "SIGNED MESSAGE" => Self::SignedMessage,
            "SIGNATURE" => Self::Signature,
            "PUBLIC KEY BLOCK" => Self::PublicKeyBlock,
            "PRIVATE KEY BLOCK" => Self::PrivateKeyBlock,
            other => Self::Other(other.to_string()),
        })
    }
}

/// An armored block found inside free text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArmoredBlock {
    pub kind: ArmorKind,
    pub text: String,
}

/// Find the first PGP message (or, failing that, cleartext-signed message)
/// inside `text`.
///
/// Mail clients like to turn spaces into U+00A0, which breaks base64, so
/// those are replaced as well.
pub fn extract_armored_block(text: &str) -> Option<ArmoredBlock> {
    let (kind, found) = if let Some(m) = PGP_MESSAGE.captures(text) {
        (ArmorKind::Message, m.get(1)?)
    } else {
        let m = PGP_SIGNED_MESSAGE.captures(text)?;
        (ArmorKind::SignedMessage, m.get(1)?)
    };

    Some(ArmoredBlock {
        kind,
        text: found.as_str().replace('\u{a0}', " "),
    })
}

/// Whether `first_byte` (the first non-whitespace byte) starts an armored
/// stream rather than a binary packet.
pub fn looks_armored(first_byte: u8) -> bool {
    first_byte == b'-'
}

fn invalid(msg: &str) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, msg.to_string())
}

/// `Key: Value` armor header, e.g. `Version: GnuPG v2`.
fn is_armor_header(line: &str) -> bool {
    line.split_once(": ")
        .is_some_and(|(key, _)| !key.is_empty() && key.chars().all(|c| c.is_ascii_alphanumeric() || c == '-'))
}

/// Streaming ASCII-armor decoder.
///
/// Reads the header line and armor headers eagerly, then decodes the
/// base64 body line by line as the caller reads. The CRC24 checksum line
/// is not verified; the engine does that.
pub struct Dearmor<R> {
    reader: R,
    kind: ArmorKind,
    decoded: Vec<u8>,
    pos: usize,
    carry: String,
    finished: bool,
}

impl<R: BufRead> Dearmor<R> {
    pub fn new(mut reader: R) -> io::Result<Self> {
        let mut line = String::new();

        let kind = loop {
            line.clear();
            if reader.read_line(&mut line)? == 0 {
                return Err(invalid("no armor header line"));
            }
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            break ArmorKind::from_header_line(trimmed)
                .ok_or_else(|| invalid("malformed armor header line"))?;
        };

        let mut dearmor = Self {
            reader,
            kind,
            decoded: Vec::new(),
            pos: 0,
            carry: String::new(),
            finished: false,
        };

        if dearmor.kind == ArmorKind::SignedMessage {
            // Cleartext follows, not base64.
            dearmor.finished = true;
            return Ok(dearmor);
        }

        // Armor headers end at the first blank line. Some producers omit
        // it, in which case the first non-header line is already body.
        loop {
            line.clear();
            if dearmor.reader.read_line(&mut line)? == 0 {
                dearmor.finished = true;
                break;
            }
            let trimmed = line.trim();
            if trimmed.is_empty() {
                break;
            }
            if !is_armor_header(trimmed) {
                dearmor.push_body_line(trimmed)?;
                break;
            }
        }

        Ok(dearmor)
    }

    pub fn kind(&self) -> &ArmorKind {
        &self.kind
    }

    /// Feed one body line. Returns `false` once the body has ended.
    fn push_body_line(&mut self, line: &str) -> io::Result<bool> {
        if line.starts_with("-----END") || (line.starts_with('=') && line.len() <= 5) {
            self.flush_carry(true)?;
            self.finished = true;
            return Ok(false);
        }

        self.carry
            .extend(line.chars().filter(|c| !c.is_ascii_whitespace()));
        self.flush_carry(false)?;
        Ok(true)
    }

    fn flush_carry(&mut self, all: bool) -> io::Result<()> {
        let take = if all {
            self.carry.len()
        } else {
            self.carry.len() - self.carry.len() % 4
        };
        if take == 0 {
            return Ok(());
        }

        let chunk: String = self.carry.drain(..take).collect();
        let bytes = STANDARD
            .decode(chunk.as_bytes())
            .map_err(|e| invalid(&format!("bad base64 in armor: {e}")))?;

        if self.pos == self.decoded.len() {
            self.decoded.clear();
            self.pos = 0;
        }
        self.decoded.extend_from_slice(&bytes);
        Ok(())
    }

    fn fill(&mut self) -> io::Result<()> {
        let mut line = String::new();
        while self.pos == self.decoded.len() && !self.finished {
            line.clear();
            if self.reader.read_line(&mut line)? == 0 {
                self.flush_carry(true)?;
                self.finished = true;
                break;
            }
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            self.push_body_line(trimmed)?;
        }
        Ok(())
    }
}

impl<R: BufRead> Read for Dearmor<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.fill()?;
        let available = &self.decoded[self.pos..];
        let n = available.len().min(buf.len());
        buf[..n].copy_from_slice(&available[..n]);
        self.pos += n;
        Ok(n)
    }
}

#[cfg(test)]
pub(crate) fn armor_message(data: &[u8]) -> String {
    let encoded = STANDARD.encode(data);
    let mut out = String::from("-----BEGIN PGP MESSAGE-----\nComment: test vector\n\n");
    for chunk in encoded.as_bytes().chunks(64) {
        out.push_str(std::str::from_utf8(chunk).unwrap_or_default());
        out.push('\n');
    }
    out.push_str("-----END PGP MESSAGE-----\n");
    out
}
