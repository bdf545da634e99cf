use std::fmt;
use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;

use crate::core::codec::armor;

/// Discriminator for the three supported inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadKind {
    Bytes,
    FilePath,
    ContentStream,
}

/// Where the decrypted result goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecryptTarget {
    /// Returned in memory, shown as a message.
    Message,
    /// Written to an explicit output path.
    File,
    /// Returned in memory for a content stream caller.
    Stream,
}

impl PayloadKind {
    /// The target implied by the input kind.
    pub fn target(&self) -> DecryptTarget {
        match self {
            Self::Bytes => DecryptTarget::Message,
            Self::FilePath => DecryptTarget::File,
            Self::ContentStream => DecryptTarget::Stream,
        }
    }
}

/// A one-shot reader handed over by the caller (stdin, a pipe, a socket).
pub struct ContentStream {
    pub label: String,
    pub reader: Box<dyn Read + Send>,
}

impl ContentStream {
    pub fn new(label: impl Into<String>, reader: impl Read + Send + 'static) -> Self {
        Self {
            label: label.into(),
            reader: Box::new(reader),
        }
    }
}

impl fmt::Debug for ContentStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContentStream")
            .field("label", &self.label)
            .finish_non_exhaustive()
    }
}

/// The encrypted or signed input of one decryption attempt.
#[derive(Debug)]
pub enum Payload {
    Bytes(Arc<[u8]>),
    FilePath(PathBuf),
    ContentStream(ContentStream),
}

impl Payload {
    pub fn bytes(data: impl Into<Vec<u8>>) -> Self {
        Self::Bytes(Arc::from(data.into()))
    }

    /// Build a payload from a pasted or shared text message.
    ///
    /// Only the armored block is kept when the text contains one, and
    /// non-breaking spaces are turned into plain spaces.
    pub fn from_text(text: &str) -> Self {
        let normalized = match armor::extract_armored_block(text) {
            Some(block) => block.text,
            None => text.to_string(),
        };
        Self::bytes(normalized.into_bytes())
    }

    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self::FilePath(path.into())
    }

    pub fn stream(stream: ContentStream) -> Self {
        Self::ContentStream(stream)
    }

    pub fn kind(&self) -> PayloadKind {
        match self {
            Self::Bytes(_) => PayloadKind::Bytes,
            Self::FilePath(_) => PayloadKind::FilePath,
            Self::ContentStream(_) => PayloadKind::ContentStream,
        }
    }

    /// Short human-readable description for logs and the audit trail.
    pub fn describe(&self) -> String {
        match self {
            Self::Bytes(data) => format!("message ({} bytes)", data.len()),
            Self::FilePath(path) => path.display().to_string(),
            Self::ContentStream(stream) => stream.label.clone(),
        }
    }
}
