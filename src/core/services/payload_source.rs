use std::fs::File;
use std::io::{self, Cursor, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::core::errors::{Result, UnveilError};
use crate::core::models::payload::{ContentStream, Payload, PayloadKind};
use crate::core::models::request::DispatchInput;

/// Bytes of decoded packet data the probe may rewind over.
pub const PROBE_LOOKAHEAD: usize = 200;

/// A reader that remembers what it has handed out so it can go back to
/// the start.
///
/// With a limit, recording stops (and rewinding becomes impossible) once
/// more than `limit` bytes have been read, like a mark with a read limit.
/// Without a limit every consumed byte is kept, which is what one-shot
/// streams need to splice their prefix back later.
pub struct ProbeStream<R> {
    inner: R,
    recorded: Vec<u8>,
    pos: usize,
    limit: Option<usize>,
    overflowed: bool,
}

impl<R: Read> ProbeStream<R> {
    pub fn bounded(inner: R, limit: usize) -> Self {
        Self {
            inner,
            recorded: Vec::new(),
            pos: 0,
            limit: Some(limit),
            overflowed: false,
        }
    }

    pub fn unbounded(inner: R) -> Self {
        Self {
            inner,
            recorded: Vec::new(),
            pos: 0,
            limit: None,
            overflowed: false,
        }
    }

    /// Go back to the first byte.
    pub fn rewind(&mut self) -> io::Result<()> {
        if self.overflowed {
            return Err(io::Error::other(format!(
                "cannot rewind past the {}-byte look-ahead",
                self.limit.unwrap_or_default()
            )));
        }
        self.pos = 0;
        Ok(())
    }

    /// Put everything consumed so far back in front of the unread rest.
    pub fn into_spliced(self) -> io::Result<io::Chain<Cursor<Vec<u8>>, R>> {
        if self.overflowed {
            return Err(io::Error::other("consumed prefix was not retained"));
        }
        Ok(Cursor::new(self.recorded).chain(self.inner))
    }
}

impl<R> std::fmt::Debug for ProbeStream<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProbeStream")
            .field("recorded", &self.recorded.len())
            .field("pos", &self.pos)
            .field("limit", &self.limit)
            .field("overflowed", &self.overflowed)
            .finish_non_exhaustive()
    }
}

impl<R: Read> Read for ProbeStream<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.pos < self.recorded.len() {
            let available = &self.recorded[self.pos..];
            let n = available.len().min(buf.len());
            buf[..n].copy_from_slice(&available[..n]);
            self.pos += n;
            return Ok(n);
        }

        let n = self.inner.read(buf)?;
        if !self.overflowed {
            if self
                .limit
                .is_some_and(|limit| self.recorded.len() + n > limit)
            {
                self.overflowed = true;
                self.recorded = Vec::new();
                self.pos = 0;
            } else {
                self.recorded.extend_from_slice(&buf[..n]);
                self.pos = self.recorded.len();
            }
        }
        Ok(n)
    }
}

/// Raw payload stream as handed to the probe.
pub type PayloadStream = ProbeStream<Box<dyn Read + Send>>;

/// Turns any supported payload into readable streams, as many times as
/// the attempt needs them.
pub struct PayloadSource {
    payload: Payload,
    stream_taken: bool,
    spooled: Option<Arc<[u8]>>,
}

impl PayloadSource {
    pub fn new(payload: Payload) -> Self {
        Self {
            payload,
            stream_taken: false,
            spooled: None,
        }
    }

    pub fn kind(&self) -> PayloadKind {
        self.payload.kind()
    }

    pub fn describe(&self) -> String {
        self.payload.describe()
    }

    /// Input file path, for file payloads.
    pub fn input_path(&self) -> Option<&Path> {
        match &self.payload {
            Payload::FilePath(path) => Some(path),
            _ => None,
        }
    }

    /// A fresh payload with the same content, for a follow-up attempt.
    ///
    /// A content stream can be replayed only once it has been spooled.
    pub fn replay(&self) -> Option<Payload> {
        match &self.payload {
            Payload::Bytes(data) => Some(Payload::Bytes(data.clone())),
            Payload::FilePath(path) => Some(Payload::FilePath(path.clone())),
            Payload::ContentStream(stream) => {
                let data = self.spooled.clone()?;
                Some(Payload::stream(ContentStream::new(
                    stream.label.clone(),
                    Cursor::new(data),
                )))
            }
        }
    }

    /// Open a stream positioned at the first byte of the payload.
    pub fn open(&mut self) -> Result<PayloadStream> {
        if let Some(spooled) = &self.spooled {
            return Ok(ProbeStream::bounded(Box::new(Cursor::new(spooled.clone())), 0));
        }

        match &mut self.payload {
            Payload::Bytes(data) => Ok(ProbeStream::bounded(Box::new(Cursor::new(data.clone())), 0)),
            Payload::FilePath(path) => {
                let file = open_file(path)?;
                Ok(ProbeStream::bounded(Box::new(io::BufReader::new(file)), 0))
            }
            Payload::ContentStream(stream) => {
                if self.stream_taken {
                    return Err(UnveilError::StorageUnavailable {
                        path: PathBuf::from(&stream.label),
                        detail: Some("content stream can only be read once".into()),
                    });
                }
                self.stream_taken = true;
                let reader = std::mem::replace(&mut stream.reader, Box::new(io::empty()));
                Ok(ProbeStream::unbounded(reader))
            }
        }
    }

    /// Finish with a probed stream and return an input the engine can
    /// read from the start, as often as needed.
    ///
    /// Content streams are spliced back together and spooled in memory.
    pub fn settle(&mut self, stream: PayloadStream) -> Result<DispatchInput> {
        if let Some(spooled) = &self.spooled {
            return Ok(DispatchInput::Bytes(spooled.clone()));
        }

        match &self.payload {
            Payload::Bytes(data) => Ok(DispatchInput::Bytes(data.clone())),
            Payload::FilePath(path) => Ok(DispatchInput::File(path.clone())),
            Payload::ContentStream(content) => {
                let label = content.label.clone();
                let unavailable = |e: io::Error| UnveilError::StorageUnavailable {
                    path: PathBuf::from(&label),
                    detail: Some(e.to_string()),
                };

                let mut spliced = stream.into_spliced().map_err(unavailable)?;
                let mut data = Vec::new();
                spliced.read_to_end(&mut data).map_err(unavailable)?;

                let data: Arc<[u8]> = Arc::from(data);
                self.spooled = Some(data.clone());
                Ok(DispatchInput::Bytes(data))
            }
        }
    }
}

/// Open an input file, telling a missing file apart from missing storage.
fn open_file(path: &Path) -> Result<File> {
    if path.as_os_str().is_empty() {
        return Err(UnveilError::NoInputSelected);
    }

    match std::fs::metadata(path) {
        Ok(meta) if meta.is_file() => {}
        Ok(_) => {
            return Err(UnveilError::NotFound {
                path: path.to_path_buf(),
            });
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(if storage_present(path) {
                UnveilError::NotFound {
                    path: path.to_path_buf(),
                }
            } else {
                UnveilError::StorageUnavailable {
                    path: path.to_path_buf(),
                    detail: Some("parent directory does not exist".into()),
                }
            });
        }
        Err(e) => {
            return Err(UnveilError::StorageUnavailable {
                path: path.to_path_buf(),
                detail: Some(e.to_string()),
            });
        }
    }

    File::open(path).map_err(|e| UnveilError::StorageUnavailable {
        path: path.to_path_buf(),
        detail: Some(e.to_string()),
    })
}

/// Whether the directory that should hold `path` is reachable.
fn storage_present(path: &Path) -> bool {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.is_dir(),
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::errors::FailureReason;

    #[test]
    fn bounded_stream_rewinds_within_limit() {
        let mut stream = ProbeStream::bounded(Cursor::new(b"abcdefgh".to_vec()), 4);
        let mut buf = [0u8; 3];
        stream.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"abc");

        stream.rewind().unwrap();
        let mut all = Vec::new();
        stream.read_to_end(&mut all).unwrap();
        assert_eq!(all, b"abcdefgh");
    }

    #[test]
    fn bounded_stream_refuses_rewind_past_limit() {
        let mut stream = ProbeStream::bounded(Cursor::new(vec![0u8; 300]), PROBE_LOOKAHEAD);
        let mut buf = vec![0u8; 250];
        stream.read_exact(&mut buf).unwrap();
        assert!(stream.rewind().is_err());
    }

    #[test]
    fn unbounded_stream_splices_prefix_back() {
        let mut stream = ProbeStream::unbounded(Cursor::new(b"header+body".to_vec()));
        let mut buf = [0u8; 6];
        stream.read_exact(&mut buf).unwrap();

        let mut spliced = stream.into_spliced().unwrap();
        let mut all = String::new();
        spliced.read_to_string(&mut all).unwrap();
        assert_eq!(all, "header+body");
    }

    #[test]
    fn bytes_payload_opens_repeatedly() {
        let mut source = PayloadSource::new(Payload::bytes(b"data".to_vec()));
        for _ in 0..2 {
            let mut out = Vec::new();
            source.open().unwrap().read_to_end(&mut out).unwrap();
            assert_eq!(out, b"data");
        }
    }

    #[test]
    fn missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let mut source = PayloadSource::new(Payload::file(dir.path().join("absent.gpg")));
        let err = source.open().unwrap_err();
        assert_eq!(err.reason(), FailureReason::NotFound);
    }

    #[test]
    fn missing_parent_is_storage_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("unmounted").join("card").join("msg.gpg");
        let err = PayloadSource::new(Payload::file(path)).open().unwrap_err();
        assert_eq!(err.reason(), FailureReason::StorageUnavailable);
    }

    #[test]
    fn directory_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = PayloadSource::new(Payload::file(dir.path())).open().unwrap_err();
        assert_eq!(err.reason(), FailureReason::NotFound);
    }

    #[test]
    fn empty_path_is_no_input() {
        let err = PayloadSource::new(Payload::file("")).open().unwrap_err();
        assert_eq!(err.reason(), FailureReason::NoInputSelected);
    }

    #[test]
    fn content_stream_is_spooled_after_settle() {
        let stream = ContentStream::new("stdin", Cursor::new(b"0123456789".to_vec()));
        let mut source = PayloadSource::new(Payload::stream(stream));

        let mut opened = source.open().unwrap();
        let mut head = [0u8; 4];
        opened.read_exact(&mut head).unwrap();

        let input = source.settle(opened).unwrap();
        let DispatchInput::Bytes(data) = input else {
            panic!("expected spooled bytes");
        };
        assert_eq!(&*data, b"0123456789");

        // Reopening now serves the spool.
        let mut again = Vec::new();
        source.open().unwrap().read_to_end(&mut again).unwrap();
        assert_eq!(again, b"0123456789");
    }

    #[test]
    fn content_stream_cannot_be_opened_twice_before_settle() {
        let stream = ContentStream::new("pipe", io::empty());
        let mut source = PayloadSource::new(Payload::stream(stream));
        let _first = source.open().unwrap();
        let err = source.open().unwrap_err();
        assert_eq!(err.reason(), FailureReason::StorageUnavailable);
    }

    #[test]
    fn file_payload_settles_to_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("msg.asc");
        std::fs::write(&path, b"x").unwrap();

        let mut source = PayloadSource::new(Payload::file(&path));
        let stream = source.open().unwrap();
        let input = source.settle(stream).unwrap();
        assert_eq!(input.file_path(), Some(path.as_path()));
    }

    #[test]
    fn spooled_stream_replays_as_the_same_stream() {
        let stream = ContentStream::new("stdin", Cursor::new(b"packets".to_vec()));
        let mut source = PayloadSource::new(Payload::stream(stream));
        assert!(source.replay().is_none());

        let opened = source.open().unwrap();
        source.settle(opened).unwrap();

        let replayed = source.replay().unwrap();
        assert_eq!(replayed.kind(), PayloadKind::ContentStream);
        assert_eq!(replayed.describe(), "stdin");

        let mut again = PayloadSource::new(replayed);
        let mut out = Vec::new();
        again.open().unwrap().read_to_end(&mut out).unwrap();
        assert_eq!(out, b"packets");
    }
}
