//! Line framing for the device output stream
//!
//! The firmware prints newline-terminated text with no other framing. Reads
//! arrive in arbitrary pieces, so bytes are buffered until a `\n` shows up.
//! Each complete line is decoded as UTF-8 and trimmed; blank lines and lines
//! that fail to decode are dropped.

use bytes::{Buf, BytesMut};
use tokio_util::codec::Decoder;

/// Line terminator emitted by the device
pub const LINE_TERMINATOR: u8 = b'\n';

/// Default cap on a single buffered line
pub const DEFAULT_MAX_LINE_LENGTH: usize = 4096;

/// Streaming decoder turning raw chunks into trimmed text lines
#[derive(Debug)]
pub struct LineFramer {
    buffer: BytesMut,
    max_line_length: usize,
    /// Set while skipping the remainder of an over-long line
    discarding: bool,
    dropped: u64,
}

impl Default for LineFramer {
    fn default() -> Self {
        Self::new()
    }
}

impl LineFramer {
    /// Create a framer with the default line cap
    pub fn new() -> Self {
        Self::with_max_line_length(DEFAULT_MAX_LINE_LENGTH)
    }

    /// Create a framer that drops lines longer than `max_line_length` bytes
    pub fn with_max_line_length(max_line_length: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(256),
            max_line_length: max_line_length.max(1),
            discarding: false,
            dropped: 0,
        }
    }

    /// Feed a chunk and collect every line it completes
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        let mut buffer = std::mem::take(&mut self.buffer);
        buffer.extend_from_slice(chunk);
        let mut lines = Vec::new();
        while let Ok(Some(line)) = self.decode(&mut buffer) {
            lines.push(line);
        }
        self.buffer = buffer;
        lines
    }

    /// Discard any unterminated fragment
    pub fn clear(&mut self) {
        if !self.buffer.is_empty() {
            tracing::debug!(bytes = self.buffer.len(), "discarding partial line");
        }
        self.buffer.clear();
        self.discarding = false;
    }

    /// Bytes buffered towards the next line
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Lines dropped so far because they were not valid UTF-8 or too long
    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}

impl Decoder for LineFramer {
    type Item = String;
    type Error = std::io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            let Some(pos) = src.iter().position(|&b| b == LINE_TERMINATOR) else {
                if src.len() > self.max_line_length {
                    if !self.discarding {
                        tracing::warn!(
                            limit = self.max_line_length,
                            "line exceeds limit, skipping to next terminator"
                        );
                        self.discarding = true;
                        self.dropped += 1;
                    }
                    src.clear();
                }
                return Ok(None);
            };

            let raw = src.split_to(pos);
            src.advance(1);

            if std::mem::take(&mut self.discarding) {
                continue;
            }
            if raw.len() > self.max_line_length {
                tracing::warn!(limit = self.max_line_length, "dropping over-long line");
                self.dropped += 1;
                continue;
            }

            match std::str::from_utf8(&raw) {
                Ok(text) => {
                    let text = text.trim();
                    if !text.is_empty() {
                        return Ok(Some(text.to_string()));
                    }
                }
                Err(_) => {
                    tracing::debug!(fragment = %hex::encode(&raw), "dropping undecodable line");
                    self.dropped += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_partial_reads_are_reassembled() {
        let mut framer = LineFramer::new();
        assert!(framer.push(b"Public key: (7").is_empty());
        assert!(framer.push(b", 33)").is_empty());
        assert_eq!(framer.push(b"\r\nPriv"), vec!["Public key: (7, 33)"]);
        assert_eq!(framer.buffered(), 4);
    }

    #[test]
    fn test_many_lines_in_one_chunk() {
        let mut framer = LineFramer::new();
        let lines = framer.push(b"Original: hi\nEncrypted: 104 105\n  \nDecrypted: ok\n");
        assert_eq!(lines, vec!["Original: hi", "Encrypted: 104 105", "Decrypted: ok"]);
    }

    #[test]
    fn test_invalid_utf8_drops_only_that_line() {
        let mut framer = LineFramer::new();
        let lines = framer.push(b"Original: \xff\xfe\nOriginal: ok\n");
        assert_eq!(lines, vec!["Original: ok"]);
        assert_eq!(framer.dropped(), 1);
    }

    #[test]
    fn test_utf8_split_across_chunks() {
        let mut framer = LineFramer::new();
        let text = "Decrypted: héllo\n".as_bytes();
        let (a, b) = text.split_at(13);
        assert!(framer.push(a).is_empty());
        assert_eq!(framer.push(b), vec!["Decrypted: héllo"]);
    }

    #[test]
    fn test_clear_discards_fragment() {
        let mut framer = LineFramer::new();
        framer.push(b"Original: half");
        framer.clear();
        assert_eq!(framer.push(b"Encrypted: 1\n"), vec!["Encrypted: 1"]);
    }

    #[test]
    fn test_overlong_line_is_skipped() {
        let mut framer = LineFramer::with_max_line_length(8);
        assert!(framer.push(b"0123456789").is_empty());
        assert!(framer.push(b"abc\n").is_empty());
        assert_eq!(framer.push(b"short\n"), vec!["short"]);
        assert_eq!(framer.dropped(), 1);
    }

    #[test]
    fn test_overlong_line_counted_once() {
        let mut framer = LineFramer::with_max_line_length(8);
        assert!(framer.push(b"0123456789").is_empty());
        assert!(framer.push(b"abcdefghijk").is_empty());
        assert!(framer.push(b"lmnopqrstuv").is_empty());
        assert_eq!(framer.dropped(), 1);
        assert_eq!(framer.push(b"xyz\nshort\n"), vec!["short"]);
        assert_eq!(framer.dropped(), 1);
    }

    #[test]
    fn test_decoder_consumes_one_line_at_a_time() {
        let mut framer = LineFramer::new();
        let mut src = BytesMut::from(&b"Original: a\nEncrypted: 9\nDecr"[..]);
        assert_eq!(framer.decode(&mut src).unwrap().as_deref(), Some("Original: a"));
        assert_eq!(&src[..], b"Encrypted: 9\nDecr");
        assert_eq!(framer.decode(&mut src).unwrap().as_deref(), Some("Encrypted: 9"));
        assert_eq!(framer.decode(&mut src).unwrap(), None);
        assert_eq!(&src[..], b"Decr");
    }

    proptest! {
        #[test]
        fn prop_one_line_per_terminator(
            segments in prop::collection::vec("[a-zA-Z0-9:]([a-zA-Z0-9: ]{0,30}[a-zA-Z0-9:])?", 0..20),
            split in 1usize..16,
        ) {
            let mut stream = Vec::new();
            for segment in &segments {
                stream.extend_from_slice(b"  ");
                stream.extend_from_slice(segment.as_bytes());
                stream.extend_from_slice(b" \r\n");
            }

            let mut framer = LineFramer::new();
            let mut lines = Vec::new();
            for chunk in stream.chunks(split) {
                lines.extend(framer.push(chunk));
            }

            prop_assert_eq!(lines, segments);
            prop_assert_eq!(framer.buffered(), 0);
        }
    }
}
