//! Incremental decoder for `text/event-stream` frames.
//!
//! The push stream is a sequence of records separated by a blank line.
//! Each record holds one or more `data: <payload>` lines. Bytes arrive in
//! arbitrary chunks, so the decoder buffers until a full record is available
//! and only then decodes it as UTF-8. A multi-byte character or a record that
//! straddles two chunks therefore decodes exactly as if it had arrived in one.

use bytes::BytesMut;

use crate::{Error, Result};

/// Default buffer size for a fresh decoder.
const DEFAULT_BUFFER_SIZE: usize = 8192;

/// Maximum record length to prevent memory exhaustion.
pub const MAX_FRAME_LENGTH: usize = 1024 * 1024; // 1 MiB

/// Record delimiter once carriage returns have been removed.
const DELIMITER: &[u8] = b"\n\n";

/// Field prefix carrying the event payload.
const DATA_PREFIX: &str = "data:";

/// Buffers stream bytes and yields `data:` payloads in arrival order.
#[derive(Debug)]
pub struct FrameDecoder {
    buffer: BytesMut,
    /// Bytes of `buffer` already searched for a delimiter.
    scanned: usize,
    /// Length of an oversized record not yet reported to the caller.
    overflow: Option<usize>,
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameDecoder {
    /// Creates an empty decoder.
    #[must_use]
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::with_capacity(DEFAULT_BUFFER_SIZE),
            scanned: 0,
            overflow: None,
        }
    }

    /// Feeds a chunk and returns every payload completed by it.
    ///
    /// Carriage returns are dropped on ingestion so `\r\n\r\n` delimited
    /// streams decode like `\n\n` delimited ones. Empty `data:` lines are
    /// skipped.
    ///
    /// Payloads completed before an oversized record are always returned.
    /// The overflow is then reported by the next call to `decode` or
    /// [`finish`](Self::finish), so the output does not depend on where the
    /// chunk boundaries fall.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Protocol`] if a record grows past [`MAX_FRAME_LENGTH`].
    /// The buffer is cleared in that case and `chunk` is not consumed.
    pub fn decode(&mut self, chunk: &[u8]) -> Result<Vec<String>> {
        self.finish()?;

        self.buffer.reserve(chunk.len());
        self.buffer
            .extend(chunk.iter().copied().filter(|&b| b != b'\r'));

        let mut payloads = Vec::new();
        while let Some(pos) = self.find_delimiter() {
            if pos > MAX_FRAME_LENGTH {
                return self.overflowed(pos, payloads);
            }
            let record = self.buffer.split_to(pos + DELIMITER.len());
            self.scanned = 0;
            extract_payloads(&record[..pos], &mut payloads);
        }

        if self.buffer.len() > MAX_FRAME_LENGTH {
            let len = self.buffer.len();
            return self.overflowed(len, payloads);
        }

        Ok(payloads)
    }

    /// Reports an overflow held back by an earlier [`decode`](Self::decode).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Protocol`] if a record grew past [`MAX_FRAME_LENGTH`]
    /// after the payloads preceding it were returned.
    pub fn finish(&mut self) -> Result<()> {
        match self.overflow.take() {
            Some(len) => Err(frame_too_long(len)),
            None => Ok(()),
        }
    }

    fn overflowed(&mut self, len: usize, payloads: Vec<String>) -> Result<Vec<String>> {
        self.reset();
        if payloads.is_empty() {
            return Err(frame_too_long(len));
        }
        self.overflow = Some(len);
        Ok(payloads)
    }

    /// Number of buffered bytes belonging to an incomplete record.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    /// Discards any partially received record.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.scanned = 0;
    }

    /// Finds the next delimiter, resuming where the previous search stopped.
    fn find_delimiter(&mut self) -> Option<usize> {
        // Step back one byte: the delimiter may straddle the old boundary.
        let start = self.scanned.saturating_sub(DELIMITER.len() - 1);
        let found = self.buffer[start..]
            .windows(DELIMITER.len())
            .position(|w| w == DELIMITER)
            .map(|pos| start + pos);
        if found.is_none() {
            self.scanned = self.buffer.len();
        }
        found
    }
}

/// Decodes a complete record and collects its non-empty `data:` lines.
fn extract_payloads(record: &[u8], out: &mut Vec<String>) {
    let text = String::from_utf8_lossy(record);
    for line in text.split('\n') {
        if let Some(rest) = line.strip_prefix(DATA_PREFIX) {
            let data = rest.trim();
            if !data.is_empty() {
                out.push(data.to_string());
            }
        }
    }
}

fn frame_too_long(len: usize) -> Error {
    Error::Protocol(format!(
        "frame too long: {len} bytes (max {MAX_FRAME_LENGTH})"
    ))
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::needless_collect,
    clippy::similar_names
)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn decode_all(chunks: &[&[u8]]) -> Vec<String> {
        let mut decoder = FrameDecoder::new();
        chunks
            .iter()
            .flat_map(|c| decoder.decode(c).unwrap())
            .collect()
    }

    #[test]
    fn test_single_frame() {
        let out = decode_all(&[b"data: {\"type\":\"Sent\"}\n\n"]);
        assert_eq!(out, vec!["{\"type\":\"Sent\"}".to_string()]);
    }

    #[test]
    fn test_partial_frame_is_buffered() {
        let mut decoder = FrameDecoder::new();
        assert!(decoder.decode(b"data: {\"a\"").unwrap().is_empty());
        assert!(decoder.pending() > 0);
        let out = decoder.decode(b":1}\n\n").unwrap();
        assert_eq!(out, vec!["{\"a\":1}".to_string()]);
        assert_eq!(decoder.pending(), 0);
    }

    #[test]
    fn test_delimiter_split_across_chunks() {
        let out = decode_all(&[b"data: one\n", b"\ndata: two\n\n"]);
        assert_eq!(out, vec!["one".to_string(), "two".to_string()]);
    }

    #[test]
    fn test_crlf_delimiters() {
        let out = decode_all(&[b"data: one\r\n\r", b"\ndata: two\r\n\r\n"]);
        assert_eq!(out, vec!["one".to_string(), "two".to_string()]);
    }

    #[test]
    fn test_multiple_data_lines_in_one_record() {
        let out = decode_all(&[b"event: mail\ndata: a\ndata:b\nid: 7\n\n"]);
        assert_eq!(out, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_empty_data_and_comments_skipped() {
        let out = decode_all(&[b":keepalive\n\ndata:\n\ndata:   \n\n"]);
        assert!(out.is_empty());
    }

    #[test]
    fn test_utf8_split_inside_character() {
        let bytes = "data: café\n\n".as_bytes();
        // 'é' is two bytes; cut between them.
        let cut = bytes.iter().position(|&b| b == 0xC3).unwrap() + 1;
        let out = decode_all(&[&bytes[..cut], &bytes[cut..]]);
        assert_eq!(out, vec!["café".to_string()]);
    }

    #[test]
    fn test_payloads_before_oversized_record_survive() {
        let mut stream = b"data: a\n\n".to_vec();
        stream.extend(vec![b'x'; MAX_FRAME_LENGTH + 1]);
        stream.extend(b"\n\n");

        let mut whole = FrameDecoder::new();
        assert_eq!(whole.decode(&stream).unwrap(), vec!["a".to_string()]);
        assert!(whole.finish().unwrap_err().to_string().contains("frame too long"));
        assert!(whole.finish().is_ok());

        let mut split = FrameDecoder::new();
        assert_eq!(split.decode(&stream[..9]).unwrap(), vec!["a".to_string()]);
        assert!(split.decode(&stream[9..]).is_err());
        assert_eq!(split.pending(), 0);
    }

    #[test]
    fn test_held_back_overflow_reported_by_next_decode() {
        let mut stream = b"data: a\n\n".to_vec();
        stream.extend(vec![b'x'; MAX_FRAME_LENGTH + 1]);

        let mut decoder = FrameDecoder::new();
        assert_eq!(decoder.decode(&stream).unwrap(), vec!["a".to_string()]);
        assert!(decoder.decode(b"data: b\n\n").is_err());
        assert_eq!(decoder.decode(b"data: c\n\n").unwrap(), vec!["c".to_string()]);
    }

    #[test]
    fn test_frame_length_limit() {
        let mut decoder = FrameDecoder::new();
        let long = vec![b'a'; MAX_FRAME_LENGTH + 10];
        let result = decoder.decode(&long);
        assert!(result.unwrap_err().to_string().contains("frame too long"));
        assert_eq!(decoder.pending(), 0);
    }

    fn frame_strategy() -> impl Strategy<Value = String> {
        "[a-zA-Z0-9 {}\":,@.é]{0,40}".prop_map(|s| format!("data: {s}\n\n"))
    }

    proptest! {
        #[test]
        fn prop_chunk_boundaries_do_not_matter(
            frames in proptest::collection::vec(frame_strategy(), 0..8),
            cuts in proptest::collection::vec(any::<prop::sample::Index>(), 0..12),
        ) {
            let stream: Vec<u8> = frames.concat().into_bytes();

            let mut whole = FrameDecoder::new();
            let expected = whole.decode(&stream).unwrap();

            let mut points: Vec<usize> = cuts.iter().map(|i| i.index(stream.len() + 1)).collect();
            points.sort_unstable();
            points.dedup();

            let mut chunked = FrameDecoder::new();
            let mut actual = Vec::new();
            let mut last = 0;
            for p in points.into_iter().chain(std::iter::once(stream.len())) {
                actual.extend(chunked.decode(&stream[last..p]).unwrap());
                last = p;
            }

            prop_assert_eq!(actual, expected);
        }
    }
}
