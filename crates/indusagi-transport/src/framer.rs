//! Newline framing of the agent's stdout
//!
//! The framer only guarantees line boundaries. It never looks at content, so
//! blank lines and invalid JSON are passed through for the caller to handle.

use bytes::BytesMut;

/// Splits an unbounded byte stream into complete lines
///
/// Holds a single pending buffer. A segment not yet terminated by `\n` is
/// retained until a later chunk completes it, or until [`LineFramer::finish`]
/// flushes it at end of stream.
#[derive(Debug, Default)]
pub struct LineFramer {
    buffer: BytesMut,
    // Bytes of `buffer` already known not to contain a newline.
    scanned: usize,
}

impl LineFramer {
    /// Create an empty framer
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk and return every line it completed
    ///
    /// Lines are returned without their terminator; a trailing `\r` is
    /// stripped as well. Splitting happens on bytes, so a UTF-8 sequence cut
    /// across two chunks is reassembled before decoding.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(chunk);

        let mut lines = Vec::new();
        while let Some(offset) = self.buffer[self.scanned..].iter().position(|b| *b == b'\n') {
            let end = self.scanned + offset;
            let line = self.buffer.split_to(end + 1);
            lines.push(decode(&line[..end]));
            self.scanned = 0;
        }
        self.scanned = self.buffer.len();

        lines
    }

    /// Flush the unterminated remainder at end of stream
    pub fn finish(&mut self) -> Option<String> {
        self.scanned = 0;
        if self.buffer.is_empty() {
            return None;
        }
        let rest = self.buffer.split();
        Some(decode(&rest))
    }

    /// Number of buffered bytes not yet emitted
    pub fn pending_len(&self) -> usize {
        self.buffer.len()
    }
}

fn decode(bytes: &[u8]) -> String {
    let bytes = bytes.strip_suffix(b"\r").unwrap_or(bytes);
    String::from_utf8_lossy(bytes).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_complete_lines() {
        let mut framer = LineFramer::new();
        let lines = framer.feed(b"{\"a\":1}\n{\"b\":2}\n");
        assert_eq!(lines, vec!["{\"a\":1}", "{\"b\":2}"]);
        assert_eq!(framer.pending_len(), 0);
    }

    #[test]
    fn test_partial_line_is_retained() {
        let mut framer = LineFramer::new();
        assert!(framer.feed(b"{\"type\":\"agent_").is_empty());
        assert_eq!(framer.pending_len(), 15);

        let lines = framer.feed(b"start\"}\n{\"id\"");
        assert_eq!(lines, vec!["{\"type\":\"agent_start\"}"]);
        assert_eq!(framer.finish().as_deref(), Some("{\"id\""));
        assert_eq!(framer.finish(), None);
    }

    #[test]
    fn test_blank_lines_pass_through() {
        let mut framer = LineFramer::new();
        assert_eq!(framer.feed(b"\n  \nx\n"), vec!["", "  ", "x"]);
    }

    #[test]
    fn test_crlf_stripped() {
        let mut framer = LineFramer::new();
        assert_eq!(framer.feed(b"one\r"), Vec::<String>::new());
        assert_eq!(framer.feed(b"\ntwo\r\n"), vec!["one", "two"]);
    }

    #[test]
    fn test_split_utf8_sequence() {
        let text = "héllo → wörld\n".as_bytes();
        let mut framer = LineFramer::new();
        let mut lines = Vec::new();
        for byte in text {
            lines.extend(framer.feed(std::slice::from_ref(byte)));
        }
        assert_eq!(lines, vec!["héllo → wörld"]);
    }

    #[test]
    fn test_finish_on_empty_stream() {
        let mut framer = LineFramer::new();
        assert_eq!(framer.finish(), None);
    }

    fn frame_all(input: &[u8], cuts: &[usize]) -> Vec<String> {
        let mut framer = LineFramer::new();
        let mut lines = Vec::new();
        let mut start = 0;
        for &cut in cuts {
            let cut = cut.min(input.len()).max(start);
            lines.extend(framer.feed(&input[start..cut]));
            start = cut;
        }
        lines.extend(framer.feed(&input[start..]));
        lines.extend(framer.finish());
        lines
    }

    proptest! {
        #[test]
        fn prop_chunk_boundaries_do_not_matter(
            lines in proptest::collection::vec("[^\n]{0,40}", 0..12),
            trailing_newline in any::<bool>(),
            mut cuts in proptest::collection::vec(0usize..600, 0..20),
        ) {
            let mut input = lines.join("\n");
            if trailing_newline {
                input.push('\n');
            }
            let input = input.into_bytes();
            cuts.sort_unstable();

            let whole = frame_all(&input, &[]);
            let chunked = frame_all(&input, &cuts);
            prop_assert_eq!(whole, chunked);
        }
    }
}
