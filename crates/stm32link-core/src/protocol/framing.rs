//! Line framing
//!
//! Reassembles the raw inbound byte stream into text lines. Chunk boundaries
//! are arbitrary; a line may arrive over any number of reads.

/// One decoded, trimmed, non-empty inbound line
pub type Frame = String;

const LINE_TERMINATOR: u8 = b'\n';

/// Buffers input and emits a frame for every `\n`-terminated line.
///
/// Bytes that are not valid UTF-8 are dropped. Surrounding whitespace
/// (including a `\r` before the terminator) is trimmed, and lines that are
/// empty after trimming are discarded.
#[derive(Debug, Default)]
pub struct FrameSplitter {
    partial: Vec<u8>,
}

impl FrameSplitter {
    pub fn new() -> Self {
        Self {
            partial: Vec::with_capacity(256),
        }
    }

    /// Append a chunk and return every line it completes, oldest first
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<Frame> {
        self.partial.extend_from_slice(bytes);

        let mut frames = Vec::new();
        let mut start = 0;
        while let Some(pos) = self.partial[start..]
            .iter()
            .position(|&b| b == LINE_TERMINATOR)
        {
            let end = start + pos;
            if let Some(frame) = decode_line(&self.partial[start..end]) {
                frames.push(frame);
            }
            start = end + 1;
        }
        self.partial.drain(..start);

        frames
    }

    /// Surface whatever is left as a final frame and clear the buffer.
    ///
    /// Used once at end of stream for trailing data that never saw a terminator.
    pub fn flush(&mut self) -> Option<Frame> {
        if self.partial.is_empty() {
            return None;
        }
        let frame = decode_line(&self.partial);
        self.partial.clear();
        frame
    }

    /// Number of bytes waiting for a terminator
    pub fn pending_len(&self) -> usize {
        self.partial.len()
    }
}

/// Decode permissively and trim; `None` when nothing remains
fn decode_line(bytes: &[u8]) -> Option<Frame> {
    let mut text = String::with_capacity(bytes.len());
    for chunk in bytes.utf8_chunks() {
        text.push_str(chunk.valid());
    }
    let trimmed = text.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_lines_simple() {
        let mut splitter = FrameSplitter::new();
        let frames = splitter.feed(b"LINE1\nLINE2\n");
        assert_eq!(frames, vec!["LINE1", "LINE2"]);
        assert_eq!(splitter.pending_len(), 0);
        assert_eq!(splitter.flush(), None);
    }

    #[test]
    fn test_trailing_partial_is_flushed() {
        let mut splitter = FrameSplitter::new();
        let frames = splitter.feed(b"LINE1\nLINE2");
        assert_eq!(frames, vec!["LINE1"]);
        assert_eq!(splitter.pending_len(), 5);
        assert_eq!(splitter.flush(), Some("LINE2".to_string()));
        assert_eq!(splitter.pending_len(), 0);
        assert_eq!(splitter.flush(), None);
    }

    #[test]
    fn test_blank_lines_discarded() {
        let mut splitter = FrameSplitter::new();
        assert!(splitter.feed(b"\n\n").is_empty());
        assert!(splitter.feed(b"   \r\n\t\n").is_empty());
        assert_eq!(splitter.pending_len(), 0);
    }

    #[test]
    fn test_line_split_across_chunks() {
        let mut splitter = FrameSplitter::new();
        assert!(splitter.feed(b"V=3.").is_empty());
        assert!(splitter.feed(b"30").is_empty());
        assert_eq!(splitter.feed(b"\nI=0"), vec!["V=3.30"]);
        assert_eq!(splitter.feed(b".5\n"), vec!["I=0.5"]);
    }

    #[test]
    fn test_one_byte_at_a_time() {
        let mut splitter = FrameSplitter::new();
        let mut frames = Vec::new();
        for b in b"ab\ncd\n" {
            frames.extend(splitter.feed(std::slice::from_ref(b)));
        }
        assert_eq!(frames, vec!["ab", "cd"]);
    }

    #[test]
    fn test_crlf_and_padding_trimmed() {
        let mut splitter = FrameSplitter::new();
        assert_eq!(splitter.feed(b"  OK \r\n"), vec!["OK"]);
    }

    #[test]
    fn test_invalid_utf8_dropped() {
        let mut splitter = FrameSplitter::new();
        assert_eq!(splitter.feed(b"T\xffE\xc3ST\n"), vec!["TEST"]);
        assert!(splitter.feed(b"\xfe\xff\n").is_empty());
    }

    #[test]
    fn test_flush_of_whitespace_only_remainder() {
        let mut splitter = FrameSplitter::new();
        assert!(splitter.feed(b" \r").is_empty());
        assert_eq!(splitter.flush(), None);
        assert_eq!(splitter.pending_len(), 0);
    }
}
