//! Byte-stream to newline-delimited message framing.
//!
//! Buffers partial input until a newline is seen, then hands the
//! accumulated line to the caller for JSON-RPC parsing. Grounded on the
//! teacher's `transport::adapters::stdio` read loop, trimmed of its
//! pooled-buffer machinery — this crate only needs line framing, not a
//! buffer allocator.

use bytes::BytesMut;

/// Default cap on a single buffered line, guarding against an unbounded
/// peer that never sends a newline.
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 10 * 1024 * 1024;

/// Accumulates bytes from a stream and yields complete newline-terminated
/// lines, stripping the trailing `\n` (and a preceding `\r`, if present).
#[derive(Debug)]
pub struct ReadBuffer {
    buffer: BytesMut,
    max_message_size: usize,
}

impl Default for ReadBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_MESSAGE_SIZE)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReadBufferError {
    #[error("line exceeds maximum message size of {max} bytes")]
    MessageTooLarge { max: usize },
}

impl ReadBuffer {
    pub fn new(max_message_size: usize) -> Self {
        Self {
            buffer: BytesMut::new(),
            max_message_size,
        }
    }

    /// Feed newly-read bytes into the buffer.
    pub fn feed(&mut self, chunk: &[u8]) -> Result<(), ReadBufferError> {
        if self.buffer.len() + chunk.len() > self.max_message_size {
            return Err(ReadBufferError::MessageTooLarge {
                max: self.max_message_size,
            });
        }
        self.buffer.extend_from_slice(chunk);
        Ok(())
    }

    /// Pop the next complete line out of the buffer, if one is available.
    /// Returns `None` when no newline has been seen yet.
    pub fn pop_line(&mut self) -> Option<String> {
        let newline_pos = self.buffer.iter().position(|&b| b == b'\n')?;
        let mut line = self.buffer.split_to(newline_pos + 1);
        line.truncate(line.len() - 1); // drop '\n'
        if line.last() == Some(&b'\r') {
            line.truncate(line.len() - 1);
        }
        String::from_utf8(line.to_vec()).ok()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn buffers_partial_input_until_newline() {
        let mut buf = ReadBuffer::default();
        buf.feed(b"{\"jsonrpc\":\"2.0\",\"method\":\"ping\"").unwrap();
        assert_eq!(buf.pop_line(), None);
        buf.feed(b"}\n").unwrap();
        assert_eq!(
            buf.pop_line(),
            Some(r#"{"jsonrpc":"2.0","method":"ping"}"#.to_string())
        );
    }

    #[test]
    fn handles_multiple_lines_in_one_chunk() {
        let mut buf = ReadBuffer::default();
        buf.feed(b"line-one\nline-two\n").unwrap();
        assert_eq!(buf.pop_line(), Some("line-one".to_string()));
        assert_eq!(buf.pop_line(), Some("line-two".to_string()));
        assert_eq!(buf.pop_line(), None);
    }

    #[test]
    fn strips_trailing_carriage_return() {
        let mut buf = ReadBuffer::default();
        buf.feed(b"line\r\n").unwrap();
        assert_eq!(buf.pop_line(), Some("line".to_string()));
    }

    #[test]
    fn rejects_oversized_line() {
        let mut buf = ReadBuffer::new(4);
        let err = buf.feed(b"12345").unwrap_err();
        assert_eq!(err, ReadBufferError::MessageTooLarge { max: 4 });
    }
}
