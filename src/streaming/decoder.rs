//! Incremental byte-to-line decoding for streaming responses
//!
//! Network reads end wherever the transport decides, so a read may stop in
//! the middle of a UTF-8 sequence or in the middle of a line. Two small
//! stateful pieces handle that:
//! - `Utf8Decoder` carries an incomplete trailing sequence into the next read
//! - `LineBuffer` carries an incomplete trailing line into the next read
//!
//! `LineReader` chains them: bytes in, complete lines out.

use crate::errors::{ChatError, Result};

/// Maximum size of a pending partial line (1MB)
pub const MAX_LINE_SIZE: usize = 1_048_576;

/// Stateful UTF-8 decoder
///
/// Invalid sequences decode to U+FFFD, like `String::from_utf8_lossy`,
/// but a sequence cut off at the end of the input is held back instead.
#[derive(Debug, Default)]
pub struct Utf8Decoder {
    /// At most 3 bytes of an incomplete trailing sequence
    pending: Vec<u8>,
}

impl Utf8Decoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode the next chunk of bytes
    pub fn decode(&mut self, bytes: &[u8]) -> String {
        let joined;
        let mut input: &[u8] = if self.pending.is_empty() {
            bytes
        } else {
            let mut buf = std::mem::take(&mut self.pending);
            buf.extend_from_slice(bytes);
            joined = buf;
            &joined
        };

        let mut out = String::with_capacity(input.len());
        loop {
            match std::str::from_utf8(input) {
                Ok(valid) => {
                    out.push_str(valid);
                    break;
                }
                Err(e) => {
                    let (valid, rest) = input.split_at(e.valid_up_to());
                    out.push_str(std::str::from_utf8(valid).unwrap_or_default());
                    match e.error_len() {
                        Some(bad) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            input = &rest[bad..];
                        }
                        None => {
                            self.pending.extend_from_slice(rest);
                            break;
                        }
                    }
                }
            }
        }
        out
    }

    /// Flush at end of stream; a dangling partial sequence becomes U+FFFD
    pub fn finish(&mut self) -> String {
        if self.pending.is_empty() {
            String::new()
        } else {
            self.pending.clear();
            char::REPLACEMENT_CHARACTER.to_string()
        }
    }

    /// Bytes currently held back
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}

/// Buffered line splitter that keeps the trailing partial line
#[derive(Debug)]
pub struct LineBuffer {
    buffer: String,
    max_line_size: usize,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::with_capacity(MAX_LINE_SIZE)
    }

    pub fn with_capacity(max_line_size: usize) -> Self {
        Self {
            buffer: String::with_capacity(4096),
            max_line_size,
        }
    }

    /// Append decoded text and return every line it completes
    ///
    /// Lines are returned without their `\n` (and without a `\r` before it).
    pub fn push(&mut self, text: &str) -> Result<Vec<String>> {
        self.buffer.push_str(text);

        let mut lines = Vec::new();
        let mut consumed = 0;
        while let Some(offset) = self.buffer[consumed..].find('\n') {
            let end = consumed + offset;
            let line = self.buffer[consumed..end].trim_end_matches('\r');
            lines.push(line.to_string());
            consumed = end + 1;
        }
        self.buffer.drain(..consumed);

        if self.buffer.len() > self.max_line_size {
            let size = self.buffer.len();
            self.buffer.clear();
            return Err(ChatError::BufferOverflow {
                size,
                max: self.max_line_size,
            });
        }

        Ok(lines)
    }

    /// Take whatever is left once the stream has ended
    pub fn finish(&mut self) -> Option<String> {
        let rest = std::mem::take(&mut self.buffer);
        let rest = rest.trim_end_matches('\r');
        if rest.is_empty() {
            None
        } else {
            Some(rest.to_string())
        }
    }

    pub fn buffer_size(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}

impl Default for LineBuffer {
    fn default() -> Self {
        Self::new()
    }
}

/// Bytes in, complete text lines out
#[derive(Debug, Default)]
pub struct LineReader {
    decoder: Utf8Decoder,
    lines: LineBuffer,
}

impl LineReader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(max_line_size: usize) -> Self {
        Self {
            decoder: Utf8Decoder::new(),
            lines: LineBuffer::with_capacity(max_line_size),
        }
    }

    /// Feed one network read
    pub fn feed(&mut self, bytes: &[u8]) -> Result<Vec<String>> {
        let text = self.decoder.decode(bytes);
        self.lines.push(&text)
    }

    /// Flush decoder and line buffer at end of stream
    pub fn finish(&mut self) -> Result<Option<String>> {
        let tail = self.decoder.finish();
        // tail is at most one U+FFFD, never a newline
        self.lines.push(&tail)?;
        Ok(self.lines.finish())
    }
}
