//! Pattern buffer for expect-style matching.
//!
//! Received output accumulates here until an expect call matches. The
//! matched prefix is consumed; whatever follows the match stays buffered
//! for the next expect, so output that arrives in one burst can satisfy
//! several consecutive steps.
//!
//! ANSI escape sequences are stripped by a [`vte::Parser`] that lives as
//! long as the buffer, so a sequence split across two reads is still
//! removed whole.

use vte::{Parser, Perform};

use super::patterns::{PatternMatch, PatternSet};

/// Default upper bound on buffered, unconsumed output.
pub const DEFAULT_MAX_BUFFER: usize = 64 * 1024;

/// Collects the printable output of the escape parser.
#[derive(Debug, Default)]
struct Plain(Vec<u8>);

impl Perform for Plain {
    fn print(&mut self, c: char) {
        let mut utf8 = [0u8; 4];
        self.0.extend_from_slice(c.encode_utf8(&mut utf8).as_bytes());
    }

    fn execute(&mut self, byte: u8) {
        // Other C0 controls (CR included) are dropped.
        if byte == b'\n' {
            self.0.push(byte);
        }
    }
}

/// Buffer of unconsumed output.
pub struct PatternBuffer {
    /// Unconsumed output, ANSI escapes stripped.
    buffer: Plain,

    /// Escape parser state carried between chunks.
    parser: Parser,

    /// Oldest bytes are discarded past this size.
    max_size: usize,
}

impl std::fmt::Debug for PatternBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PatternBuffer")
            .field("buffer", &self.as_str_lossy())
            .field("max_size", &self.max_size)
            .finish()
    }
}

impl PatternBuffer {
    /// Create a new pattern buffer bounded to `max_size` bytes.
    pub fn new(max_size: usize) -> Self {
        Self {
            buffer: Plain(Vec::with_capacity(4096)),
            parser: Parser::new(),
            max_size: max_size.max(1),
        }
    }

    /// Extend the buffer with new data, stripping ANSI escape codes.
    pub fn extend(&mut self, data: &[u8]) {
        self.parser.advance(&mut self.buffer, data);

        if self.buffer.0.len() > self.max_size {
            let excess = self.buffer.0.len() - self.max_size;
            self.buffer.0.drain(..excess);
        }
    }

    /// Look for any alternative of `patterns` in the buffered output.
    pub fn find(&self, patterns: &PatternSet) -> Option<PatternMatch> {
        patterns.find(&self.buffer.0)
    }

    /// Remove and return everything up to the end of `m`.
    pub fn consume(&mut self, m: &PatternMatch) -> Vec<u8> {
        let end = m.end.min(self.buffer.0.len());
        self.buffer.0.drain(..end).collect()
    }

    /// Take ownership of the buffer contents and reset.
    pub fn take(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.buffer.0)
    }

    /// Get a reference to the buffer contents.
    pub fn as_slice(&self) -> &[u8] {
        &self.buffer.0
    }

    /// Get the buffer contents as a string (lossy UTF-8 conversion).
    pub fn as_str_lossy(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.buffer.0)
    }

    pub fn len(&self) -> usize {
        self.buffer.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.0.is_empty()
    }

    pub fn clear(&mut self) {
        self.buffer.0.clear();
    }
}

impl Default for PatternBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_BUFFER)
    }
}
