//! Output buffer with tail-only prompt search.
//!
//! Prompts always sit at the end of what the device has sent, so only the
//! last `search_depth` bytes are scanned. `show running-config` on a
//! loaded router is large enough for this to matter.

use regex::bytes::Regex;

/// Buffer for accumulating device output and searching it for patterns.
#[derive(Debug)]
pub struct PatternBuffer {
    buffer: Vec<u8>,

    /// How many bytes from the end to search for prompts.
    search_depth: usize,

    /// Offset below which confirmation prompts have already been answered.
    answered_upto: usize,
}

impl PatternBuffer {
    /// Create a new pattern buffer with the specified search depth.
    pub fn new(search_depth: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(4096),
            search_depth,
            answered_upto: 0,
        }
    }

    /// Extend the buffer with new data, stripping ANSI escape codes.
    ///
    /// Control bytes other than LF are dropped too, so console `\r\0` and
    /// `\r\n` line endings both come out as a bare `\n`.
    pub fn extend(&mut self, data: &[u8]) {
        let cleaned = strip_ansi_escapes::strip(data);
        self.buffer.extend_from_slice(&cleaned);
    }

    /// Search only the tail of the buffer for the pattern.
    ///
    /// Returns the match start and end as offsets into the full buffer.
    pub fn search_tail(&self, pattern: &Regex) -> Option<(usize, usize)> {
        let start = self.buffer.len().saturating_sub(self.search_depth);
        pattern
            .find(&self.buffer[start..])
            .map(|m| (start + m.start(), start + m.end()))
    }

    /// Search the entire buffer for a pattern.
    pub fn search_full(&self, pattern: &Regex) -> Option<(usize, usize)> {
        pattern.find(&self.buffer).map(|m| (m.start(), m.end()))
    }

    /// Check if the tail contains a pattern match.
    pub fn tail_contains(&self, pattern: &Regex) -> bool {
        self.search_tail(pattern).is_some()
    }

    /// Search the bytes that have not been answered yet.
    ///
    /// Used for confirmation prompts so that one occurrence is never
    /// answered twice.
    pub fn search_unanswered(&self, pattern: &Regex) -> Option<(usize, usize)> {
        let start = self.answered_upto.min(self.buffer.len());
        pattern
            .find(&self.buffer[start..])
            .map(|m| (start + m.start(), start + m.end()))
    }

    /// Mark everything up to `offset` as answered.
    pub fn mark_answered(&mut self, offset: usize) {
        self.answered_upto = offset.min(self.buffer.len());
    }

    /// Take ownership of the buffer contents and reset.
    pub fn take(&mut self) -> Vec<u8> {
        self.answered_upto = 0;
        std::mem::take(&mut self.buffer)
    }

    /// Get a reference to the buffer contents.
    pub fn as_slice(&self) -> &[u8] {
        &self.buffer
    }

    /// Get the buffer contents as a string (lossy UTF-8 conversion).
    pub fn as_str_lossy(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.buffer)
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn clear(&mut self) {
        self.answered_upto = 0;
        self.buffer.clear();
    }

    pub fn search_depth(&self) -> usize {
        self.search_depth
    }
}

impl Default for PatternBuffer {
    fn default() -> Self {
        Self::new(1000)
    }
}
