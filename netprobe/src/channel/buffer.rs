//! Capture buffer with a bounded prompt-search window.
//!
//! A running config or hardware inventory can be hundreds of kilobytes, but
//! a prompt can only ever sit at the very end. Each check therefore looks at
//! the last `search_depth` bytes only.

use super::patterns::PromptMatcher;

/// Raw output of one collection pass.
///
/// Bytes are stored exactly as received. Escape sequences are only removed
/// from the view handed to the matcher.
#[derive(Debug)]
pub struct PatternBuffer {
    data: Vec<u8>,
    search_depth: usize,
}

impl PatternBuffer {
    /// An empty buffer that searches the last `search_depth` bytes.
    pub fn new(search_depth: usize) -> Self {
        Self {
            data: Vec::with_capacity(4096),
            search_depth,
        }
    }

    /// Append a received chunk.
    pub fn extend(&mut self, chunk: &[u8]) {
        self.data.extend_from_slice(chunk);
    }

    /// The search window.
    pub fn tail(&self) -> &[u8] {
        let start = self.data.len().saturating_sub(self.search_depth);
        &self.data[start..]
    }

    /// The prompt text at the end of the window, trimmed.
    pub fn search_tail<M: PromptMatcher + ?Sized>(&self, matcher: &M) -> Option<String> {
        let tail = self.tail();
        matcher
            .find_prompt(tail)
            .map(|(start, end)| String::from_utf8_lossy(&tail[start..end]).trim().to_string())
    }

    /// Whether the window ends in a prompt.
    pub fn tail_matches<M: PromptMatcher + ?Sized>(&self, matcher: &M) -> bool {
        matcher.is_match(self.tail())
    }

    /// Hand over the captured bytes, leaving the buffer empty.
    pub fn take(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.data)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use regex::bytes::Regex;

    use super::*;

    #[test]
    fn test_raw_bytes_are_kept() {
        let mut buffer = PatternBuffer::new(100);
        buffer.extend(b"\x1b[32mGreen\xff text\x1b[0m");
        assert_eq!(buffer.len(), 20);
        assert_eq!(buffer.take(), b"\x1b[32mGreen\xff text\x1b[0m");
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_prompt_in_window() {
        let mut buffer = PatternBuffer::new(20);
        buffer.extend(&[b'x'; 100]);
        buffer.extend(b"\nrouter#");

        let pattern = Regex::new(r"router#\s*$").unwrap();
        assert_eq!(buffer.tail().len(), 20);
        assert_eq!(buffer.search_tail(&pattern).as_deref(), Some("router#"));
    }

    #[test]
    fn test_prompt_outside_window_is_ignored() {
        let mut buffer = PatternBuffer::new(10);
        buffer.extend(b"router#");
        buffer.extend(&[b'x'; 100]);

        let pattern = Regex::new(r"router#").unwrap();
        assert!(buffer.search_tail(&pattern).is_none());
        assert!(!buffer.tail_matches(&pattern));
    }

    #[test]
    fn test_short_buffer_is_searched_whole() {
        let mut buffer = PatternBuffer::new(1000);
        buffer.extend(b"Router>");
        assert_eq!(buffer.tail(), b"Router>");
    }
}
