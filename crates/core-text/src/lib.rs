//! Rope-backed text buffer and span annotation.
//!
//! All offsets in this crate are char indices (Unicode scalar values), which
//! is also the unit `core_model::Match` uses. Out-of-range inputs are clamped
//! rather than rejected so stale ranges never panic.

use ropey::Rope;
use std::fmt;

pub mod segment;

pub use segment::{Segment, SegmentKind, annotate, annotate_str, segment_index_at, segments_text};

/// A text buffer backed by a `ropey::Rope`.
#[derive(Clone, Default)]
pub struct Buffer {
    rope: Rope,
}

impl Buffer {
    pub fn new(content: &str) -> Self {
        Self {
            rope: Rope::from_str(content),
        }
    }

    /// Length in chars.
    pub fn len_chars(&self) -> usize {
        self.rope.len_chars()
    }

    pub fn len_bytes(&self) -> usize {
        self.rope.len_bytes()
    }

    pub fn is_empty(&self) -> bool {
        self.rope.len_chars() == 0
    }

    /// Owned copy of the chars in `[start, end)`, clamped to the buffer.
    pub fn slice(&self, start: usize, end: usize) -> String {
        let len = self.len_chars();
        let end = end.min(len);
        let start = start.min(end);
        self.rope.slice(start..end).to_string()
    }

    /// Replace the whole content.
    pub fn set(&mut self, content: &str) {
        self.rope = Rope::from_str(content);
    }

    /// Insert `text` at char index `at` (clamped to the end).
    pub fn insert(&mut self, at: usize, text: &str) {
        let at = at.min(self.len_chars());
        self.rope.insert(at, text);
    }

    /// Remove `[start, end)` (clamped).
    pub fn remove(&mut self, start: usize, end: usize) {
        let len = self.len_chars();
        let end = end.min(len);
        let start = start.min(end);
        if start < end {
            self.rope.remove(start..end);
        }
    }

    /// Replace `[start, end)` with `text`. Returns the char length of the
    /// inserted text.
    pub fn replace(&mut self, start: usize, end: usize, text: &str) -> usize {
        self.remove(start, end);
        let at = start.min(self.len_chars());
        self.rope.insert(at, text);
        text.chars().count()
    }

    /// Chars that are not whitespace; used for the trivial-input threshold.
    pub fn significant_chars(&self) -> usize {
        self.rope.chars().filter(|c| !c.is_whitespace()).count()
    }
}

impl fmt::Display for Buffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for chunk in self.rope.chunks() {
            f.write_str(chunk)?;
        }
        Ok(())
    }
}

impl fmt::Debug for Buffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Content is user text; keep it out of debug output.
        f.debug_struct("Buffer")
            .field("chars", &self.len_chars())
            .field("bytes", &self.len_bytes())
            .finish()
    }
}

impl From<&str> for Buffer {
    fn from(value: &str) -> Self {
        Buffer::new(value)
    }
}

impl PartialEq<str> for Buffer {
    fn eq(&self, other: &str) -> bool {
        self.rope == other
    }
}

impl PartialEq<&str> for Buffer {
    fn eq(&self, other: &&str) -> bool {
        self.rope == *other
    }
}
