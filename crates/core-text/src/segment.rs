//! Span annotation: buffer + matches -> renderable segments.
//!
//! Contract:
//! - Input: a buffer, an ordered (possibly unsorted, possibly overlapping)
//!   slice of matches, and an optional selected match index.
//! - Output: plain and highlighted segments in buffer order. Highlighted
//!   segments carry the *original* index of their match so clicks can be
//!   routed back into the match set.
//! - Guarantees: segments are non-overlapping and their texts concatenate to
//!   the buffer exactly. The function is pure; identical inputs produce
//!   identical output.
//!
//! Overlap policy: matches are walked by ascending offset (ties keep input
//! order). A match whose clamped start lies before the end of the previously
//! highlighted span is dropped whole; partial highlights are never emitted.
//! Matches that clamp to an empty range are dropped as well.

use crate::Buffer;
use core_model::{Match, Severity};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SegmentKind {
    Plain,
    Highlighted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub kind: SegmentKind,
    pub text: String,
    pub match_index: Option<usize>,
    pub severity: Option<Severity>,
    pub selected: bool,
}

impl Segment {
    pub fn plain(text: String) -> Self {
        Self {
            kind: SegmentKind::Plain,
            text,
            match_index: None,
            severity: None,
            selected: false,
        }
    }

    pub fn highlighted(text: String, match_index: usize, severity: Severity, selected: bool) -> Self {
        Self {
            kind: SegmentKind::Highlighted,
            text,
            match_index: Some(match_index),
            severity: Some(severity),
            selected,
        }
    }

    pub fn is_highlighted(&self) -> bool {
        self.kind == SegmentKind::Highlighted
    }
}

/// Annotate `buffer` with `matches`. See module docs for the policy.
pub fn annotate(buffer: &Buffer, matches: &[Match], selected: Option<usize>) -> Vec<Segment> {
    let len = buffer.len_chars();
    let mut order: Vec<usize> = (0..matches.len()).collect();
    order.sort_by_key(|&i| matches[i].offset);

    let mut out = Vec::with_capacity(matches.len() * 2 + 1);
    let mut cursor = 0usize;
    for idx in order {
        let m = &matches[idx];
        let start = m.offset.min(len);
        let end = m.end().min(len);
        if start < cursor || start >= end {
            continue;
        }
        if start > cursor {
            out.push(Segment::plain(buffer.slice(cursor, start)));
        }
        out.push(Segment::highlighted(
            buffer.slice(start, end),
            idx,
            m.severity(),
            selected == Some(idx),
        ));
        cursor = end;
    }
    if cursor < len {
        out.push(Segment::plain(buffer.slice(cursor, len)));
    }
    out
}

/// Convenience wrapper for callers holding a plain string.
pub fn annotate_str(text: &str, matches: &[Match], selected: Option<usize>) -> Vec<Segment> {
    annotate(&Buffer::new(text), matches, selected)
}

/// Concatenate segment texts (the inverse of `annotate`).
pub fn segments_text(segments: &[Segment]) -> String {
    segments.iter().map(|s| s.text.as_str()).collect()
}

/// Index of the segment covering char position `pos`, if any.
pub fn segment_index_at(segments: &[Segment], pos: usize) -> Option<usize> {
    let mut start = 0usize;
    for (i, seg) in segments.iter().enumerate() {
        let end = start + seg.text.chars().count();
        if pos >= start && pos < end {
            return Some(i);
        }
        start = end;
    }
    None
}
