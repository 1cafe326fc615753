//! Shared data model for the correction engine.
//!
//! Everything here is plain data: no IO, no logging, no async. Higher crates
//! (`core-text`, `core-state`, `core-analysis`) agree on these shapes so the
//! annotator and applicator never special-case where a match came from.
//!
//! Core invariants:
//! * `Match::offset` and `Match::length` are measured in chars (Unicode scalar
//!   values) against the buffer generation the match was produced for.
//! * `Match::length > 0` for every match a producer emits. Consumers still
//!   tolerate zero-length or out-of-range matches (clamp or drop, never panic)
//!   because a later edit can invalidate any range.
//! * A `MatchSet` is tagged with exactly one `Generation`; once the buffer
//!   moves to a newer generation the set is stale unless the applicator
//!   explicitly retags it after shifting offsets.

use std::fmt;
use std::str::FromStr;

/// Monotonic buffer version. Every buffer mutation produces `next()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Generation(pub u64);

impl Generation {
    pub const INITIAL: Generation = Generation(0);

    pub fn next(self) -> Self {
        Generation(self.0.wrapping_add(1))
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "g{}", self.0)
    }
}

/// Display severity derived from the service's issue type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

impl Severity {
    /// `misspelling`/`grammar` are critical, `style` is a warning, anything
    /// else (including unknown or empty types) is informational.
    pub fn from_issue_type(issue_type: &str) -> Self {
        match issue_type.to_ascii_lowercase().as_str() {
            "misspelling" | "grammar" => Severity::Critical,
            "style" => Severity::Warning,
            _ => Severity::Info,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Critical => "critical",
        }
    }
}

/// A single positional finding.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Match {
    pub offset: usize,
    pub length: usize,
    pub message: String,
    pub short_message: Option<String>,
    pub issue_type: String,
    pub rule_id: Option<String>,
    /// Candidate replacements, best first. May be empty.
    pub replacements: Vec<String>,
}

impl Match {
    pub fn new(offset: usize, length: usize, message: impl Into<String>) -> Self {
        Self {
            offset,
            length,
            message: message.into(),
            short_message: None,
            issue_type: String::new(),
            rule_id: None,
            replacements: Vec::new(),
        }
    }

    pub fn with_issue_type(mut self, issue_type: impl Into<String>) -> Self {
        self.issue_type = issue_type.into();
        self
    }

    pub fn with_short_message(mut self, short: impl Into<String>) -> Self {
        self.short_message = Some(short.into());
        self
    }

    pub fn with_rule_id(mut self, rule_id: impl Into<String>) -> Self {
        self.rule_id = Some(rule_id.into());
        self
    }

    pub fn with_replacements<I, S>(mut self, replacements: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.replacements = replacements.into_iter().map(Into::into).collect();
        self
    }

    /// Exclusive end offset (saturating so corrupt input never overflows).
    pub fn end(&self) -> usize {
        self.offset.saturating_add(self.length)
    }

    pub fn severity(&self) -> Severity {
        Severity::from_issue_type(&self.issue_type)
    }

    /// True if this match intersects the half-open range `[start, end)`.
    pub fn overlaps(&self, start: usize, end: usize) -> bool {
        self.offset < end && start < self.end()
    }

    /// Whether the range still fits inside a buffer of `len` chars.
    pub fn fits(&self, len: usize) -> bool {
        self.length > 0 && self.end() <= len
    }

    /// Short label for list views: short message when present, else message.
    pub fn label(&self) -> &str {
        self.short_message
            .as_deref()
            .filter(|s| !s.is_empty())
            .unwrap_or(&self.message)
    }
}

/// Where a match set came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MatchSource {
    Remote,
    Fallback,
}

impl MatchSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchSource::Remote => "remote",
            MatchSource::Fallback => "fallback",
        }
    }
}

/// Ordered matches attached to one buffer generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchSet {
    generation: Generation,
    source: MatchSource,
    matches: Vec<Match>,
}

impl MatchSet {
    pub fn new(generation: Generation, source: MatchSource, matches: Vec<Match>) -> Self {
        Self {
            generation,
            source,
            matches,
        }
    }

    pub fn empty(generation: Generation) -> Self {
        Self::new(generation, MatchSource::Remote, Vec::new())
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn source(&self) -> MatchSource {
        self.source
    }

    pub fn matches(&self) -> &[Match] {
        &self.matches
    }

    pub fn len(&self) -> usize {
        self.matches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Match> {
        self.matches.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Match> {
        self.matches.iter()
    }

    /// Index of the first match equal to `m`.
    pub fn position_of(&self, m: &Match) -> Option<usize> {
        self.matches.iter().position(|candidate| candidate == m)
    }

    /// Consume the set, yielding its matches for rebuilding.
    pub fn into_matches(self) -> Vec<Match> {
        self.matches
    }
}

/// What to do with the selection when the match set is replaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SelectionRecovery {
    /// Clear the selection.
    #[default]
    None,
    /// Select the first match when any exist.
    First,
}

impl FromStr for SelectionRecovery {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(SelectionRecovery::None),
            "first" => Ok(SelectionRecovery::First),
            other => Err(format!("unknown selection recovery `{other}`")),
        }
    }
}
