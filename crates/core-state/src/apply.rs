//! Replacement application: offset arithmetic for the matches that survive.
//!
//! After `[start, end)` is replaced by `inserted` chars:
//! * matches ending at or before `start` are unchanged,
//! * matches starting at or after `end` shift by `inserted - (end - start)`,
//! * anything else overlapped the replaced range and is dropped.
//!
//! The applied match itself is removed by index, so an identical duplicate
//! elsewhere in the set is treated like any other match.

use core_model::Match;

/// Why an apply request was ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StaleReason {
    /// Index does not address the current match set.
    IndexOutOfRange,
    /// The match set belongs to an older buffer generation.
    GenerationMismatch,
    /// The match range no longer fits inside the buffer.
    RangeOutOfBounds,
    /// A match passed by value is not part of the current set.
    UnknownMatch,
    /// The requested candidate replacement does not exist.
    NoSuchReplacement,
}

impl StaleReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            StaleReason::IndexOutOfRange => "index_out_of_range",
            StaleReason::GenerationMismatch => "generation_mismatch",
            StaleReason::RangeOutOfBounds => "range_out_of_bounds",
            StaleReason::UnknownMatch => "unknown_match",
            StaleReason::NoSuchReplacement => "no_such_replacement",
        }
    }
}

/// Summary of a successful apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApplyReport {
    /// Char delta applied to later matches.
    pub delta: isize,
    pub shifted: usize,
    pub unchanged: usize,
    pub dropped_overlaps: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    Applied(ApplyReport),
    IgnoredStale(StaleReason),
}

impl ApplyOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, ApplyOutcome::Applied(_))
    }
}

/// Rebuild the match list after replacing `[start, end)` with `inserted`
/// chars, removing the match at `applied`.
pub fn rebase_matches(
    matches: Vec<Match>,
    applied: usize,
    start: usize,
    end: usize,
    inserted: usize,
) -> (Vec<Match>, ApplyReport) {
    let removed = end - start;
    let delta = inserted as isize - removed as isize;
    let mut report = ApplyReport {
        delta,
        shifted: 0,
        unchanged: 0,
        dropped_overlaps: 0,
    };
    let mut out = Vec::with_capacity(matches.len().saturating_sub(1));
    for (i, mut m) in matches.into_iter().enumerate() {
        if i == applied {
            continue;
        }
        if m.end() <= start {
            report.unchanged += 1;
            out.push(m);
        } else if m.offset >= end {
            m.offset = m.offset - removed + inserted;
            report.shifted += 1;
            out.push(m);
        } else {
            report.dropped_overlaps += 1;
        }
    }
    (out, report)
}
