//! Session state: buffer, match set, selection, and analysis status.
//!
//! `Session` is the only owner of the three pieces of shared mutable state.
//! Nothing outside this crate writes them directly; every mutation goes
//! through one of the methods below, which keep them consistent:
//!
//! * Every buffer mutation bumps the generation.
//! * A user edit clears the match set (stale tolerance is zero) and the
//!   selection.
//! * `replace_matches` accepts a set only for the current generation and
//!   revalidates the selection with the configured recovery policy.
//! * `apply` rewrites the buffer, rebases the surviving matches onto the new
//!   generation and clears the selection. It never schedules analysis; the
//!   caller decides whether to re-schedule.
//!
//! None of these operations can fail on internally consistent input. Stale
//! requests (old indices, foreign matches) are reported through outcome enums
//! and logged at debug, never raised as errors.

use core_events::{STALE_ACTIONS_IGNORED, bump};
use core_model::{Generation, Match, MatchSet, MatchSource, SelectionRecovery};
use core_text::{Buffer, Segment, annotate, segment_index_at};
use tracing::{debug, trace};

pub mod apply;
pub mod selection;

pub use apply::{ApplyOutcome, ApplyReport, StaleReason, rebase_matches};
pub use selection::SelectionController;

/// Analysis state surfaced to the UI. Failure and offline states are distinct
/// from "checked, nothing found" (`Ready { count: 0 }`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AnalysisStatus {
    /// Nothing to check (empty or trivial buffer).
    #[default]
    Idle,
    /// An edit is waiting for the debounce window.
    Pending,
    /// A request is in flight.
    Checking,
    /// The service answered for the current buffer.
    Ready { count: usize },
    /// Service offline; the fallback heuristic produced `count` matches.
    Offline { count: usize },
    /// The last request failed; the fallback heuristic produced `count` matches.
    Failed { count: usize },
}

impl AnalysisStatus {
    pub fn label(&self) -> &'static str {
        match self {
            AnalysisStatus::Idle => "idle",
            AnalysisStatus::Pending => "pending",
            AnalysisStatus::Checking => "checking",
            AnalysisStatus::Ready { .. } => "ready",
            AnalysisStatus::Offline { .. } => "offline",
            AnalysisStatus::Failed { .. } => "checking failed",
        }
    }

    /// Issue count carried by the settled states.
    pub fn count(&self) -> Option<usize> {
        match self {
            AnalysisStatus::Ready { count }
            | AnalysisStatus::Offline { count }
            | AnalysisStatus::Failed { count } => Some(*count),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Session {
    buffer: Buffer,
    generation: Generation,
    matches: MatchSet,
    selection: SelectionController,
    recovery: SelectionRecovery,
    status: AnalysisStatus,
}

impl Default for Session {
    fn default() -> Self {
        Self::new("")
    }
}

impl Session {
    pub fn new(text: &str) -> Self {
        Self {
            buffer: Buffer::new(text),
            generation: Generation::INITIAL,
            matches: MatchSet::empty(Generation::INITIAL),
            selection: SelectionController::new(),
            recovery: SelectionRecovery::default(),
            status: AnalysisStatus::Idle,
        }
    }

    pub fn with_recovery(mut self, recovery: SelectionRecovery) -> Self {
        self.recovery = recovery;
        self
    }

    pub fn buffer(&self) -> &Buffer {
        &self.buffer
    }

    pub fn text(&self) -> String {
        self.buffer.to_string()
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn matches(&self) -> &MatchSet {
        &self.matches
    }

    pub fn selection(&self) -> Option<usize> {
        self.selection.get()
    }

    pub fn selected_match(&self) -> Option<&Match> {
        self.selection.get().and_then(|i| self.matches.get(i))
    }

    pub fn status(&self) -> AnalysisStatus {
        self.status
    }

    pub fn set_status(&mut self, status: AnalysisStatus) {
        if self.status != status {
            trace!(target: "state", from = self.status.label(), to = status.label(), "status");
        }
        self.status = status;
    }

    // ---------------------------------------------------------------------------------------------
    // User edits
    // ---------------------------------------------------------------------------------------------

    /// Replace the buffer with `text`. Returns `None` when the content is
    /// unchanged (no new generation).
    pub fn set_text(&mut self, text: &str) -> Option<Generation> {
        if self.buffer == *text {
            return None;
        }
        self.buffer.set(text);
        Some(self.after_user_edit())
    }

    /// Append `text` to the end of the buffer.
    pub fn append(&mut self, text: &str) -> Option<Generation> {
        if text.is_empty() {
            return None;
        }
        let end = self.buffer.len_chars();
        self.buffer.insert(end, text);
        Some(self.after_user_edit())
    }

    /// Replace the char range `[start, end)` (clamped) with `text`.
    pub fn edit(&mut self, start: usize, end: usize, text: &str) -> Option<Generation> {
        let len = self.buffer.len_chars();
        let end = end.min(len);
        let start = start.min(end);
        if start == end && text.is_empty() {
            return None;
        }
        self.buffer.replace(start, end, text);
        Some(self.after_user_edit())
    }

    fn after_user_edit(&mut self) -> Generation {
        self.generation = self.generation.next();
        if !self.matches.is_empty() {
            trace!(
                target: "state",
                dropped = self.matches.len(),
                generation = %self.generation,
                "matches_cleared_by_edit"
            );
        }
        self.matches = MatchSet::empty(self.generation);
        self.selection.clear();
        self.generation
    }

    // ---------------------------------------------------------------------------------------------
    // Match set
    // ---------------------------------------------------------------------------------------------

    /// Install a freshly computed match set. Returns false (and leaves state
    /// untouched) when the set was computed for another generation.
    pub fn replace_matches(&mut self, set: MatchSet) -> bool {
        if set.generation() != self.generation {
            debug!(
                target: "state",
                set_generation = %set.generation(),
                current = %self.generation,
                "stale_match_set_ignored"
            );
            return false;
        }
        trace!(
            target: "state",
            count = set.len(),
            source = set.source().as_str(),
            generation = %self.generation,
            "matches_replaced"
        );
        self.matches = set;
        self.selection.revalidate(self.matches.len(), self.recovery);
        true
    }

    /// Convenience wrapper tagging `matches` with the current generation.
    pub fn replace_current(&mut self, source: MatchSource, matches: Vec<Match>) -> bool {
        self.replace_matches(MatchSet::new(self.generation, source, matches))
    }

    pub fn clear_matches(&mut self) {
        self.matches = MatchSet::empty(self.generation);
        self.selection.clear();
    }

    // ---------------------------------------------------------------------------------------------
    // Rendering
    // ---------------------------------------------------------------------------------------------

    /// Recompute the segment view from scratch.
    pub fn segments(&self) -> Vec<Segment> {
        if self.matches.generation() != self.generation {
            return annotate(&self.buffer, &[], None);
        }
        annotate(&self.buffer, self.matches.matches(), self.selection.get())
    }

    // ---------------------------------------------------------------------------------------------
    // Selection
    // ---------------------------------------------------------------------------------------------

    pub fn select(&mut self, index: usize) -> bool {
        self.selection.select(index, self.matches.len())
    }

    /// Route a click on `segment` into the selection.
    pub fn select_from_segment(&mut self, segment: &Segment) -> bool {
        self.selection
            .select_from_segment(segment, self.matches.len())
    }

    /// Click at char position `pos` of the rendered buffer.
    pub fn click_at(&mut self, pos: usize) -> Option<usize> {
        let segments = self.segments();
        if let Some(i) = segment_index_at(&segments, pos) {
            self.select_from_segment(&segments[i]);
        }
        self.selection.get()
    }

    pub fn select_next(&mut self) -> Option<usize> {
        self.selection.select_next(self.matches.len())
    }

    pub fn select_prev(&mut self) -> Option<usize> {
        self.selection.select_prev(self.matches.len())
    }

    pub fn clear_selection(&mut self) {
        self.selection.clear();
    }

    // ---------------------------------------------------------------------------------------------
    // Replacement
    // ---------------------------------------------------------------------------------------------

    /// Replace the text covered by match `index` with `replacement`.
    pub fn apply(&mut self, index: usize, replacement: &str) -> ApplyOutcome {
        let Some(target) = self.matches.get(index) else {
            return self.ignore_stale(StaleReason::IndexOutOfRange, index);
        };
        if self.matches.generation() != self.generation {
            return self.ignore_stale(StaleReason::GenerationMismatch, index);
        }
        if !target.fits(self.buffer.len_chars()) {
            return self.ignore_stale(StaleReason::RangeOutOfBounds, index);
        }
        let (start, end) = (target.offset, target.end());

        let inserted = self.buffer.replace(start, end, replacement);
        self.generation = self.generation.next();

        let source = self.matches.source();
        let previous = std::mem::replace(&mut self.matches, MatchSet::empty(self.generation));
        let (remaining, report) =
            rebase_matches(previous.into_matches(), index, start, end, inserted);
        self.matches = MatchSet::new(self.generation, source, remaining);
        self.selection.clear();

        debug!(
            target: "state.apply",
            index,
            start,
            end,
            inserted,
            delta = report.delta,
            shifted = report.shifted,
            dropped = report.dropped_overlaps,
            generation = %self.generation,
            "replacement_applied"
        );
        ApplyOutcome::Applied(report)
    }

    /// Apply candidate `choice` of match `index`.
    pub fn apply_suggestion(&mut self, index: usize, choice: usize) -> ApplyOutcome {
        let Some(target) = self.matches.get(index) else {
            return self.ignore_stale(StaleReason::IndexOutOfRange, index);
        };
        let Some(replacement) = target.replacements.get(choice).cloned() else {
            return self.ignore_stale(StaleReason::NoSuchReplacement, index);
        };
        self.apply(index, &replacement)
    }

    /// Apply `replacement` to a match held by value (e.g. from an older
    /// render). Matches not in the current set are ignored as stale.
    pub fn apply_match(&mut self, target: &Match, replacement: &str) -> ApplyOutcome {
        match self.matches.position_of(target) {
            Some(index) => self.apply(index, replacement),
            None => self.ignore_stale(StaleReason::UnknownMatch, usize::MAX),
        }
    }

    fn ignore_stale(&self, reason: StaleReason, index: usize) -> ApplyOutcome {
        debug!(
            target: "state.apply",
            reason = reason.as_str(),
            index,
            matches = self.matches.len(),
            "stale_action_ignored"
        );
        bump(&STALE_ACTIONS_IGNORED);
        ApplyOutcome::IgnoredStale(reason)
    }
}
