use core_events::{STALE_ACTIONS_IGNORED, bump};
use core_model::SelectionRecovery;
use core_text::Segment;
use tracing::{debug, trace};

/// Single source of truth for "which match is selected".
///
/// List clicks (`select`) and span clicks (`select_from_segment`) both land
/// in the same validated setter, so there is never a second flag to keep in
/// sync.
///
/// Invariants:
/// - `selected` is `None` or an index `< len` for the `len` last passed in.
/// - Revalidation runs whenever the match set is replaced; the previous index
///   never survives a replacement unchanged.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SelectionController {
    selected: Option<usize>,
}

impl SelectionController {
    pub fn new() -> Self {
        Self { selected: None }
    }

    pub fn get(&self) -> Option<usize> {
        self.selected
    }

    pub fn clear(&mut self) {
        self.selected = None;
    }

    /// Select `index` if it is within `[0, len)`, else clear. Returns whether
    /// a match is selected afterwards.
    pub fn select(&mut self, index: usize, len: usize) -> bool {
        if index < len {
            trace!(target: "state.selection", index, len, "select");
            self.selected = Some(index);
            true
        } else {
            debug!(target: "state.selection", index, len, "stale_select_ignored");
            bump(&STALE_ACTIONS_IGNORED);
            self.selected = None;
            false
        }
    }

    /// Route a click on a rendered segment. Plain text leaves the selection
    /// untouched.
    pub fn select_from_segment(&mut self, segment: &Segment, len: usize) -> bool {
        match segment.match_index {
            Some(index) if segment.is_highlighted() => self.select(index, len),
            _ => self.selected.is_some(),
        }
    }

    /// Move to the next match, wrapping. Starts at 0 when nothing is selected.
    pub fn select_next(&mut self, len: usize) -> Option<usize> {
        if len == 0 {
            self.selected = None;
            return None;
        }
        let next = match self.selected {
            Some(i) if i + 1 < len => i + 1,
            _ => 0,
        };
        self.selected = Some(next);
        self.selected
    }

    /// Move to the previous match, wrapping. Starts at the last match when
    /// nothing is selected.
    pub fn select_prev(&mut self, len: usize) -> Option<usize> {
        if len == 0 {
            self.selected = None;
            return None;
        }
        let prev = match self.selected {
            Some(i) if i > 0 && i < len => i - 1,
            _ => len - 1,
        };
        self.selected = Some(prev);
        self.selected
    }

    /// Apply the recovery policy after the match set changed to `len` entries.
    pub fn revalidate(&mut self, len: usize, policy: SelectionRecovery) {
        let before = self.selected;
        self.selected = match policy {
            SelectionRecovery::None => None,
            SelectionRecovery::First if len > 0 => Some(0),
            SelectionRecovery::First => None,
        };
        if before != self.selected {
            trace!(target: "state.selection", ?before, after = ?self.selected, len, "revalidated");
        }
    }
}
