//! JSON payload decoding for `/v2/check`.
//!
//! Shape (fields not listed are ignored):
//!
//! ```json
//! { "matches": [ { "offset": 2, "length": 3, "message": "...",
//!                  "shortMessage": "...", "replacements": [ { "value": "have" } ],
//!                  "rule": { "id": "HE_VERB_AGR", "issueType": "grammar" } } ] }
//! ```
//!
//! The service counts offsets in UTF-16 code units; they are converted to
//! char offsets here. A body that is not JSON or lacks the `matches` array
//! is malformed as a whole. Individual entries that fail to decode, lack
//! `offset`/`length`, or collapse to an empty range are skipped.

use crate::AnalysisError;
use core_model::Match;
use serde::Deserialize;
use tracing::debug;

#[derive(Debug, Deserialize)]
struct WireResponse {
    matches: Option<Vec<serde_json::Value>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireMatch {
    offset: Option<i64>,
    length: Option<i64>,
    #[serde(default)]
    message: String,
    short_message: Option<String>,
    #[serde(default)]
    replacements: Vec<WireReplacement>,
    rule: Option<WireRule>,
}

#[derive(Debug, Deserialize)]
struct WireReplacement {
    value: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireRule {
    id: Option<String>,
    issue_type: Option<String>,
}

/// Maps UTF-16 code unit offsets to char offsets for one text.
pub struct Utf16Index {
    /// UTF-16 offset at which each char starts; empty for ASCII text.
    starts: Vec<usize>,
    ascii_len: Option<usize>,
}

impl Utf16Index {
    pub fn new(text: &str) -> Self {
        if text.is_ascii() {
            return Self {
                starts: Vec::new(),
                ascii_len: Some(text.len()),
            };
        }
        let mut starts = Vec::with_capacity(text.len());
        let mut unit = 0usize;
        for c in text.chars() {
            starts.push(unit);
            unit += c.len_utf16();
        }
        starts.push(unit);
        Self {
            starts,
            ascii_len: None,
        }
    }

    /// Char index for a UTF-16 offset. Offsets inside a surrogate pair round
    /// up to the next char; offsets past the end clamp to the char length.
    pub fn to_char(&self, units: usize) -> usize {
        if let Some(len) = self.ascii_len {
            return units.min(len);
        }
        self.starts
            .partition_point(|&start| start < units)
            .min(self.starts.len() - 1)
    }
}

/// Decode a `/v2/check` body for `text`.
pub fn decode_matches(text: &str, body: &str) -> Result<Vec<Match>, AnalysisError> {
    let response: WireResponse =
        serde_json::from_str(body).map_err(|e| AnalysisError::Malformed(e.to_string()))?;
    let Some(entries) = response.matches else {
        return Err(AnalysisError::Malformed("missing `matches`".into()));
    };

    let index = Utf16Index::new(text);
    let total = entries.len();
    let mut out = Vec::with_capacity(total);
    for entry in entries {
        let wire = match serde_json::from_value::<WireMatch>(entry) {
            Ok(w) => w,
            Err(err) => {
                debug!(target: "analysis.http", %err, "match_entry_undecodable");
                continue;
            }
        };
        if let Some(m) = convert(wire, &index) {
            out.push(m);
        }
    }
    if out.len() != total {
        debug!(
            target: "analysis.http",
            total,
            kept = out.len(),
            "match_entries_skipped"
        );
    }
    Ok(out)
}

fn convert(wire: WireMatch, index: &Utf16Index) -> Option<Match> {
    let offset = usize::try_from(wire.offset?).ok()?;
    let length = usize::try_from(wire.length?).ok()?;
    let start = index.to_char(offset);
    let end = index.to_char(offset.saturating_add(length));
    if end <= start {
        return None;
    }
    let mut m = Match::new(start, end - start, wire.message).with_replacements(
        wire.replacements
            .into_iter()
            .filter_map(|r| r.value),
    );
    m.short_message = wire.short_message.filter(|s| !s.is_empty());
    if let Some(rule) = wire.rule {
        m.rule_id = rule.id;
        m.issue_type = rule.issue_type.unwrap_or_default();
    }
    Some(m)
}
