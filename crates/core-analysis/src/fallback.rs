//! Local, deterministic suggestions used while the service is unavailable.
//!
//! A handful of pattern rules over the raw text. Output follows the same
//! contract as the remote service: char offsets, positive lengths, sorted by
//! offset, and non-overlapping (earlier offset wins, ties go to the rule
//! listed first).

use core_events::{FALLBACK_RUNS, bump};
use core_model::Match;
use regex::Regex;
use std::sync::LazyLock;
use tracing::trace;

static MISSPELLING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(teh|recieve|recieved|definately|seperate|alot|occured|untill|wich)\b")
        .expect("valid misspelling regex")
});
static FIRST_PERSON_HAS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(?:I|[Yy]ou|[Ww]e|[Tt]hey)\s+(has)\b").expect("valid has regex"));
static THIRD_PERSON_HAVE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:[Hh]e|[Ss]he|[Ii]t)\s+(have)\b").expect("valid have regex")
});
static PLURAL_WAS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:[Yy]ou|[Ww]e|[Tt]hey)\s+(was)\b").expect("valid was regex")
});
static LOWERCASE_I: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:^|[^\w'])(i)(?:[^\w']|$)").expect("valid pronoun regex"));
static SPACE_BEFORE_PUNCT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\w( +)[,.;:!?]").expect("valid punctuation regex"));
static MULTIPLE_SPACES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\S( {2,})\S").expect("valid spacing regex"));
static WORD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\w+").expect("valid word regex"));

/// Byte range plus the suggestion built for it.
struct Hit {
    start: usize,
    end: usize,
    template: &'static Template,
    replacements: Vec<String>,
}

struct Template {
    rule_id: &'static str,
    issue_type: &'static str,
    message: &'static str,
    short_message: &'static str,
}

const T_MISSPELLING: Template = Template {
    rule_id: "FALLBACK_MISSPELLING",
    issue_type: "misspelling",
    message: "Possible spelling mistake found.",
    short_message: "Spelling mistake",
};
const T_AGREEMENT: Template = Template {
    rule_id: "FALLBACK_AGREEMENT",
    issue_type: "grammar",
    message: "The verb does not agree with its subject.",
    short_message: "Agreement error",
};
const T_PRONOUN_I: Template = Template {
    rule_id: "FALLBACK_LOWERCASE_I",
    issue_type: "typographical",
    message: "The pronoun 'I' is always capitalized.",
    short_message: "Capitalization",
};
const T_DUPLICATE: Template = Template {
    rule_id: "FALLBACK_WORD_REPEAT",
    issue_type: "duplication",
    message: "Possible typo: you repeated a word.",
    short_message: "Word repetition",
};
const T_PUNCT_SPACE: Template = Template {
    rule_id: "FALLBACK_SPACE_BEFORE_PUNCTUATION",
    issue_type: "whitespace",
    message: "Don't put a space before punctuation.",
    short_message: "Whitespace",
};
const T_SPACES: Template = Template {
    rule_id: "FALLBACK_MULTIPLE_SPACES",
    issue_type: "style",
    message: "Multiple consecutive spaces.",
    short_message: "Whitespace",
};

/// Deterministic rule set; cheap to construct and clone.
#[derive(Debug, Clone, Copy, Default)]
pub struct FallbackHeuristic;

impl FallbackHeuristic {
    pub fn new() -> Self {
        FallbackHeuristic
    }

    /// Run every rule over `text`.
    pub fn check(&self, text: &str) -> Vec<Match> {
        bump(&FALLBACK_RUNS);
        let mut hits = Vec::new();
        misspellings(text, &mut hits);
        agreement(text, &mut hits);
        lowercase_i(text, &mut hits);
        repeated_words(text, &mut hits);
        group_hits(
            text,
            &SPACE_BEFORE_PUNCT,
            &T_PUNCT_SPACE,
            |_| vec![String::new()],
            &mut hits,
        );
        group_hits(
            text,
            &MULTIPLE_SPACES,
            &T_SPACES,
            |_| vec![" ".to_string()],
            &mut hits,
        );

        // Stable sort keeps rule order for ties.
        hits.sort_by_key(|h| h.start);
        let chars = CharOffsets::new(text);
        let mut out = Vec::with_capacity(hits.len());
        let mut cursor = 0usize;
        for hit in hits {
            if hit.start < cursor || hit.end <= hit.start {
                continue;
            }
            cursor = hit.end;
            let start = chars.char_at(hit.start);
            let end = chars.char_at(hit.end);
            out.push(
                Match::new(start, end - start, hit.template.message)
                    .with_short_message(hit.template.short_message)
                    .with_issue_type(hit.template.issue_type)
                    .with_rule_id(hit.template.rule_id)
                    .with_replacements(hit.replacements),
            );
        }
        trace!(target: "analysis.fallback", text_len = text.len(), matches = out.len(), "fallback_check");
        out
    }
}

fn group_hits(
    text: &str,
    re: &Regex,
    template: &'static Template,
    suggest: impl Fn(&str) -> Vec<String>,
    hits: &mut Vec<Hit>,
) {
    // Context around group 1 is consumed by the regex, so `captures_iter`
    // would miss a hit sharing a delimiter with the previous one (`i i`,
    // `a  b  c`). Restart right after each group instead.
    let mut at = 0usize;
    while at <= text.len() {
        let Some(caps) = re.captures_at(text, at) else {
            break;
        };
        let Some(g) = caps.get(1) else { break };
        hits.push(Hit {
            start: g.start(),
            end: g.end(),
            template,
            replacements: suggest(g.as_str()),
        });
        if g.end() <= at {
            break;
        }
        at = g.end();
    }
}

fn misspellings(text: &str, hits: &mut Vec<Hit>) {
    let suggest = |word: &str| {
        let fixed = match word.to_ascii_lowercase().as_str() {
            "teh" => "the",
            "recieve" => "receive",
            "recieved" => "received",
            "definately" => "definitely",
            "seperate" => "separate",
            "alot" => "a lot",
            "occured" => "occurred",
            "untill" => "until",
            "wich" => "which",
            _ => return Vec::new(),
        };
        vec![match_case(word, fixed)]
    };
    group_hits(text, &MISSPELLING, &T_MISSPELLING, suggest, hits);
}

fn agreement(text: &str, hits: &mut Vec<Hit>) {
    group_hits(text, &FIRST_PERSON_HAS, &T_AGREEMENT, |_| vec!["have".into()], hits);
    group_hits(text, &THIRD_PERSON_HAVE, &T_AGREEMENT, |_| vec!["has".into()], hits);
    group_hits(text, &PLURAL_WAS, &T_AGREEMENT, |_| vec!["were".into()], hits);
}

fn lowercase_i(text: &str, hits: &mut Vec<Hit>) {
    group_hits(text, &LOWERCASE_I, &T_PRONOUN_I, |_| vec!["I".into()], hits);
}

fn repeated_words(text: &str, hits: &mut Vec<Hit>) {
    let mut prev: Option<regex::Match<'_>> = None;
    for word in WORD.find_iter(text) {
        if let Some(p) = prev {
            let gap = &text[p.end()..word.start()];
            let only_spaces = !gap.is_empty() && gap.chars().all(|c| c == ' ' || c == '\t');
            if only_spaces
                && p.as_str().eq_ignore_ascii_case(word.as_str())
                && word.as_str().chars().any(char::is_alphabetic)
            {
                // Cover the gap plus the duplicate so removing it keeps one space.
                hits.push(Hit {
                    start: p.end(),
                    end: word.end(),
                    template: &T_DUPLICATE,
                    replacements: vec![String::new()],
                });
            }
        }
        prev = Some(word);
    }
}

/// Copy the capitalization of `original`'s first letter onto `fixed`.
fn match_case(original: &str, fixed: &str) -> String {
    let upper = original.chars().next().is_some_and(char::is_uppercase);
    if !upper {
        return fixed.to_string();
    }
    let mut chars = fixed.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Byte offset -> char offset lookup for one text.
struct CharOffsets {
    /// Byte offset of each char boundary, including the end.
    boundaries: Vec<usize>,
}

impl CharOffsets {
    fn new(text: &str) -> Self {
        let mut boundaries: Vec<usize> = text.char_indices().map(|(b, _)| b).collect();
        boundaries.push(text.len());
        Self { boundaries }
    }

    fn char_at(&self, byte: usize) -> usize {
        self.boundaries.partition_point(|&b| b < byte)
    }
}
