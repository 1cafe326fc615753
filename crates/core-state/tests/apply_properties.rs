//! Applying a replacement keeps every surviving match pointing at the same text.

use core_model::{Match, MatchSource};
use core_state::{ApplyOutcome, Session};
use proptest::prelude::*;

/// Non-overlapping matches over a buffer of `len` chars, built from gaps and
/// lengths so they are valid by construction.
fn arb_layout() -> impl Strategy<Value = (String, Vec<Match>)> {
    prop::collection::vec((0usize..4, 1usize..5), 1..6).prop_map(|parts| {
        let mut text = String::new();
        let mut matches = Vec::new();
        let mut letter = b'a';
        for (gap, len) in parts {
            text.push_str(&" ".repeat(gap));
            let offset = text.chars().count();
            for _ in 0..len {
                text.push(letter as char);
            }
            letter = if letter == b'z' { b'a' } else { letter + 1 };
            matches.push(Match::new(offset, len, "m").with_replacements(["r"]));
        }
        text.push('.');
        (text, matches)
    })
}

proptest! {
    #[test]
    fn surviving_matches_cover_same_text((text, matches) in arb_layout(), pick in 0usize..6, repl in "[A-Z]{0,6}") {
        let pick = pick % matches.len();
        let mut session = Session::new(&text);
        session.replace_current(MatchSource::Remote, matches.clone());

        let before: Vec<String> = matches
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != pick)
            .map(|(_, m)| session.buffer().slice(m.offset, m.end()))
            .collect();

        let outcome = session.apply(pick, &repl);
        prop_assert!(matches!(outcome, ApplyOutcome::Applied(_)));

        let after: Vec<String> = session
            .matches()
            .iter()
            .map(|m| session.buffer().slice(m.offset, m.end()))
            .collect();
        prop_assert_eq!(before, after);
        prop_assert_eq!(session.selection(), None);
    }
}
