use core_model::{Match, MatchSource, SelectionRecovery};
use core_state::{ApplyOutcome, Session};
use core_text::SegmentKind;

fn m(offset: usize, length: usize, repl: &[&str]) -> Match {
    Match::new(offset, length, "issue")
        .with_issue_type("grammar")
        .with_replacements(repl.iter().copied())
}

#[test]
fn offset_shift_on_apply_matches_documented_example() {
    let mut s = Session::new("I has a pen.");
    s.replace_current(MatchSource::Remote, vec![m(2, 3, &["have"]), m(9, 3, &[])]);
    let out = s.apply(0, "have");
    match out {
        ApplyOutcome::Applied(report) => assert_eq!(report.delta, 1),
        other => panic!("expected apply, got {other:?}"),
    }
    assert_eq!(s.text(), "I have a pen.");
    assert_eq!(s.matches().len(), 1);
    assert_eq!(s.matches().get(0).unwrap().offset, 10);
}

#[test]
fn selection_invalidated_when_smaller_set_arrives() {
    let mut s = Session::new("one two three four");
    s.replace_current(
        MatchSource::Remote,
        vec![m(0, 3, &[]), m(4, 3, &[]), m(8, 5, &[])],
    );
    assert!(s.select(2));
    s.replace_current(MatchSource::Remote, vec![m(0, 3, &[])]);
    assert_ne!(s.selection(), Some(2));
    assert_eq!(s.selection(), None);
}

#[test]
fn first_recovery_policy_selects_index_zero() {
    let mut s = Session::new("one two three four").with_recovery(SelectionRecovery::First);
    s.replace_current(
        MatchSource::Remote,
        vec![m(0, 3, &[]), m(4, 3, &[]), m(8, 5, &[])],
    );
    s.select(2);
    s.replace_current(MatchSource::Fallback, vec![m(4, 3, &[])]);
    assert_eq!(s.selection(), Some(0));
    assert_eq!(s.selected_match().unwrap().offset, 4);
}

#[test]
fn overlapping_set_from_foreign_producer_survives_apply() {
    // Overlaps are not produced by the annotator, but an external set may carry them.
    let mut s = Session::new("hello world");
    s.replace_current(
        MatchSource::Remote,
        vec![m(0, 5, &["hi"]), m(3, 4, &[]), m(6, 5, &[])],
    );
    let segs = s.segments();
    assert_eq!(
        segs.iter()
            .filter(|seg| seg.kind == SegmentKind::Highlighted)
            .count(),
        2
    );
    assert!(s.apply_suggestion(0, 0).is_applied());
    assert_eq!(s.text(), "hi world");
    let offsets: Vec<_> = s.matches().iter().map(|m| m.offset).collect();
    assert_eq!(offsets, vec![3]);
}

#[test]
fn chained_applies_keep_consistency() {
    let mut s = Session::new("teh cat recieve teh mail");
    s.replace_current(
        MatchSource::Fallback,
        vec![
            m(0, 3, &["the"]),
            m(8, 7, &["receive"]),
            m(16, 3, &["the"]),
        ],
    );
    assert!(s.apply_suggestion(1, 0).is_applied());
    assert!(s.apply_suggestion(1, 0).is_applied());
    assert!(s.apply_suggestion(0, 0).is_applied());
    assert_eq!(s.text(), "the cat receive the mail");
    assert!(s.matches().is_empty());
    assert_eq!(s.apply(0, "x"), ApplyOutcome::IgnoredStale(core_state::StaleReason::IndexOutOfRange));
}
