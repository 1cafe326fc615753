//! Timing behaviour of the scheduler under a paused tokio clock. The test
//! body plays the role of the event loop.

use core_analysis::{AnalysisClient, AnalysisError, CheckRequest, HealthStatus};
use core_events::{AnalysisEvent, AnalysisOutcome, Event, FallbackReason};
use core_model::{Generation, Match};
use core_scheduler::{FireOutcome, RequestScheduler, ScheduleOutcome, SchedulerConfig};
use pretty_assertions::assert_eq;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{advance, timeout};

/// Records every request and answers from a per-text script.
#[derive(Default)]
struct ScriptedClient {
    calls: Mutex<Vec<String>>,
    delays: Mutex<HashMap<String, Duration>>,
    failures: Mutex<HashMap<String, AnalysisError>>,
}

impl ScriptedClient {
    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn delay(&self, text: &str, delay: Duration) {
        self.delays.lock().unwrap().insert(text.to_string(), delay);
    }

    fn fail(&self, text: &str, err: AnalysisError) {
        self.failures.lock().unwrap().insert(text.to_string(), err);
    }
}

impl AnalysisClient for ScriptedClient {
    async fn check(&self, request: CheckRequest) -> Result<Vec<Match>, AnalysisError> {
        self.calls.lock().unwrap().push(request.text.clone());
        let delay = self.delays.lock().unwrap().get(&request.text).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let failure = self.failures.lock().unwrap().get(&request.text).cloned();
        if let Some(err) = failure {
            return Err(err);
        }
        // One match over the whole first word, tagged with the text length so
        // tests can tell responses apart.
        let first = request.text.split_whitespace().next().unwrap_or_default();
        let m = Match::new(0, first.chars().count(), format!("len {}", request.text.len()))
            .with_issue_type("grammar");
        Ok(vec![m])
    }

    async fn probe(&self) -> HealthStatus {
        HealthStatus::Online
    }
}

fn setup() -> (
    Arc<ScriptedClient>,
    RequestScheduler<ScriptedClient>,
    mpsc::Receiver<Event>,
) {
    let client = Arc::new(ScriptedClient::default());
    let (tx, rx) = mpsc::channel(64);
    let scheduler = RequestScheduler::new(client.clone(), SchedulerConfig::default(), tx);
    (client, scheduler, rx)
}

async fn next_event(rx: &mut mpsc::Receiver<Event>) -> AnalysisEvent {
    match timeout(Duration::from_secs(30), rx.recv()).await {
        Ok(Some(Event::Analysis(ev))) => ev,
        other => panic!("expected analysis event, got {other:?}"),
    }
}

async fn expect_debounce(rx: &mut mpsc::Receiver<Event>) -> u64 {
    match next_event(rx).await {
        AnalysisEvent::DebounceElapsed { ticket } => ticket,
        other => panic!("expected debounce, got {other:?}"),
    }
}

async fn expect_completed(rx: &mut mpsc::Receiver<Event>) -> (u64, Generation, AnalysisOutcome) {
    match next_event(rx).await {
        AnalysisEvent::Completed {
            seq,
            generation,
            outcome,
        } => (seq, generation, outcome),
        other => panic!("expected completion, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn rapid_edits_coalesce_into_one_request() {
    let (client, mut scheduler, mut rx) = setup();
    let edits = ["The c", "The ca", "The cat", "The cat i", "The cat is"];
    let mut generation = Generation::INITIAL;
    for text in edits {
        generation = generation.next();
        scheduler.schedule(generation, text);
        advance(Duration::from_millis(20)).await;
    }

    let ticket = expect_debounce(&mut rx).await;
    let FireOutcome::Requested { seq } = scheduler.fire(ticket) else {
        panic!("expected a network request");
    };
    let (done_seq, done_gen, outcome) = expect_completed(&mut rx).await;
    assert_eq!(done_seq, seq);
    assert_eq!(done_gen, generation);
    assert!(scheduler.accept(done_seq));
    assert!(matches!(outcome, AnalysisOutcome::Matches(_)));

    assert_eq!(client.calls(), vec!["The cat is".to_string()]);
    // The earlier windows never fire.
    assert!(timeout(Duration::from_secs(2), rx.recv()).await.is_err());
}

#[tokio::test(start_paused = true)]
async fn debounce_window_restarts_on_each_edit() {
    let (_client, mut scheduler, mut rx) = setup();
    scheduler.schedule(Generation(1), "first draft");
    advance(Duration::from_millis(300)).await;
    scheduler.schedule(Generation(2), "first draft.");
    advance(Duration::from_millis(300)).await;
    assert!(rx.try_recv().is_err(), "window should have been reset");

    advance(Duration::from_millis(200)).await;
    let ticket = expect_debounce(&mut rx).await;
    assert!(matches!(scheduler.fire(ticket), FireOutcome::Requested { .. }));
}

#[tokio::test(start_paused = true)]
async fn edit_during_request_cancels_it() {
    let (client, mut scheduler, mut rx) = setup();
    client.delay("slow request", Duration::from_secs(2));

    scheduler.schedule(Generation(1), "slow request");
    let ticket = expect_debounce(&mut rx).await;
    assert_eq!(scheduler.fire(ticket), FireOutcome::Requested { seq: 1 });
    tokio::time::sleep(Duration::from_millis(100)).await;

    scheduler.schedule(Generation(2), "fast request");
    let ticket = expect_debounce(&mut rx).await;
    assert_eq!(scheduler.fire(ticket), FireOutcome::Requested { seq: 2 });

    let (seq, generation, outcome) = expect_completed(&mut rx).await;
    assert_eq!((seq, generation), (2, Generation(2)));
    assert!(scheduler.accept(seq));
    assert_eq!(outcome.matches()[0].message, "len 12");

    // The cancelled request posts nothing, even after its delay.
    assert!(timeout(Duration::from_secs(5), rx.recv()).await.is_err());
    assert_eq!(
        client.calls(),
        vec!["slow request".to_string(), "fast request".to_string()]
    );
}

#[tokio::test(start_paused = true)]
async fn late_completion_is_discarded_by_sequence() {
    let (_client, mut scheduler, mut rx) = setup();

    scheduler.schedule(Generation(1), "response A");
    let ticket = expect_debounce(&mut rx).await;
    scheduler.fire(ticket);
    // A completes, but the loop handles an edit before it gets to it.
    let (stale_seq, _, _) = expect_completed(&mut rx).await;

    scheduler.schedule(Generation(2), "response B!");
    let ticket = expect_debounce(&mut rx).await;
    scheduler.fire(ticket);
    let (fresh_seq, generation, outcome) = expect_completed(&mut rx).await;

    assert!(!scheduler.accept(stale_seq));
    assert!(scheduler.accept(fresh_seq));
    assert_eq!(generation, Generation(2));
    assert_eq!(outcome.matches()[0].message, "len 11");
}

#[tokio::test(start_paused = true)]
async fn trivial_input_issues_nothing() {
    let (client, mut scheduler, mut rx) = setup();
    assert_eq!(scheduler.schedule(Generation(1), " hi "), ScheduleOutcome::Cleared);
    assert_eq!(scheduler.schedule(Generation(2), ""), ScheduleOutcome::Cleared);
    assert!(timeout(Duration::from_secs(2), rx.recv()).await.is_err());
    assert!(client.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn failure_completes_with_fallback() {
    let (client, mut scheduler, mut rx) = setup();
    client.fail("I has a pen.", AnalysisError::Status(503));

    scheduler.schedule(Generation(1), "I has a pen.");
    let ticket = expect_debounce(&mut rx).await;
    scheduler.fire(ticket);
    let (seq, _, outcome) = expect_completed(&mut rx).await;
    assert!(scheduler.accept(seq));

    let AnalysisOutcome::Fallback { matches, reason } = outcome else {
        panic!("expected fallback outcome");
    };
    assert_eq!(
        reason,
        FallbackReason::Failed("service returned status 503".to_string())
    );
    assert_eq!((matches[0].offset, matches[0].length), (2, 3));
    assert_eq!(matches[0].replacements, vec!["have".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn offline_mode_stays_local() {
    let (client, mut scheduler, mut rx) = setup();
    let outcome = scheduler.on_health_changed(HealthStatus::Offline, Generation(4), "I has a pen.");
    assert!(matches!(outcome, ScheduleOutcome::Scheduled { .. }));

    let ticket = expect_debounce(&mut rx).await;
    let FireOutcome::Local {
        seq,
        generation,
        outcome,
    } = scheduler.fire(ticket)
    else {
        panic!("expected local evaluation");
    };
    assert_eq!(generation, Generation(4));
    assert!(scheduler.accept(seq));
    assert!(matches!(
        outcome,
        AnalysisOutcome::Fallback {
            reason: FallbackReason::Offline,
            ..
        }
    ));
    assert!(client.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn health_change_forces_reevaluation() {
    let (client, mut scheduler, mut rx) = setup();
    scheduler = scheduler.with_health(HealthStatus::Offline);
    scheduler.schedule(Generation(1), "We was late.");
    let ticket = expect_debounce(&mut rx).await;
    assert!(matches!(scheduler.fire(ticket), FireOutcome::Local { .. }));

    // Same text and generation, but the mode changed.
    let outcome = scheduler.on_health_changed(HealthStatus::Online, Generation(1), "We was late.");
    assert!(matches!(outcome, ScheduleOutcome::Scheduled { .. }));
    let ticket = expect_debounce(&mut rx).await;
    assert!(matches!(scheduler.fire(ticket), FireOutcome::Requested { .. }));
    let (seq, _, _) = expect_completed(&mut rx).await;
    assert!(scheduler.accept(seq));
    assert_eq!(client.calls(), vec!["We was late.".to_string()]);
}
