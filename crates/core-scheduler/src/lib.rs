//! Request scheduling for background analysis.
//!
//! The scheduler lives on the event loop and never touches session state.
//! It turns a stream of buffer changes into at most one outstanding analysis
//! request:
//!
//! * `schedule` (re)starts a debounce timer. The timer task posts
//!   `AnalysisEvent::DebounceElapsed { ticket }`; only the newest ticket fires.
//! * `fire` tags the request with a fresh sequence number and cancels the
//!   previous one. Completion posts `AnalysisEvent::Completed { seq, .. }`.
//! * `accept` is the sequence guard: the loop applies a completion only when
//!   its `seq` is the one currently awaited.
//!
//! Failures never leave this crate: a failed request completes with the
//! local fallback set and `FallbackReason::Failed`. While the service is
//! offline `fire` skips the network and evaluates the fallback inline.

use core_analysis::{AnalysisClient, CheckRequest, FallbackHeuristic, HealthStatus};
use core_events::{
    ANALYSIS_FAILURES, ANALYSIS_REQUESTS_CANCELLED, ANALYSIS_REQUESTS_ISSUED,
    ANALYSIS_RESPONSES_DISCARDED, AnalysisEvent, AnalysisOutcome, Event, FallbackReason, bump,
    post,
};
use core_model::Generation;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::Sender;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(450);
pub const DEFAULT_MIN_LENGTH: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerConfig {
    pub debounce: Duration,
    /// Minimum count of non-whitespace chars worth analysing.
    pub min_length: usize,
    /// Locale code sent with every request (`auto` lets the service detect).
    pub language: String,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            debounce: DEFAULT_DEBOUNCE,
            min_length: DEFAULT_MIN_LENGTH,
            language: "auto".to_string(),
        }
    }
}

/// What `schedule` did with a buffer change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleOutcome {
    /// A debounce window is running; `ticket` identifies it.
    Scheduled { ticket: u64 },
    /// Same text and generation as the last call; nothing to do.
    Unchanged,
    /// Input below the minimum length; pending work was cancelled and the
    /// caller should clear its matches.
    Cleared,
}

/// What `fire` did with an elapsed debounce window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FireOutcome {
    /// The ticket was superseded or already consumed.
    Stale,
    /// A network request is in flight under `seq`.
    Requested { seq: u64 },
    /// Offline: the fallback ran inline. Feed it through `accept` like any
    /// other completion.
    Local {
        seq: u64,
        generation: Generation,
        outcome: AnalysisOutcome,
    },
}

#[derive(Debug)]
struct PendingCheck {
    ticket: u64,
    generation: Generation,
    text: String,
}

#[derive(Debug)]
struct InFlight {
    seq: u64,
    token: CancellationToken,
}

pub struct RequestScheduler<C: AnalysisClient> {
    client: Arc<C>,
    config: SchedulerConfig,
    tx: Sender<Event>,
    fallback: FallbackHeuristic,
    health: HealthStatus,
    next_ticket: u64,
    timer: Option<JoinHandle<()>>,
    pending: Option<PendingCheck>,
    seq: u64,
    /// Sequence number whose completion will be accepted, if any.
    awaiting: Option<u64>,
    in_flight: Option<InFlight>,
    last_scheduled: Option<(Generation, String)>,
}

impl<C: AnalysisClient> RequestScheduler<C> {
    pub fn new(client: Arc<C>, config: SchedulerConfig, tx: Sender<Event>) -> Self {
        Self {
            client,
            config,
            tx,
            fallback: FallbackHeuristic::new(),
            health: HealthStatus::Online,
            next_ticket: 0,
            timer: None,
            pending: None,
            seq: 0,
            awaiting: None,
            in_flight: None,
            last_scheduled: None,
        }
    }

    /// Start in `health` instead of the default online assumption.
    pub fn with_health(mut self, health: HealthStatus) -> Self {
        self.health = health;
        self
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn health(&self) -> HealthStatus {
        self.health
    }

    /// Current sequence number (the last one handed out by `fire`).
    pub fn seq(&self) -> u64 {
        self.seq
    }

    /// True while a debounce window is open or a completion is awaited.
    pub fn is_busy(&self) -> bool {
        self.pending.is_some() || self.awaiting.is_some()
    }

    /// React to a buffer change. Restarts the debounce window; never stacks
    /// timers. Outstanding requests for older text are cancelled right away.
    pub fn schedule(&mut self, generation: Generation, text: &str) -> ScheduleOutcome {
        if let Some((last_gen, last_text)) = &self.last_scheduled
            && *last_gen == generation
            && last_text == text
        {
            trace!(target: "analysis.scheduler", %generation, "schedule_unchanged");
            return ScheduleOutcome::Unchanged;
        }
        self.last_scheduled = Some((generation, text.to_string()));
        self.cancel();

        let significant = text.chars().filter(|c| !c.is_whitespace()).count();
        if significant < self.config.min_length {
            debug!(
                target: "analysis.scheduler",
                %generation,
                significant,
                min_length = self.config.min_length,
                "schedule_trivial_input"
            );
            return ScheduleOutcome::Cleared;
        }

        self.next_ticket += 1;
        let ticket = self.next_ticket;
        self.pending = Some(PendingCheck {
            ticket,
            generation,
            text: text.to_string(),
        });
        let tx = self.tx.clone();
        // The window opens now, not when the timer task is first polled.
        let deadline = tokio::time::Instant::now() + self.config.debounce;
        self.timer = Some(tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;
            post(&tx, Event::Analysis(AnalysisEvent::DebounceElapsed { ticket })).await;
        }));
        trace!(
            target: "analysis.scheduler",
            %generation,
            ticket,
            text_len = text.len(),
            "schedule_debounce"
        );
        ScheduleOutcome::Scheduled { ticket }
    }

    /// Debounce window `ticket` elapsed: issue the analysis.
    pub fn fire(&mut self, ticket: u64) -> FireOutcome {
        let Some(pending) = self.pending.take_if(|p| p.ticket == ticket) else {
            trace!(target: "analysis.scheduler", ticket, "fire_stale_ticket");
            return FireOutcome::Stale;
        };
        self.timer = None;
        self.cancel_in_flight();
        self.seq += 1;
        let seq = self.seq;
        self.awaiting = Some(seq);
        let PendingCheck {
            generation, text, ..
        } = pending;

        if !self.health.is_online() {
            let matches = self.fallback.check(&text);
            debug!(
                target: "analysis.scheduler",
                seq,
                %generation,
                matches = matches.len(),
                "fire_offline_fallback"
            );
            return FireOutcome::Local {
                seq,
                generation,
                outcome: AnalysisOutcome::Fallback {
                    matches,
                    reason: FallbackReason::Offline,
                },
            };
        }

        let token = CancellationToken::new();
        self.in_flight = Some(InFlight {
            seq,
            token: token.clone(),
        });
        bump(&ANALYSIS_REQUESTS_ISSUED);
        debug!(
            target: "analysis.scheduler",
            seq,
            %generation,
            text_len = text.len(),
            "fire_request"
        );

        let client = Arc::clone(&self.client);
        let tx = self.tx.clone();
        let fallback = self.fallback;
        let request = CheckRequest::new(text, self.config.language.clone());
        tokio::spawn(async move {
            let text = request.text.clone();
            let result = tokio::select! {
                biased;
                _ = token.cancelled() => {
                    bump(&ANALYSIS_REQUESTS_CANCELLED);
                    debug!(target: "analysis.scheduler", seq, "request_cancelled");
                    return;
                }
                result = client.check(request) => result,
            };
            let outcome = match result {
                Ok(matches) => AnalysisOutcome::Matches(matches),
                Err(err) => {
                    bump(&ANALYSIS_FAILURES);
                    warn!(target: "analysis.scheduler", seq, error = %err, "request_failed");
                    AnalysisOutcome::Fallback {
                        matches: fallback.check(&text),
                        reason: FallbackReason::Failed(err.to_string()),
                    }
                }
            };
            post(
                &tx,
                Event::Analysis(AnalysisEvent::Completed {
                    seq,
                    generation,
                    outcome,
                }),
            )
            .await;
        });
        FireOutcome::Requested { seq }
    }

    /// Sequence guard. True when the completion tagged `seq` is the one
    /// awaited; the caller may then apply it. Anything else is dropped.
    pub fn accept(&mut self, seq: u64) -> bool {
        if self.awaiting == Some(seq) {
            self.awaiting = None;
            self.in_flight = None;
            return true;
        }
        bump(&ANALYSIS_RESPONSES_DISCARDED);
        debug!(
            target: "analysis.scheduler",
            seq,
            current = self.seq,
            "response_discarded"
        );
        false
    }

    /// Switch mode and re-evaluate `text` even if it was already scheduled.
    pub fn on_health_changed(
        &mut self,
        status: HealthStatus,
        generation: Generation,
        text: &str,
    ) -> ScheduleOutcome {
        debug!(
            target: "analysis.scheduler",
            from = self.health.as_str(),
            to = status.as_str(),
            "health_mode_changed"
        );
        self.health = status;
        self.last_scheduled = None;
        self.schedule(generation, text)
    }

    /// Drop the open debounce window and any outstanding request.
    pub fn cancel(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
        self.pending = None;
        self.awaiting = None;
        self.cancel_in_flight();
    }

    fn cancel_in_flight(&mut self) {
        if let Some(prev) = self.in_flight.take() {
            trace!(target: "analysis.scheduler", seq = prev.seq, "cancel_in_flight");
            prev.token.cancel();
        }
    }
}

impl<C: AnalysisClient> Drop for RequestScheduler<C> {
    fn drop(&mut self) {
        self.cancel();
    }
}
