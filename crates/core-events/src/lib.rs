//! Core event types and async event sources for Redline.
//!
//! Every producer (stdin edits, debounce timers, analysis requests, the health
//! probe, the tick) posts an `Event` into one bounded channel. The runtime loop
//! is the only consumer and the only owner of session state, so event order is
//! the order in which state changes.

use core_model::{Generation, Match};
use std::sync::atomic::AtomicU64;
use tokio::sync::mpsc::Sender;
use tokio::task::JoinHandle;

// -------------------------------------------------------------------------------------------------
// Channel Policy
// -------------------------------------------------------------------------------------------------
// Bounded mpsc sized by `EVENT_CHANNEL_CAP`. Producers `send().await`, so a slow loop applies
// backpressure instead of dropping edits. Completions and timer fires are tiny and infrequent
// compared with the capacity.
// -------------------------------------------------------------------------------------------------
pub const EVENT_CHANNEL_CAP: usize = 1024;

// -------------------------------------------------------------------------------------------------
// Telemetry
// -------------------------------------------------------------------------------------------------
// Relaxed atomic counters; logged at shutdown and inspected in tests.
// -------------------------------------------------------------------------------------------------
pub static CHANNEL_SEND_FAILURES: AtomicU64 = AtomicU64::new(0);
pub static ANALYSIS_REQUESTS_ISSUED: AtomicU64 = AtomicU64::new(0);
pub static ANALYSIS_REQUESTS_CANCELLED: AtomicU64 = AtomicU64::new(0);
pub static ANALYSIS_RESPONSES_DISCARDED: AtomicU64 = AtomicU64::new(0); // stale seq
pub static ANALYSIS_FAILURES: AtomicU64 = AtomicU64::new(0);
pub static FALLBACK_RUNS: AtomicU64 = AtomicU64::new(0);
pub static STALE_ACTIONS_IGNORED: AtomicU64 = AtomicU64::new(0);
pub static HEALTH_TRANSITIONS: AtomicU64 = AtomicU64::new(0);

/// Point-in-time copy of the telemetry counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TelemetrySnapshot {
    pub requests_issued: u64,
    pub requests_cancelled: u64,
    pub responses_discarded: u64,
    pub failures: u64,
    pub fallback_runs: u64,
    pub stale_actions: u64,
    pub health_transitions: u64,
}

pub fn telemetry_snapshot() -> TelemetrySnapshot {
    use std::sync::atomic::Ordering::Relaxed;
    TelemetrySnapshot {
        requests_issued: ANALYSIS_REQUESTS_ISSUED.load(Relaxed),
        requests_cancelled: ANALYSIS_REQUESTS_CANCELLED.load(Relaxed),
        responses_discarded: ANALYSIS_RESPONSES_DISCARDED.load(Relaxed),
        failures: ANALYSIS_FAILURES.load(Relaxed),
        fallback_runs: FALLBACK_RUNS.load(Relaxed),
        stale_actions: STALE_ACTIONS_IGNORED.load(Relaxed),
        health_transitions: HEALTH_TRANSITIONS.load(Relaxed),
    }
}

#[inline]
pub fn bump(counter: &AtomicU64) {
    counter.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
}

/// Top-level event enum consumed by the central event loop.
#[derive(Debug, Clone)]
pub enum Event {
    Edit(EditEvent),
    Command(CommandEvent),
    Analysis(AnalysisEvent),
    /// Health transition reported by the probe source (never repeats a status).
    Health(HealthStatus),
    /// Periodic monotonic tick used for lightweight housekeeping.
    Tick,
    Shutdown,
}

/// User edits to the buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditEvent {
    /// Replace the whole buffer.
    Replace(String),
    /// Append text at the end of the buffer.
    Append(String),
    /// Replace the char range `[start, end)` with `text`.
    Splice {
        start: usize,
        end: usize,
        text: String,
    },
}

/// User commands addressing the match list and selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandEvent {
    /// Select a match from the list view.
    Select(usize),
    /// Click at a char position in the rendered buffer.
    Click(usize),
    SelectNext,
    SelectPrev,
    /// Apply candidate `choice` of match `index`.
    Apply { index: usize, choice: usize },
    /// Apply free text to match `index`.
    ApplyText { index: usize, text: String },
    Show,
    Quit,
    /// A line that did not parse; carries the message shown to the user.
    Invalid(String),
}

/// Scheduler round-trips. Timers and requests run as background tasks and
/// report back here so session state is only touched by the loop.
#[derive(Debug, Clone)]
pub enum AnalysisEvent {
    /// The debounce window identified by `ticket` elapsed without a newer edit.
    DebounceElapsed { ticket: u64 },
    /// A request tagged with `seq` settled.
    Completed {
        seq: u64,
        generation: Generation,
        outcome: AnalysisOutcome,
    },
}

/// Settled result of one analysis pass. Failures are already absorbed into a
/// fallback set by the time this is produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnalysisOutcome {
    Matches(Vec<Match>),
    Fallback {
        matches: Vec<Match>,
        reason: FallbackReason,
    },
}

impl AnalysisOutcome {
    pub fn matches(&self) -> &[Match] {
        match self {
            AnalysisOutcome::Matches(m) => m,
            AnalysisOutcome::Fallback { matches, .. } => matches,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FallbackReason {
    /// The health monitor reported the service offline; no request was made.
    Offline,
    /// The request failed (transport, status, malformed payload).
    Failed(String),
}

/// Reachability of the external analysis service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HealthStatus {
    Online,
    Offline,
}

impl HealthStatus {
    pub fn is_online(&self) -> bool {
        matches!(self, HealthStatus::Online)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HealthStatus::Online => "online",
            HealthStatus::Offline => "offline",
        }
    }
}

// -------------------------------------------------------------------------------------------------
// Async Event Sources
// -------------------------------------------------------------------------------------------------
// Long-lived producers (tick, health probe, stdin) register uniformly. Each source owns its task;
// on channel send failure (consumer dropped) it must terminate promptly.
// -------------------------------------------------------------------------------------------------

/// Trait implemented by any async event producer. Implementors usually hold configuration and
/// spawn one background task that pushes `Event`s into the shared channel.
pub trait AsyncEventSource: Send + 'static {
    /// Human-readable stable identifier (used for logging / diagnostics).
    fn name(&self) -> &'static str;
    /// Consume self and spawn the background task, returning a JoinHandle. Implementors should
    /// stop when `tx.send(..).await` returns Err (channel closed) or on their own internal stop
    /// condition.
    fn spawn(self: Box<Self>, tx: Sender<Event>) -> JoinHandle<()>;
}

/// Registry of event sources spawned together at startup.
pub struct EventSourceRegistry {
    sources: Vec<Box<dyn AsyncEventSource>>,
}

impl Default for EventSourceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSourceRegistry {
    pub fn new() -> Self {
        Self {
            sources: Vec::new(),
        }
    }

    pub fn register<S: AsyncEventSource>(&mut self, src: S) {
        self.sources.push(Box::new(src));
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Spawn all registered sources, returning their JoinHandles. Each source receives its own
    /// `Sender` clone; the caller drops its final clone during shutdown so sources observe the
    /// closed channel and exit cooperatively.
    pub fn spawn_all(&mut self, tx: &Sender<Event>) -> Vec<JoinHandle<()>> {
        let mut out = Vec::with_capacity(self.sources.len());
        for src in self.sources.drain(..) {
            let name = src.name();
            tracing::info!(target: "runtime.events", source = name, "spawning event source");
            out.push(src.spawn(tx.clone()));
        }
        out
    }
}

/// Built-in monotonic tick source. Emits `Event::Tick` every configured interval.
pub struct TickEventSource {
    interval: std::time::Duration,
}

impl TickEventSource {
    pub fn new(interval: std::time::Duration) -> Self {
        Self { interval }
    }
}

impl AsyncEventSource for TickEventSource {
    fn name(&self) -> &'static str {
        "tick"
    }

    fn spawn(self: Box<Self>, tx: Sender<Event>) -> JoinHandle<()> {
        let dur = self.interval;
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(dur);
            loop {
                tokio::select! {
                    _ = interval.tick() => {}
                    _ = tx.closed() => break,
                }
                if !post(&tx, Event::Tick).await {
                    break;
                }
            }
        })
    }
}

/// Send helper shared by background tasks: counts failures instead of
/// propagating them (a closed channel means the loop is shutting down).
pub async fn post(tx: &Sender<Event>, event: Event) -> bool {
    if tx.send(event).await.is_err() {
        bump(&CHANNEL_SEND_FAILURES);
        return false;
    }
    true
}

#[cfg(test)]
mod tests_async_sources {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;
    use tokio::sync::mpsc;

    struct MockOnceSource;

    impl AsyncEventSource for MockOnceSource {
        fn name(&self) -> &'static str {
            "mock_once"
        }
        fn spawn(self: Box<Self>, tx: Sender<Event>) -> JoinHandle<()> {
            tokio::spawn(async move {
                let _ = tx.send(Event::Edit(EditEvent::Replace("x".into()))).await;
            })
        }
    }

    #[tokio::test]
    async fn registry_spawns_and_emits() {
        let (tx, mut rx) = mpsc::channel::<Event>(8);
        let mut reg = EventSourceRegistry::new();
        reg.register(MockOnceSource);
        reg.register(TickEventSource::new(Duration::from_millis(10)));
        assert_eq!(reg.len(), 2);
        let handles = reg.spawn_all(&tx);
        assert!(reg.is_empty(), "spawn_all drains the registry");

        let mut got_edit = false;
        let mut got_tick = false;
        let start = std::time::Instant::now();
        while start.elapsed() < Duration::from_millis(200) && (!got_edit || !got_tick) {
            if let Ok(Some(ev)) = tokio::time::timeout(Duration::from_millis(5), rx.recv()).await {
                match ev {
                    Event::Edit(_) => got_edit = true,
                    Event::Tick => got_tick = true,
                    _ => {}
                }
            }
        }
        assert!(got_edit, "expected mock source to produce an edit");
        assert!(got_tick, "expected tick source to emit tick events");

        drop(tx);
        drop(rx);
        for handle in handles {
            let _ = tokio::time::timeout(Duration::from_millis(20), handle).await;
        }
    }

    struct MockCloseSource {
        flag: Arc<AtomicBool>,
    }

    impl AsyncEventSource for MockCloseSource {
        fn name(&self) -> &'static str {
            "mock_close"
        }

        fn spawn(self: Box<Self>, tx: Sender<Event>) -> JoinHandle<()> {
            let flag = self.flag;
            tokio::spawn(async move {
                tx.closed().await;
                flag.store(true, Ordering::SeqCst);
            })
        }
    }

    #[tokio::test]
    async fn registry_sources_exit_on_channel_drop() {
        let (tx, rx) = mpsc::channel::<Event>(8);
        let mut reg = EventSourceRegistry::new();
        let flag = Arc::new(AtomicBool::new(false));
        reg.register(MockCloseSource { flag: flag.clone() });
        let handles = reg.spawn_all(&tx);

        drop(tx);
        drop(rx);

        for handle in handles {
            match tokio::time::timeout(Duration::from_millis(50), handle).await {
                Ok(join_res) => join_res.expect("source task should exit cleanly"),
                Err(_) => panic!("source task did not observe channel closure"),
            }
        }

        assert!(flag.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn post_counts_closed_channel() {
        let (tx, rx) = mpsc::channel::<Event>(1);
        drop(rx);
        let before = CHANNEL_SEND_FAILURES.load(Ordering::Relaxed);
        assert!(!post(&tx, Event::Tick).await);
        assert!(CHANNEL_SEND_FAILURES.load(Ordering::Relaxed) > before);
    }
}
