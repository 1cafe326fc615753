//! The event loop. Owns the session and the scheduler; everything else only
//! posts events.

use crate::render::{Frame, render};
use core_analysis::{AnalysisClient, HealthStatus};
use core_events::{
    AnalysisEvent, AnalysisOutcome, CommandEvent, EditEvent, Event, FallbackReason,
    telemetry_snapshot,
};
use core_input::InputShutdown;
use core_model::{Generation, MatchSet, MatchSource};
use core_scheduler::{FireOutcome, RequestScheduler, ScheduleOutcome};
use core_state::{AnalysisStatus, ApplyOutcome, Session};
use std::fmt;
use std::io::Write;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LoopControl {
    Continue { redraw: bool },
    Break { reason: ShutdownReason },
}

impl LoopControl {
    const REDRAW: LoopControl = LoopControl::Continue { redraw: true };
    const QUIET: LoopControl = LoopControl::Continue { redraw: false };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ShutdownReason {
    CommandQuit,
    EndOfInput,
    ChannelClosed,
}

impl ShutdownReason {
    fn as_str(&self) -> &'static str {
        match self {
            ShutdownReason::CommandQuit => "command_quit",
            ShutdownReason::EndOfInput => "end_of_input",
            ShutdownReason::ChannelClosed => "channel_closed",
        }
    }
}

impl fmt::Display for ShutdownReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn log_shutdown_stage(reason: ShutdownReason, stage: &'static str) {
    info!(
        target: "runtime.shutdown",
        reason = reason.as_str(),
        stage = stage,
        "shutdown_stage"
    );
}

pub(crate) struct Runtime<C: AnalysisClient, W: Write> {
    session: Session,
    scheduler: RequestScheduler<C>,
    health: HealthStatus,
    notice: Option<String>,
    out: W,
    color: bool,
    rx: mpsc::Receiver<Event>,
    source_handles: Vec<JoinHandle<()>>,
    input_shutdown: Option<InputShutdown>,
}

impl<C: AnalysisClient, W: Write> Runtime<C, W> {
    pub(crate) fn new(
        session: Session,
        scheduler: RequestScheduler<C>,
        rx: mpsc::Receiver<Event>,
        out: W,
        color: bool,
    ) -> Self {
        let health = scheduler.health();
        Self {
            session,
            scheduler,
            health,
            notice: None,
            out,
            color,
            rx,
            source_handles: Vec::new(),
            input_shutdown: None,
        }
    }

    pub(crate) fn with_sources(
        mut self,
        handles: Vec<JoinHandle<()>>,
        input_shutdown: InputShutdown,
    ) -> Self {
        self.source_handles = handles;
        self.input_shutdown = Some(input_shutdown);
        self
    }

    pub(crate) async fn run(&mut self) -> anyhow::Result<()> {
        self.reschedule();
        self.redraw()?;

        let mut shutdown_reason = ShutdownReason::ChannelClosed;
        while let Some(event) = self.rx.recv().await {
            match self.handle(event) {
                LoopControl::Break { reason } => {
                    shutdown_reason = reason;
                    break;
                }
                LoopControl::Continue { redraw: true } => self.redraw()?,
                LoopControl::Continue { redraw: false } => {}
            }
        }

        self.rx.close();
        self.finalize_shutdown(shutdown_reason).await;
        Ok(())
    }

    pub(crate) fn handle(&mut self, event: Event) -> LoopControl {
        match event {
            Event::Edit(edit) => self.handle_edit(edit),
            Event::Command(command) => self.handle_command(command),
            Event::Analysis(analysis) => self.handle_analysis(analysis),
            Event::Health(status) => self.handle_health(status),
            Event::Tick => self.handle_tick(),
            Event::Shutdown => LoopControl::Break {
                reason: ShutdownReason::EndOfInput,
            },
        }
    }

    fn handle_edit(&mut self, edit: EditEvent) -> LoopControl {
        let changed = match &edit {
            EditEvent::Replace(text) => self.session.set_text(text),
            EditEvent::Append(text) => self.session.append(text),
            EditEvent::Splice { start, end, text } => self.session.edit(*start, *end, text),
        };
        if changed.is_none() {
            self.notice = Some("buffer unchanged".to_string());
            return LoopControl::REDRAW;
        }
        self.reschedule();
        LoopControl::REDRAW
    }

    fn handle_command(&mut self, command: CommandEvent) -> LoopControl {
        match command {
            CommandEvent::Select(index) => {
                if !self.session.select(index) {
                    self.notice = Some(format!("no match {index}"));
                }
            }
            CommandEvent::Click(pos) => {
                if self.session.click_at(pos).is_none() {
                    self.notice = Some(format!("nothing selected at {pos}"));
                }
            }
            CommandEvent::SelectNext => {
                self.session.select_next();
            }
            CommandEvent::SelectPrev => {
                self.session.select_prev();
            }
            CommandEvent::Apply { index, choice } => {
                let outcome = self.session.apply_suggestion(index, choice);
                self.after_apply(outcome);
            }
            CommandEvent::ApplyText { index, text } => {
                let outcome = self.session.apply(index, &text);
                self.after_apply(outcome);
            }
            CommandEvent::Show => {}
            CommandEvent::Quit => {
                return LoopControl::Break {
                    reason: ShutdownReason::CommandQuit,
                };
            }
            CommandEvent::Invalid(message) => self.notice = Some(message),
        }
        LoopControl::REDRAW
    }

    fn after_apply(&mut self, outcome: ApplyOutcome) {
        match outcome {
            ApplyOutcome::Applied(_) => {
                // Work in flight was computed for the old text. The rebased set
                // stays on screen until the new text has been checked.
                self.scheduler.cancel();
                self.reschedule();
            }
            ApplyOutcome::IgnoredStale(reason) => {
                self.notice = Some(format!("ignored: {}", reason.as_str()));
            }
        }
    }

    fn handle_analysis(&mut self, event: AnalysisEvent) -> LoopControl {
        match event {
            AnalysisEvent::DebounceElapsed { ticket } => match self.scheduler.fire(ticket) {
                FireOutcome::Stale => LoopControl::QUIET,
                FireOutcome::Requested { .. } => {
                    self.session.set_status(AnalysisStatus::Checking);
                    LoopControl::REDRAW
                }
                FireOutcome::Local {
                    seq,
                    generation,
                    outcome,
                } => self.complete(seq, generation, outcome),
            },
            AnalysisEvent::Completed {
                seq,
                generation,
                outcome,
            } => self.complete(seq, generation, outcome),
        }
    }

    fn complete(
        &mut self,
        seq: u64,
        generation: Generation,
        outcome: AnalysisOutcome,
    ) -> LoopControl {
        if !self.scheduler.accept(seq) {
            return LoopControl::QUIET;
        }
        let (source, matches, reason) = match outcome {
            AnalysisOutcome::Matches(matches) => (MatchSource::Remote, matches, None),
            AnalysisOutcome::Fallback { matches, reason } => {
                (MatchSource::Fallback, matches, Some(reason))
            }
        };
        if !self
            .session
            .replace_matches(MatchSet::new(generation, source, matches))
        {
            return LoopControl::QUIET;
        }
        let count = self.session.matches().len();
        let status = match reason {
            None => AnalysisStatus::Ready { count },
            Some(FallbackReason::Offline) => AnalysisStatus::Offline { count },
            Some(FallbackReason::Failed(error)) => {
                self.notice = Some(format!("checking failed: {error}"));
                AnalysisStatus::Failed { count }
            }
        };
        self.session.set_status(status);
        LoopControl::REDRAW
    }

    fn handle_health(&mut self, status: HealthStatus) -> LoopControl {
        info!(target: "runtime", health = status.as_str(), "health_changed");
        self.health = status;
        let text = self.session.text();
        let outcome = self
            .scheduler
            .on_health_changed(status, self.session.generation(), &text);
        self.apply_schedule_outcome(outcome);
        LoopControl::REDRAW
    }

    fn handle_tick(&mut self) -> LoopControl {
        let t = telemetry_snapshot();
        trace!(
            target: "runtime",
            requests = t.requests_issued,
            cancelled = t.requests_cancelled,
            discarded = t.responses_discarded,
            failures = t.failures,
            fallback_runs = t.fallback_runs,
            "telemetry"
        );
        LoopControl::QUIET
    }

    fn reschedule(&mut self) {
        let text = self.session.text();
        let outcome = self.scheduler.schedule(self.session.generation(), &text);
        self.apply_schedule_outcome(outcome);
    }

    fn apply_schedule_outcome(&mut self, outcome: ScheduleOutcome) {
        match outcome {
            ScheduleOutcome::Scheduled { .. } => self.session.set_status(AnalysisStatus::Pending),
            ScheduleOutcome::Cleared => {
                self.session.clear_matches();
                self.session.set_status(AnalysisStatus::Idle);
            }
            ScheduleOutcome::Unchanged => {}
        }
    }

    fn redraw(&mut self) -> anyhow::Result<()> {
        let notice = self.notice.take();
        let frame = Frame {
            session: &self.session,
            health: self.health,
            notice: notice.as_deref(),
        };
        render(&mut self.out, &frame, self.color)?;
        Ok(())
    }

    async fn finalize_shutdown(&mut self, reason: ShutdownReason) {
        log_shutdown_stage(reason, "begin");
        self.scheduler.cancel();

        if let Some(shutdown) = self.input_shutdown.take() {
            trace!(
                target: "runtime.shutdown",
                reason = reason.as_str(),
                "input_shutdown_signal"
            );
            shutdown.signal();
        }

        while let Some(handle) = self.source_handles.pop() {
            match tokio::time::timeout(Duration::from_millis(200), handle).await {
                Ok(Ok(())) => trace!(
                    target: "runtime.shutdown",
                    reason = reason.as_str(),
                    "event_source_task_stopped"
                ),
                Ok(Err(err)) if err.is_cancelled() => trace!(
                    target: "runtime.shutdown",
                    reason = reason.as_str(),
                    "event_source_task_cancelled"
                ),
                Ok(Err(err)) => error!(
                    target: "runtime.shutdown",
                    reason = reason.as_str(),
                    ?err,
                    "event_source_task_error"
                ),
                Err(_) => warn!(
                    target: "runtime.shutdown",
                    reason = reason.as_str(),
                    "event_source_task_timeout"
                ),
            }
        }

        let t = telemetry_snapshot();
        info!(
            target: "runtime.shutdown",
            requests_issued = t.requests_issued,
            requests_cancelled = t.requests_cancelled,
            responses_discarded = t.responses_discarded,
            failures = t.failures,
            fallback_runs = t.fallback_runs,
            stale_actions = t.stale_actions,
            health_transitions = t.health_transitions,
            "telemetry_summary"
        );
        debug!(target: "runtime.shutdown", generation = %self.session.generation(), "final_state");
        log_shutdown_stage(reason, "complete");
    }
}
