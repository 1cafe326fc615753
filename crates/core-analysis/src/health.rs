//! Health monitoring for the analysis service.
//!
//! `HealthMonitor` is the transition filter: it remembers the last status and
//! reports only changes. `HealthProbeSource` drives it from a background task,
//! probing once at startup and then on a fixed interval, and posts
//! `Event::Health` only when the status flips. Steady-state probes are silent.

use crate::{AnalysisClient, HealthStatus};
use core_events::{AsyncEventSource, Event, HEALTH_TRANSITIONS, bump, post};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::Sender;
use tokio::task::JoinHandle;
use tracing::{info, trace};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HealthMonitor {
    current: HealthStatus,
}

impl HealthMonitor {
    /// `assumed` is the status the rest of the runtime starts with.
    pub fn new(assumed: HealthStatus) -> Self {
        Self { current: assumed }
    }

    pub fn current(&self) -> HealthStatus {
        self.current
    }

    /// Record a probe result. Returns the new status on a transition.
    pub fn observe(&mut self, status: HealthStatus) -> Option<HealthStatus> {
        if status == self.current {
            return None;
        }
        info!(
            target: "analysis.health",
            from = self.current.as_str(),
            to = status.as_str(),
            "health_transition"
        );
        bump(&HEALTH_TRANSITIONS);
        self.current = status;
        Some(status)
    }
}

/// Probe once through `client`.
pub async fn probe<C: AnalysisClient>(client: &C) -> HealthStatus {
    let status = client.probe().await;
    trace!(target: "analysis.health", status = status.as_str(), "probe");
    status
}

/// Periodic probe task.
pub struct HealthProbeSource<C: AnalysisClient> {
    client: Arc<C>,
    interval: Duration,
    monitor: HealthMonitor,
}

impl<C: AnalysisClient> HealthProbeSource<C> {
    pub fn new(client: Arc<C>, interval: Duration, assumed: HealthStatus) -> Self {
        Self {
            client,
            interval,
            monitor: HealthMonitor::new(assumed),
        }
    }
}

impl<C: AnalysisClient> AsyncEventSource for HealthProbeSource<C> {
    fn name(&self) -> &'static str {
        "health_probe"
    }

    fn spawn(self: Box<Self>, tx: Sender<Event>) -> JoinHandle<()> {
        let HealthProbeSource {
            client,
            interval,
            mut monitor,
        } = *self;
        tokio::spawn(async move {
            // The first tick completes immediately: probe at session start.
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {}
                    _ = tx.closed() => break,
                }
                let status = tokio::select! {
                    status = probe(client.as_ref()) => status,
                    _ = tx.closed() => break,
                };
                if let Some(changed) = monitor.observe(status)
                    && !post(&tx, Event::Health(changed)).await
                {
                    break;
                }
            }
            trace!(target: "analysis.health", "probe_source_stopped");
        })
    }
}
