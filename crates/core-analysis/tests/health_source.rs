use core_analysis::{AnalysisClient, AnalysisError, CheckRequest, HealthProbeSource, HealthStatus};
use core_events::{AsyncEventSource, Event};
use core_model::Match;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::timeout;

/// Probe results controlled by the test.
struct ScriptedProbe {
    online: AtomicBool,
    probes: AtomicUsize,
}

impl ScriptedProbe {
    fn new(online: bool) -> Self {
        Self {
            online: AtomicBool::new(online),
            probes: AtomicUsize::new(0),
        }
    }

    fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }
}

impl AnalysisClient for ScriptedProbe {
    async fn check(&self, _request: CheckRequest) -> Result<Vec<Match>, AnalysisError> {
        Ok(Vec::new())
    }

    async fn probe(&self) -> HealthStatus {
        self.probes.fetch_add(1, Ordering::SeqCst);
        if self.online.load(Ordering::SeqCst) {
            HealthStatus::Online
        } else {
            HealthStatus::Offline
        }
    }
}

fn expect_health(event: Option<Event>) -> HealthStatus {
    match event {
        Some(Event::Health(status)) => status,
        other => panic!("expected health event, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn probe_source_posts_transitions_only() {
    let client = Arc::new(ScriptedProbe::new(false));
    let (tx, mut rx) = mpsc::channel::<Event>(8);
    let source = HealthProbeSource::new(client.clone(), Duration::from_secs(30), HealthStatus::Online);
    let handle = Box::new(source).spawn(tx);

    // Startup probe disagrees with the assumed status.
    assert_eq!(expect_health(rx.recv().await), HealthStatus::Offline);

    // Several intervals of steady offline: silence.
    assert!(timeout(Duration::from_secs(95), rx.recv()).await.is_err());
    assert!(client.probes.load(Ordering::SeqCst) >= 4);

    client.set_online(true);
    let event = timeout(Duration::from_secs(31), rx.recv()).await.unwrap();
    assert_eq!(expect_health(event), HealthStatus::Online);

    drop(rx);
    timeout(Duration::from_secs(60), handle)
        .await
        .expect("probe task should stop once the channel closes")
        .unwrap();
}

#[tokio::test(start_paused = true)]
async fn matching_startup_probe_is_silent() {
    let client = Arc::new(ScriptedProbe::new(true));
    let (tx, mut rx) = mpsc::channel::<Event>(8);
    let handle =
        Box::new(HealthProbeSource::new(client.clone(), Duration::from_secs(10), HealthStatus::Online)).spawn(tx);

    assert!(timeout(Duration::from_secs(25), rx.recv()).await.is_err());
    assert!(client.probes.load(Ordering::SeqCst) >= 2);
    handle.abort();
}
