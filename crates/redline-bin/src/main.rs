//! Redline entrypoint.
use anyhow::{Context, Result};
use clap::Parser;
use core_analysis::{HealthProbeSource, HealthStatus, HttpAnalysisClient};
use core_config::{Settings, load_from};
use core_events::{EVENT_CHANNEL_CAP, Event, EventSourceRegistry, TickEventSource};
use core_input::LineInputSource;
use core_scheduler::{RequestScheduler, SchedulerConfig};
use core_state::Session;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Once};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{error, info};
use tracing_appender::non_blocking::WorkerGuard;

mod render;
mod runtime;

use runtime::Runtime;

const TELEMETRY_TICK: Duration = Duration::from_secs(5);
const SHUTDOWN_GRACE: Duration = Duration::from_millis(200);

/// CLI arguments.
#[derive(Parser, Debug)]
#[command(
    name = "redline",
    version,
    about = "Inline grammar and style suggestions for text typed on stdin"
)]
struct Args {
    /// Optional UTF-8 text file used as the initial buffer.
    pub path: Option<PathBuf>,
    /// Configuration file path (overrides discovery of `redline.toml`).
    #[arg(long = "config")]
    pub config: Option<PathBuf>,
    /// Never contact the analysis service; use the local heuristic only.
    #[arg(long)]
    pub offline: bool,
}

struct AppStartup {
    log_guard: Option<WorkerGuard>,
}

struct RuntimeContext {
    session: Session,
    settings: Settings,
    offline: bool,
}

impl AppStartup {
    fn new() -> Self {
        Self { log_guard: None }
    }

    fn run(&mut self, args: &Args) -> Result<RuntimeContext> {
        self.configure_logging()?;
        Self::install_panic_hook();
        info!(target: "runtime", "startup");

        let config = load_from(args.config.clone())?;
        let settings = config.resolve();
        let session = Self::load_session(args.path.as_deref()).with_recovery(settings.recovery);

        let config_path = config.path.as_ref().map(|p| p.display().to_string());
        info!(
            target: "runtime.startup",
            config_path = config_path.as_deref(),
            endpoint = settings.endpoint.as_str(),
            language = settings.language.as_str(),
            debounce_ms = settings.debounce.as_millis() as u64,
            offline = args.offline,
            buffer_chars = session.buffer().len_chars(),
            "bootstrap_complete"
        );

        Ok(RuntimeContext {
            session,
            settings,
            offline: args.offline,
        })
    }

    fn configure_logging(&mut self) -> Result<()> {
        let log_dir = Path::new(".");
        let log_path = log_dir.join("redline.log");
        if log_path.exists() {
            let _ = std::fs::remove_file(&log_path);
        }

        let file_appender = tracing_appender::rolling::never(log_dir, "redline.log");
        let (nb_writer, guard) = tracing_appender::non_blocking(file_appender);
        if tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_writer(nb_writer)
            .try_init()
            .is_ok()
        {
            self.log_guard = Some(guard);
        }
        Ok(())
    }

    fn install_panic_hook() {
        static HOOK: Once = Once::new();
        HOOK.call_once(|| {
            let default_panic = std::panic::take_hook();
            std::panic::set_hook(Box::new(move |info| {
                tracing::error!(target: "runtime.panic", ?info, "panic");
                default_panic(info);
            }));
        });
    }

    fn load_session(path: Option<&Path>) -> Session {
        let Some(path) = path else {
            return Session::default();
        };
        match std::fs::read_to_string(path) {
            Ok(content) => {
                tracing::debug!(
                    target: "io",
                    file = %path.display(),
                    size_bytes = content.len(),
                    "file_read_ok"
                );
                Session::new(&content)
            }
            Err(e) => {
                error!(target: "io", file = %path.display(), ?e, "file_open_error");
                Session::default()
            }
        }
    }
}

async fn run(context: RuntimeContext) -> Result<()> {
    let RuntimeContext {
        session,
        settings,
        offline,
    } = context;

    let client = Arc::new(
        HttpAnalysisClient::new(
            settings.endpoint.clone(),
            settings.request_timeout,
            settings.probe_timeout,
        )
        .context("building HTTP client")?,
    );
    let (tx, rx) = mpsc::channel::<Event>(EVENT_CHANNEL_CAP);

    let input = LineInputSource::stdin();
    let input_shutdown = input.shutdown_handle();
    let mut registry = EventSourceRegistry::new();
    registry.register(input);
    registry.register(TickEventSource::new(TELEMETRY_TICK));
    let assumed = if offline {
        HealthStatus::Offline
    } else {
        registry.register(HealthProbeSource::new(
            client.clone(),
            settings.health_interval,
            HealthStatus::Online,
        ));
        HealthStatus::Online
    };
    let source_handles = registry.spawn_all(&tx);

    let scheduler = RequestScheduler::new(
        client,
        SchedulerConfig {
            debounce: settings.debounce,
            min_length: settings.min_length,
            language: settings.language.clone(),
        },
        tx,
    )
    .with_health(assumed);

    let stdout = std::io::stdout();
    let color = stdout.is_terminal() && std::env::var_os("NO_COLOR").is_none();
    let mut runtime = Runtime::new(session, scheduler, rx, stdout.lock(), color)
        .with_sources(source_handles, input_shutdown);
    runtime.run().await
}

fn main() -> Result<()> {
    let args = Args::parse();
    let mut startup = AppStartup::new();
    let context = startup.run(&args)?;

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("building tokio runtime")?;
    let result = rt.block_on(run(context));
    // A blocking stdin read cannot be interrupted; don't wait on it.
    rt.shutdown_timeout(SHUTDOWN_GRACE);
    if let Err(err) = &result {
        error!(target: "runtime", error = %err, "runtime_failed");
    }
    result
}
