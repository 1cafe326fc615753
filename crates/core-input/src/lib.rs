//! Line-oriented input for the runtime.
//!
//! `LineInputSource` reads lines from stdin (or any async reader in tests),
//! parses each with `CommandParser` and posts the resulting `Event`. End of
//! input posts `Event::Shutdown`. The task also stops when the channel
//! closes or when `InputShutdown::signal` is called.

mod command;
pub use command::{CommandParser, ParsedLine};

use core_events::{AsyncEventSource, Event, post};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::Notify;
use tokio::sync::mpsc::Sender;
use tokio::task::JoinHandle;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::LinesStream;
use tracing::{debug, info, trace};

#[inline]
pub(crate) fn log_line_received(line: &str) {
    trace!(target: "input.line", line_len = line.len(), "line_received");
}

#[derive(Clone, Debug, Default)]
pub struct InputShutdown {
    notify: Arc<Notify>,
}

impl InputShutdown {
    pub fn signal(&self) {
        self.notify.notify_one();
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ExitReason {
    ShutdownSignal,
    ChannelClosed,
    EndOfInput,
    ReadError,
}

impl ExitReason {
    fn as_str(&self) -> &'static str {
        match self {
            ExitReason::ShutdownSignal => "shutdown_signal",
            ExitReason::ChannelClosed => "channel_closed",
            ExitReason::EndOfInput => "end_of_input",
            ExitReason::ReadError => "read_error",
        }
    }
}

pub struct LineInputSource<R> {
    reader: R,
    shutdown: InputShutdown,
}

impl LineInputSource<tokio::io::Stdin> {
    pub fn stdin() -> Self {
        Self::new(tokio::io::stdin())
    }
}

impl<R> LineInputSource<R>
where
    R: AsyncRead + Send + Unpin + 'static,
{
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            shutdown: InputShutdown::default(),
        }
    }

    /// Handle that stops the reader without waiting for input.
    pub fn shutdown_handle(&self) -> InputShutdown {
        self.shutdown.clone()
    }
}

impl<R> AsyncEventSource for LineInputSource<R>
where
    R: AsyncRead + Send + Unpin + 'static,
{
    fn name(&self) -> &'static str {
        "line_input"
    }

    fn spawn(self: Box<Self>, tx: Sender<Event>) -> JoinHandle<()> {
        let LineInputSource { reader, shutdown } = *self;
        tokio::spawn(async move {
            let mut lines = LinesStream::new(BufReader::new(reader).lines());
            let reason = loop {
                let next = tokio::select! {
                    _ = shutdown.notify.notified() => break ExitReason::ShutdownSignal,
                    _ = tx.closed() => break ExitReason::ChannelClosed,
                    next = lines.next() => next,
                };
                let line = match next {
                    Some(Ok(line)) => line,
                    Some(Err(err)) => {
                        debug!(target: "input.line", kind = ?err.kind(), "read_failed");
                        break ExitReason::ReadError;
                    }
                    None => break ExitReason::EndOfInput,
                };
                log_line_received(&line);
                let event = match CommandParser::parse(&line) {
                    ParsedLine::Edit(edit) => Event::Edit(edit),
                    ParsedLine::Command(command) => Event::Command(command),
                };
                if !post(&tx, event).await {
                    break ExitReason::ChannelClosed;
                }
            };
            if matches!(reason, ExitReason::EndOfInput | ExitReason::ReadError) {
                post(&tx, Event::Shutdown).await;
            }
            info!(target: "input.line", reason = reason.as_str(), "input_stopped");
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_events::{CommandEvent, EditEvent};
    use std::fmt;
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::sync::mpsc;
    use tracing::Subscriber;
    use tracing::dispatcher::Dispatch;
    use tracing::field::{Field, Visit};
    use tracing_subscriber::layer::{Context, Layer, SubscriberExt};
    use tracing_subscriber::registry::Registry;

    #[derive(Clone, Default)]
    struct Capture {
        events: Arc<Mutex<Vec<CapturedEvent>>>,
    }

    #[derive(Clone, Debug)]
    struct CapturedEvent {
        target: String,
        fields: Vec<(String, String)>,
    }

    #[derive(Default)]
    struct FieldCollector {
        fields: Vec<(String, String)>,
    }

    impl Visit for FieldCollector {
        fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
            self.fields.push((field.name().to_string(), format!("{value:?}")));
        }
    }

    impl<S: Subscriber> Layer<S> for Capture {
        fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
            let mut collector = FieldCollector::default();
            event.record(&mut collector);
            self.events.lock().unwrap().push(CapturedEvent {
                target: event.metadata().target().to_string(),
                fields: collector.fields,
            });
        }
    }

    #[test]
    fn line_log_redacts_content() {
        let capture = Capture::default();
        let events = capture.events.clone();
        let dispatch = Dispatch::new(Registry::default().with(capture));

        tracing::dispatcher::with_default(&dispatch, || {
            log_line_received("my secret draft \u{1F4A3}");
        });

        let events = events.lock().unwrap();
        let event = events
            .iter()
            .find(|e| e.target == "input.line")
            .expect("missing input.line event");
        assert!(event.fields.iter().any(|(name, _)| name == "line_len"));
        for (_, value) in &event.fields {
            assert!(!value.contains("secret draft"), "leaked line content: {value}");
        }
    }

    async fn drain(input: &'static str) -> Vec<Event> {
        let (tx, mut rx) = mpsc::channel::<Event>(16);
        let handle = Box::new(LineInputSource::new(input.as_bytes())).spawn(tx);
        let mut out = Vec::new();
        while let Some(ev) = rx.recv().await {
            let done = matches!(ev, Event::Shutdown);
            out.push(ev);
            if done {
                break;
            }
        }
        handle.await.unwrap();
        out
    }

    #[tokio::test]
    async fn lines_become_events_and_eof_shuts_down() {
        let events = drain("I has a pen.\n:apply 0\n:bogus\n").await;
        assert_eq!(events.len(), 4);
        assert!(matches!(&events[0], Event::Edit(EditEvent::Replace(t)) if t == "I has a pen."));
        assert!(matches!(
            &events[1],
            Event::Command(CommandEvent::Apply { index: 0, choice: 0 })
        ));
        assert!(matches!(&events[2], Event::Command(CommandEvent::Invalid(_))));
        assert!(matches!(&events[3], Event::Shutdown));
    }

    #[tokio::test]
    async fn crlf_lines_are_trimmed() {
        let events = drain("hello there\r\n").await;
        assert!(matches!(&events[0], Event::Edit(EditEvent::Replace(t)) if t == "hello there"));
    }

    #[tokio::test]
    async fn shutdown_signal_stops_pending_read() {
        let (_writer, reader) = tokio::io::duplex(64);
        let source = LineInputSource::new(reader);
        let stop = source.shutdown_handle();
        let (tx, mut rx) = mpsc::channel::<Event>(4);
        let handle = Box::new(source).spawn(tx);

        stop.signal();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("reader should stop on signal")
            .unwrap();
        // A signalled stop is not end of input: no shutdown event.
        assert!(rx.recv().await.is_none());
    }
}
