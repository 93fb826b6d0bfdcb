#![allow(dead_code)]
//! Shared helpers for tasklog-link integration tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{stream, StreamExt};
use tasklog_link::{
    LoginRedirect, Result, SseMessage, StreamEvent, StreamEventKind, StreamSession,
    StreamTransport, TaskLinkError, TransportEvent,
};
use tokio::sync::mpsc;
use tokio::time::Instant;

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// What one call to [`ScriptedTransport::open`] does.
pub enum Script {
    /// `open` itself fails.
    Fail(TaskLinkError),
    /// Never reports open and never yields a frame.
    Hang,
    /// Opens, yields the frames, then stays open.
    Open(Vec<SseMessage>),
    /// Opens, yields the frames, then the server closes the stream.
    OpenThenEnd(Vec<SseMessage>),
}

#[derive(Debug, Clone)]
pub struct OpenRecord {
    pub at: Instant,
    pub url: String,
    pub last_event_id: Option<String>,
}

/// In-memory transport following one [`Script`] per connection attempt.
/// Attempts beyond the script hang.
pub struct ScriptedTransport {
    scripts: Mutex<VecDeque<Script>>,
    opens: Mutex<Vec<OpenRecord>>,
}

impl ScriptedTransport {
    pub fn new(scripts: Vec<Script>) -> Arc<Self> {
        Arc::new(Self {
            scripts: Mutex::new(scripts.into()),
            opens: Mutex::new(Vec::new()),
        })
    }

    pub fn opens(&self) -> Vec<OpenRecord> {
        self.opens.lock().unwrap().clone()
    }

    pub fn open_count(&self) -> usize {
        self.opens.lock().unwrap().len()
    }
}

fn frames(messages: Vec<SseMessage>) -> Vec<Result<TransportEvent>> {
    std::iter::once(TransportEvent::Open)
        .chain(messages.into_iter().map(TransportEvent::Message))
        .map(Ok)
        .collect()
}

#[async_trait]
impl StreamTransport for ScriptedTransport {
    async fn open(
        &self,
        url: &str,
        last_event_id: Option<&str>,
    ) -> Result<tasklog_link::transport::TransportStream> {
        self.opens.lock().unwrap().push(OpenRecord {
            at: Instant::now(),
            url: url.to_string(),
            last_event_id: last_event_id.map(str::to_string),
        });
        let script = self.scripts.lock().unwrap().pop_front().unwrap_or(Script::Hang);
        match script {
            Script::Fail(err) => Err(err),
            Script::Hang => Ok(Box::pin(stream::pending())),
            Script::Open(messages) => {
                Ok(Box::pin(stream::iter(frames(messages)).chain(stream::pending())))
            },
            Script::OpenThenEnd(messages) => Ok(Box::pin(stream::iter(frames(messages)))),
        }
    }
}

pub fn network_error() -> TaskLinkError {
    TaskLinkError::NetworkError("connection refused".to_string())
}

/// Login redirect that counts what it was asked to do.
#[derive(Default)]
pub struct RecordingRedirect {
    pub notices: Mutex<Vec<String>>,
    pub navigations: AtomicUsize,
}

impl RecordingRedirect {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn navigation_count(&self) -> usize {
        self.navigations.load(Ordering::SeqCst)
    }

    pub fn notice_count(&self) -> usize {
        self.notices.lock().unwrap().len()
    }
}

impl LoginRedirect for RecordingRedirect {
    fn show_notice(&self, message: &str) {
        self.notices.lock().unwrap().push(message.to_string());
    }

    fn redirect_to_login(&self) {
        self.navigations.fetch_add(1, Ordering::SeqCst);
    }
}

/// Every event a session emits, in order, plus a channel to wait on.
pub struct EventRecorder {
    events: Arc<Mutex<Vec<(Instant, StreamEvent)>>>,
    rx: mpsc::UnboundedReceiver<StreamEventKind>,
}

impl EventRecorder {
    pub fn attach(session: &StreamSession) -> Self {
        let events = Arc::new(Mutex::new(Vec::new()));
        let (tx, rx) = mpsc::unbounded_channel();
        for kind in StreamEventKind::ALL {
            let events = events.clone();
            let tx = tx.clone();
            session.on(kind, move |event| {
                events.lock().unwrap().push((Instant::now(), event.clone()));
                let _ = tx.send(event.kind());
            });
        }
        Self { events, rx }
    }

    /// Wait until an event of `kind` has been emitted.
    pub async fn wait_for(&mut self, kind: StreamEventKind) {
        let wait = async {
            while let Some(seen) = self.rx.recv().await {
                if seen == kind {
                    return;
                }
            }
        };
        tokio::time::timeout(Duration::from_secs(600), wait)
            .await
            .unwrap_or_else(|_| panic!("no '{}' event", kind));
    }

    pub fn events(&self) -> Vec<StreamEvent> {
        self.events.lock().unwrap().iter().map(|(_, e)| e.clone()).collect()
    }

    pub fn timed(&self) -> Vec<(Instant, StreamEvent)> {
        self.events.lock().unwrap().clone()
    }

    pub fn kinds(&self) -> Vec<StreamEventKind> {
        self.events().iter().map(StreamEvent::kind).collect()
    }

    pub fn errors(&self) -> Vec<tasklog_link::ConnectionError> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                StreamEvent::Error(err) => Some(err),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, kind: StreamEventKind) -> usize {
        self.kinds().iter().filter(|k| **k == kind).count()
    }
}
