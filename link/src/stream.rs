//! Live log streaming with automatic reconnection.
//!
//! A [`StreamSession`] owns at most one event-stream connection at a time.
//! The connection runs in a background task that:
//!
//! 1. Opens the transport, bounded by a connect watchdog
//! 2. Decodes frames into [`LogEvent`]s and fans them out in arrival order
//! 3. On failure, reconnects with exponential backoff, resuming from the
//!    last seen event id
//! 4. On `complete`, delivers it and tears the session down
//!
//! [`disconnect`](StreamSession::disconnect) cancels the task through a
//! `CancellationToken`; a scheduled reconnect sleeps on the same token, so a
//! torn-down session is never resurrected.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use futures_util::StreamExt;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use crate::{
    auth::redact_url,
    error::{Result, TaskLinkError},
    event_handlers::{
        ConnectionError, DisconnectReason, EventDispatcher, ListenerId, StreamEvent,
        StreamEventKind,
    },
    models::{LogEvent, LogEventKind, LogPayload, StreamOptions},
    reconnect::ReconnectPolicy,
    session_expiry::SessionExpiryCoordinator,
    transport::{SseMessage, StreamTransport, TransportEvent, TransportStream},
};

/// Lifecycle state of a stream session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    Idle,
    Connecting,
    Open,
    Closed,
    Error,
}

impl fmt::Display for StreamState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StreamState::Idle => "idle",
            StreamState::Connecting => "connecting",
            StreamState::Open => "open",
            StreamState::Closed => "closed",
            StreamState::Error => "error",
        };
        f.write_str(s)
    }
}

/// Point-in-time view of a session, for status displays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionState {
    pub is_connected: bool,
    pub state: StreamState,
    pub reconnect_attempts: u32,
}

#[derive(Debug)]
struct SessionInner {
    state: StreamState,
    attempts: u32,
    cursor: Option<String>,
    cancel: Option<CancellationToken>,
    generation: u64,
    reconnect_pending: bool,
}

struct Shared {
    inner: Mutex<SessionInner>,
    dispatcher: EventDispatcher,
    transport: Arc<dyn StreamTransport>,
    coordinator: Option<SessionExpiryCoordinator>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, SessionInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Tear down the current transport. Emits `disconnected` only when there
    /// was something to tear down.
    fn disconnect(&self, reason: DisconnectReason) -> bool {
        let had_transport = {
            let mut inner = self.lock();
            let active = matches!(inner.state, StreamState::Connecting | StreamState::Open)
                || inner.reconnect_pending;
            if let Some(cancel) = inner.cancel.take() {
                cancel.cancel();
            }
            inner.reconnect_pending = false;
            if inner.state != StreamState::Idle {
                inner.state = StreamState::Closed;
            }
            active
        };

        if had_transport {
            log::debug!("[tasklog-link] Stream disconnected: {}", reason);
            self.dispatcher.emit(&StreamEvent::Disconnected(reason));
        }
        had_transport
    }
}

/// One live log stream.
///
/// # Example
///
/// ```rust,no_run
/// use tasklog_link::{StreamOptions, TaskLogClient};
///
/// # async fn example() -> tasklog_link::Result<()> {
/// let client = TaskLogClient::builder().base_url("http://localhost:8000").build()?;
/// let session = client.new_stream_session();
/// session.on_log(|event| println!("{}", event.content()));
/// session.on_complete(|_| println!("done"));
///
/// let url = client.stream_url(42, 7)?;
/// session.connect(url, StreamOptions::default()).await?;
/// # Ok(())
/// # }
/// ```
pub struct StreamSession {
    shared: Arc<Shared>,
}

impl fmt::Debug for StreamSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamSession")
            .field("state", &self.state())
            .field("reconnect_attempts", &self.reconnect_attempts())
            .field("listeners", &self.shared.dispatcher)
            .finish()
    }
}

impl StreamSession {
    pub fn new(transport: Arc<dyn StreamTransport>) -> Self {
        Self::build(transport, None)
    }

    /// Session that reports a rejected (HTTP 401) stream as session expiry
    /// and opens nothing while the coordinator is redirecting to login.
    pub fn with_coordinator(
        transport: Arc<dyn StreamTransport>,
        coordinator: SessionExpiryCoordinator,
    ) -> Self {
        Self::build(transport, Some(coordinator))
    }

    fn build(
        transport: Arc<dyn StreamTransport>,
        coordinator: Option<SessionExpiryCoordinator>,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                inner: Mutex::new(SessionInner {
                    state: StreamState::Idle,
                    attempts: 0,
                    cursor: None,
                    cancel: None,
                    generation: 0,
                    reconnect_pending: false,
                }),
                dispatcher: EventDispatcher::new(),
                transport,
                coordinator,
            }),
        }
    }

    /// Open the stream at `url`.
    ///
    /// Resolves once the connection is open, on the first attempt or after
    /// scheduled reconnects. Any existing connection is torn down first.
    ///
    /// # Errors
    ///
    /// - [`TaskLinkError::ConnectError`] when the reconnect budget runs out,
    ///   when reconnection is disabled and the first attempt fails, or when
    ///   the server rejects the credentials
    /// - [`TaskLinkError::Cancelled`] when [`disconnect`](Self::disconnect)
    ///   is called before the connection opens
    /// - [`TaskLinkError::RedirectInProgress`] when the attached coordinator
    ///   is redirecting to login; the transport is not opened
    pub async fn connect(&self, url: impl Into<String>, options: StreamOptions) -> Result<()> {
        let url = url.into();
        self.shared
            .disconnect(DisconnectReason::new("Replaced by a new connection"));

        let cancel = CancellationToken::new();
        let generation = {
            let mut inner = self.shared.lock();
            inner.generation += 1;
            inner.state = StreamState::Connecting;
            inner.attempts = 0;
            inner.cursor = None;
            inner.reconnect_pending = false;
            inner.cancel = Some(cancel.clone());
            inner.generation
        };

        log::info!("[tasklog-link] Connecting stream {}", redact_url(&url));

        let (ready_tx, ready_rx) = oneshot::channel::<Result<()>>();
        let task = ConnectionTask {
            shared: self.shared.clone(),
            policy: options.reconnect_policy(),
            connect_timeout: options.connect_timeout(),
            url,
            cancel,
            generation,
            ready: Some(ready_tx),
        };
        tokio::spawn(task.run());

        match ready_rx.await {
            Ok(result) => result,
            // the task exits without signalling only when cancelled
            Err(_) => Err(TaskLinkError::Cancelled),
        }
    }

    /// Close the stream. Idempotent and safe to call from a listener.
    ///
    /// Emits `disconnected` and returns `true` only if a connection was open,
    /// connecting, or waiting to reconnect.
    pub fn disconnect(&self) -> bool {
        self.shared
            .disconnect(DisconnectReason::new("Client disconnected"))
    }

    pub fn state(&self) -> StreamState {
        self.shared.lock().state
    }

    pub fn reconnect_attempts(&self) -> u32 {
        self.shared.lock().attempts
    }

    pub fn connection_state(&self) -> ConnectionState {
        let inner = self.shared.lock();
        ConnectionState {
            is_connected: inner.state == StreamState::Open,
            state: inner.state,
            reconnect_attempts: inner.attempts,
        }
    }

    /// Id of the last event received; sent as `Last-Event-ID` on reconnect.
    pub fn last_event_id(&self) -> Option<String> {
        self.shared.lock().cursor.clone()
    }

    /// Weak handle for listeners that need to close their own session.
    pub fn controller(&self) -> StreamController {
        StreamController {
            shared: Arc::downgrade(&self.shared),
        }
    }

    pub fn dispatcher(&self) -> &EventDispatcher {
        &self.shared.dispatcher
    }

    pub fn on(
        &self,
        kind: StreamEventKind,
        f: impl Fn(&StreamEvent) + Send + Sync + 'static,
    ) -> ListenerId {
        self.shared.dispatcher.on(kind, f)
    }

    pub fn off(&self, kind: StreamEventKind, id: ListenerId) -> bool {
        self.shared.dispatcher.off(kind, id)
    }

    pub fn on_connected(&self, f: impl Fn(&str) + Send + Sync + 'static) -> ListenerId {
        self.shared.dispatcher.on_connected(f)
    }

    pub fn on_log(&self, f: impl Fn(&LogEvent) + Send + Sync + 'static) -> ListenerId {
        self.shared.dispatcher.on_log(f)
    }

    pub fn on_status(&self, f: impl Fn(&LogEvent) + Send + Sync + 'static) -> ListenerId {
        self.shared.dispatcher.on_status(f)
    }

    pub fn on_complete(&self, f: impl Fn(&LogEvent) + Send + Sync + 'static) -> ListenerId {
        self.shared.dispatcher.on_complete(f)
    }

    pub fn on_error(&self, f: impl Fn(&ConnectionError) + Send + Sync + 'static) -> ListenerId {
        self.shared.dispatcher.on_error(f)
    }

    pub fn on_disconnected(
        &self,
        f: impl Fn(&DisconnectReason) + Send + Sync + 'static,
    ) -> ListenerId {
        self.shared.dispatcher.on_disconnected(f)
    }

    /// Drop every registered listener.
    pub fn release_listeners(&self) {
        self.shared.dispatcher.clear();
    }
}

impl Drop for StreamSession {
    fn drop(&mut self) {
        self.shared
            .disconnect(DisconnectReason::new("Session dropped"));
        self.shared.dispatcher.clear();
    }
}

/// Cloneable, non-owning handle to a [`StreamSession`].
#[derive(Clone)]
pub struct StreamController {
    shared: Weak<Shared>,
}

impl fmt::Debug for StreamController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamController")
            .field("alive", &(self.shared.strong_count() > 0))
            .finish()
    }
}

impl StreamController {
    /// Same as [`StreamSession::disconnect`]; `false` once the session is gone.
    pub fn disconnect(&self) -> bool {
        match self.shared.upgrade() {
            Some(shared) => shared.disconnect(DisconnectReason::new("Client disconnected")),
            None => false,
        }
    }

    pub fn state(&self) -> Option<StreamState> {
        self.shared.upgrade().map(|shared| shared.lock().state)
    }
}

enum AttemptEnd {
    Cancelled,
    Completed,
    Failed(TaskLinkError),
}

/// Background task owning one connection and its reconnects.
struct ConnectionTask {
    shared: Arc<Shared>,
    policy: ReconnectPolicy,
    connect_timeout: Duration,
    url: String,
    cancel: CancellationToken,
    generation: u64,
    ready: Option<oneshot::Sender<Result<()>>>,
}

impl ConnectionTask {
    async fn run(mut self) {
        loop {
            let err = match self.attempt().await {
                AttemptEnd::Cancelled | AttemptEnd::Completed => return,
                AttemptEnd::Failed(err) => err,
            };
            if self.cancel.is_cancelled() {
                return;
            }

            if matches!(err, TaskLinkError::RedirectInProgress) {
                log::warn!("[tasklog-link] Not opening stream: login redirect in progress");
                self.fail_terminal_with(err.to_string(), TaskLinkError::RedirectInProgress);
                return;
            }

            if err.is_unauthorized() {
                log::warn!("[tasklog-link] Stream rejected by server: {}", err);
                if let Some(coordinator) = &self.shared.coordinator {
                    coordinator.report_expiry(None);
                }
                self.fail_terminal(format!("{}; not retrying", err));
                return;
            }

            let Some(delay) = self.policy.next_delay() else {
                let message = if self.policy.max_attempts() == 0 {
                    format!("{}; reconnection disabled", err)
                } else {
                    format!(
                        "{}; max reconnection attempts ({}) reached",
                        err,
                        self.policy.max_attempts()
                    )
                };
                log::warn!("[tasklog-link] {}", message);
                self.fail_terminal(message);
                return;
            };

            let attempt = self.policy.attempts();
            let scheduled = self.update(|inner| {
                inner.state = StreamState::Error;
                inner.attempts = attempt;
                inner.reconnect_pending = true;
            });
            if !scheduled {
                return;
            }

            log::info!(
                "[tasklog-link] Stream failed ({}); reconnecting in {}ms (attempt {}/{})",
                err,
                delay.as_millis(),
                attempt,
                self.policy.max_attempts()
            );
            self.shared.dispatcher.emit(&StreamEvent::Error(ConnectionError::new(
                err.to_string(),
                true,
            )));

            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return,
                _ = tokio::time::sleep(delay) => {}
            }

            if !self.update(|inner| {
                inner.state = StreamState::Connecting;
                inner.reconnect_pending = false;
            }) {
                return;
            }
        }
    }

    /// One connect-and-read cycle.
    async fn attempt(&mut self) -> AttemptEnd {
        if self.shared.coordinator.as_ref().is_some_and(|c| c.is_redirecting()) {
            return AttemptEnd::Failed(TaskLinkError::RedirectInProgress);
        }

        let cursor = self.shared.lock().cursor.clone();
        let watchdog = self.connect_timeout;
        let attempt_no = self.policy.attempts() + 1;

        let opened = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return AttemptEnd::Cancelled,
            _ = tokio::time::sleep(watchdog) => {
                log::warn!("[tasklog-link] Stream did not open within {:?}", watchdog);
                Err(TaskLinkError::timeout("stream connect", watchdog, attempt_no))
            }
            result = open_stream(self.shared.transport.as_ref(), &self.url, cursor.as_deref()) => result,
        };

        let (mut stream, pending) = match opened {
            Ok(opened) => opened,
            Err(e) => return AttemptEnd::Failed(e),
        };

        if !self.update(|inner| {
            inner.state = StreamState::Open;
            inner.attempts = 0;
            inner.reconnect_pending = false;
        }) {
            return AttemptEnd::Cancelled;
        }
        self.policy.reset();

        log::info!("[tasklog-link] Stream open {}", redact_url(&self.url));
        self.shared.dispatcher.emit(&StreamEvent::Connected {
            url: redact_url(&self.url),
        });
        if let Some(tx) = self.ready.take() {
            let _ = tx.send(Ok(()));
        }

        if let Some(message) = pending {
            if let Some(end) = self.handle_message(message) {
                return end;
            }
        }

        loop {
            let next = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return AttemptEnd::Cancelled,
                item = stream.next() => item,
            };
            match next {
                Some(Ok(TransportEvent::Message(message))) => {
                    if let Some(end) = self.handle_message(message) {
                        return end;
                    }
                },
                Some(Ok(TransportEvent::Open)) => {},
                Some(Err(e)) => return AttemptEnd::Failed(e),
                None => {
                    return AttemptEnd::Failed(TaskLinkError::NetworkError(
                        "Event stream ended before the task completed".to_string(),
                    ))
                },
            }
        }
    }

    /// Decode and deliver one frame. Returns `Some` when the attempt is over.
    fn handle_message(&self, message: SseMessage) -> Option<AttemptEnd> {
        if self.cancel.is_cancelled() {
            return Some(AttemptEnd::Cancelled);
        }

        let id = (!message.id.is_empty()).then(|| message.id.clone());
        if let Some(id) = &id {
            self.update(|inner| inner.cursor = Some(id.clone()));
        }

        let Some(kind) = LogEventKind::from_wire(&message.event) else {
            log::debug!("[tasklog-link] Ignoring unknown stream event '{}'", message.event);
            return None;
        };
        let payload = LogPayload::parse(&message.data);

        let event = match kind {
            LogEventKind::Log => {
                StreamEvent::Log(LogEvent::new(LogEventKind::Log, payload).with_id(id))
            },
            LogEventKind::Status if payload.is_raw() => {
                log::warn!("[tasklog-link] Status payload is not JSON; delivering as log");
                StreamEvent::Log(LogEvent::new(LogEventKind::Log, payload).with_id(id))
            },
            LogEventKind::Status => {
                StreamEvent::Status(LogEvent::new(LogEventKind::Status, payload).with_id(id))
            },
            LogEventKind::Complete => {
                let done = LogEvent::new(LogEventKind::Complete, payload).with_id(id);
                log::info!("[tasklog-link] Task completed: {}", done.content());
                self.shared.dispatcher.emit(&StreamEvent::Complete(done));
                self.shared
                    .disconnect(DisconnectReason::new("Task completed"));
                return Some(AttemptEnd::Completed);
            },
            LogEventKind::Error => {
                let text = payload.content();
                log::warn!("[tasklog-link] Server reported error: {}", text);
                StreamEvent::Error(ConnectionError::new(text, true))
            },
        };

        self.shared.dispatcher.emit(&event);
        None
    }

    /// Give up: stay in `Error`, emit the terminal error, fail `connect`.
    fn fail_terminal(&mut self, message: String) {
        let error = TaskLinkError::ConnectError(message.clone());
        self.fail_terminal_with(message, error);
    }

    /// As [`fail_terminal`](Self::fail_terminal), failing `connect` with `error`.
    fn fail_terminal_with(&mut self, message: String, error: TaskLinkError) {
        let current = self.update(|inner| {
            inner.state = StreamState::Error;
            inner.reconnect_pending = false;
            inner.cancel = None;
        });
        if !current {
            return;
        }
        self.shared
            .dispatcher
            .emit(&StreamEvent::Error(ConnectionError::new(message.clone(), false)));
        if let Some(tx) = self.ready.take() {
            let _ = tx.send(Err(error));
        }
    }

    /// Apply `f` if this task still owns the session. Returns whether it did.
    fn update(&self, f: impl FnOnce(&mut SessionInner)) -> bool {
        let mut inner = self.shared.lock();
        if inner.generation != self.generation || self.cancel.is_cancelled() {
            return false;
        }
        f(&mut inner);
        true
    }
}

/// Open the transport and wait for it to report the open state.
///
/// A transport that sends a frame without an explicit open is taken as open;
/// the frame is handed back for delivery.
async fn open_stream(
    transport: &dyn StreamTransport,
    url: &str,
    last_event_id: Option<&str>,
) -> Result<(TransportStream, Option<SseMessage>)> {
    let mut stream = transport.open(url, last_event_id).await?;
    match stream.next().await {
        Some(Ok(TransportEvent::Open)) => Ok((stream, None)),
        Some(Ok(TransportEvent::Message(message))) => Ok((stream, Some(message))),
        Some(Err(e)) => Err(e),
        None => Err(TaskLinkError::NetworkError(
            "Event stream closed before opening".to_string(),
        )),
    }
}
