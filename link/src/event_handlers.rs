//! Stream lifecycle and log event fan-out.
//!
//! [`EventDispatcher`] is a typed publish/subscribe hub over the closed set
//! of [`StreamEvent`]s a [`StreamSession`](crate::StreamSession) produces:
//!
//! - `connected`: the transport reached the open state
//! - `log` / `status`: output and progress from the running task
//! - `complete`: the task finished; always the last event before `disconnected`
//! - `error`: a transport or server error, recoverable or terminal
//! - `disconnected`: the session was torn down
//!
//! # Example
//!
//! ```rust
//! use tasklog_link::{EventDispatcher, StreamEventKind};
//!
//! let dispatcher = EventDispatcher::new();
//! let id = dispatcher.on_log(|event| println!("{}", event.content()));
//! dispatcher.on_disconnected(|reason| println!("Disconnected: {}", reason));
//!
//! assert_eq!(dispatcher.listener_count(StreamEventKind::Log), 1);
//! dispatcher.off(StreamEventKind::Log, id);
//! ```

use std::collections::HashMap;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use crate::models::LogEvent;

/// Reason for a disconnect event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisconnectReason {
    /// Human-readable description of why the session closed.
    pub message: String,
}

impl DisconnectReason {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

/// Error information passed to `error` listeners.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionError {
    /// Human-readable error message.
    pub message: String,
    /// Whether the session will try again on its own.
    pub recoverable: bool,
}

impl ConnectionError {
    pub fn new(message: impl Into<String>, recoverable: bool) -> Self {
        Self {
            message: message.into(),
            recoverable,
        }
    }
}

impl fmt::Display for ConnectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

/// Kind of a [`StreamEvent`], used to register and remove listeners.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamEventKind {
    Connected,
    Log,
    Status,
    Complete,
    Error,
    Disconnected,
}

impl StreamEventKind {
    pub const ALL: [StreamEventKind; 6] = [
        StreamEventKind::Connected,
        StreamEventKind::Log,
        StreamEventKind::Status,
        StreamEventKind::Complete,
        StreamEventKind::Error,
        StreamEventKind::Disconnected,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StreamEventKind::Connected => "connected",
            StreamEventKind::Log => "log",
            StreamEventKind::Status => "status",
            StreamEventKind::Complete => "complete",
            StreamEventKind::Error => "error",
            StreamEventKind::Disconnected => "disconnected",
        }
    }
}

impl fmt::Display for StreamEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An event delivered to stream listeners.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    Connected { url: String },
    Log(LogEvent),
    Status(LogEvent),
    Complete(LogEvent),
    Error(ConnectionError),
    Disconnected(DisconnectReason),
}

impl StreamEvent {
    pub fn kind(&self) -> StreamEventKind {
        match self {
            StreamEvent::Connected { .. } => StreamEventKind::Connected,
            StreamEvent::Log(_) => StreamEventKind::Log,
            StreamEvent::Status(_) => StreamEventKind::Status,
            StreamEvent::Complete(_) => StreamEventKind::Complete,
            StreamEvent::Error(_) => StreamEventKind::Error,
            StreamEvent::Disconnected(_) => StreamEventKind::Disconnected,
        }
    }
}

/// Handle returned by registration, used to remove that listener again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Type alias for a listener callback.
pub type EventCallback = Arc<dyn Fn(&StreamEvent) + Send + Sync>;

type Registry = HashMap<StreamEventKind, Vec<(ListenerId, EventCallback)>>;

/// Typed publish/subscribe hub for stream events.
///
/// Cloning yields another handle to the same listener registry. Listeners run
/// synchronously on the emitting task, in registration order. A listener that
/// panics is logged and skipped; the remaining listeners still run.
#[derive(Clone, Default)]
pub struct EventDispatcher {
    listeners: Arc<RwLock<Registry>>,
    next_id: Arc<AtomicU64>,
}

impl fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("EventDispatcher");
        for kind in StreamEventKind::ALL {
            s.field(kind.as_str(), &self.listener_count(kind));
        }
        s.finish()
    }
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener for one event kind.
    pub fn on(
        &self,
        kind: StreamEventKind,
        f: impl Fn(&StreamEvent) + Send + Sync + 'static,
    ) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let mut listeners = self.listeners.write().unwrap_or_else(|e| e.into_inner());
        listeners.entry(kind).or_default().push((id, Arc::new(f)));
        id
    }

    /// Remove a listener. Returns `false` if it was not registered.
    pub fn off(&self, kind: StreamEventKind, id: ListenerId) -> bool {
        let mut listeners = self.listeners.write().unwrap_or_else(|e| e.into_inner());
        match listeners.get_mut(&kind) {
            Some(list) => {
                let before = list.len();
                list.retain(|(lid, _)| *lid != id);
                list.len() != before
            },
            None => false,
        }
    }

    /// Remove every listener.
    pub fn clear(&self) {
        self.listeners.write().unwrap_or_else(|e| e.into_inner()).clear();
    }

    pub fn listener_count(&self, kind: StreamEventKind) -> usize {
        self.listeners
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&kind)
            .map_or(0, Vec::len)
    }

    pub fn on_connected(&self, f: impl Fn(&str) + Send + Sync + 'static) -> ListenerId {
        self.on(StreamEventKind::Connected, move |event| {
            if let StreamEvent::Connected { url } = event {
                f(url);
            }
        })
    }

    pub fn on_log(&self, f: impl Fn(&LogEvent) + Send + Sync + 'static) -> ListenerId {
        self.on(StreamEventKind::Log, move |event| {
            if let StreamEvent::Log(log) = event {
                f(log);
            }
        })
    }

    pub fn on_status(&self, f: impl Fn(&LogEvent) + Send + Sync + 'static) -> ListenerId {
        self.on(StreamEventKind::Status, move |event| {
            if let StreamEvent::Status(status) = event {
                f(status);
            }
        })
    }

    pub fn on_complete(&self, f: impl Fn(&LogEvent) + Send + Sync + 'static) -> ListenerId {
        self.on(StreamEventKind::Complete, move |event| {
            if let StreamEvent::Complete(done) = event {
                f(done);
            }
        })
    }

    /// Register an error listener.
    ///
    /// The callback receives a [`ConnectionError`] indicating whether the
    /// session will reconnect on its own or has given up.
    pub fn on_error(&self, f: impl Fn(&ConnectionError) + Send + Sync + 'static) -> ListenerId {
        self.on(StreamEventKind::Error, move |event| {
            if let StreamEvent::Error(err) = event {
                f(err);
            }
        })
    }

    pub fn on_disconnected(
        &self,
        f: impl Fn(&DisconnectReason) + Send + Sync + 'static,
    ) -> ListenerId {
        self.on(StreamEventKind::Disconnected, move |event| {
            if let StreamEvent::Disconnected(reason) = event {
                f(reason);
            }
        })
    }

    /// Deliver an event to every listener registered for its kind.
    ///
    /// The listener list is snapshotted first, so listeners may register,
    /// remove listeners or disconnect the session while being called.
    pub fn emit(&self, event: &StreamEvent) {
        let kind = event.kind();
        let handlers: Vec<EventCallback> = {
            let listeners = self.listeners.read().unwrap_or_else(|e| e.into_inner());
            match listeners.get(&kind) {
                Some(list) => list.iter().map(|(_, cb)| cb.clone()).collect(),
                None => return,
            }
        };

        for handler in handlers {
            if catch_unwind(AssertUnwindSafe(|| handler(event))).is_err() {
                log::error!("[tasklog-link] Listener for '{}' panicked; continuing", kind);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{LogEventKind, LogPayload};
    use std::sync::Mutex;

    fn log_event(text: &str) -> StreamEvent {
        StreamEvent::Log(LogEvent::new(LogEventKind::Log, LogPayload::Raw(text.to_string())))
    }

    #[test]
    fn test_emit_reaches_only_matching_kind() {
        let dispatcher = EventDispatcher::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let s = seen.clone();
        dispatcher.on_log(move |ev| s.lock().unwrap().push(ev.content()));
        let s = seen.clone();
        dispatcher.on_status(move |_| s.lock().unwrap().push("status".to_string()));

        dispatcher.emit(&log_event("hello"));
        assert_eq!(*seen.lock().unwrap(), vec!["hello".to_string()]);
    }

    #[test]
    fn test_off_removes_listener() {
        let dispatcher = EventDispatcher::new();
        let hits = Arc::new(AtomicU64::new(0));

        let h = hits.clone();
        let id = dispatcher.on_log(move |_| {
            h.fetch_add(1, Ordering::SeqCst);
        });
        dispatcher.emit(&log_event("a"));
        assert!(dispatcher.off(StreamEventKind::Log, id));
        assert!(!dispatcher.off(StreamEventKind::Log, id));
        dispatcher.emit(&log_event("b"));

        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_panicking_listener_does_not_stop_fanout() {
        let dispatcher = EventDispatcher::new();
        let hits = Arc::new(AtomicU64::new(0));

        dispatcher.on_log(|_| panic!("listener bug"));
        let h = hits.clone();
        dispatcher.on_log(move |_| {
            h.fetch_add(1, Ordering::SeqCst);
        });

        dispatcher.emit(&log_event("x"));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_listener_may_register_during_emit() {
        let dispatcher = EventDispatcher::new();
        let inner = dispatcher.clone();
        dispatcher.on_log(move |_| {
            inner.on_log(|_| {});
        });

        dispatcher.emit(&log_event("x"));
        assert_eq!(dispatcher.listener_count(StreamEventKind::Log), 2);
    }

    #[test]
    fn test_clear() {
        let dispatcher = EventDispatcher::new();
        dispatcher.on_error(|_| {});
        dispatcher.on_disconnected(|_| {});
        dispatcher.clear();
        for kind in StreamEventKind::ALL {
            assert_eq!(dispatcher.listener_count(kind), 0);
        }
    }

    #[test]
    fn test_disconnect_reason_reaches_listener() {
        let dispatcher = EventDispatcher::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        dispatcher.on_disconnected(move |reason| {
            sink.lock().unwrap().push(reason.to_string());
        });

        dispatcher.emit(&StreamEvent::Disconnected(DisconnectReason::new("Task completed")));
        assert_eq!(*seen.lock().unwrap(), vec!["Task completed".to_string()]);
    }
}
