//! Server-sent-events transport behind a trait seam.
//!
//! [`StreamSession`](crate::StreamSession) only sees a stream of
//! [`TransportEvent`]s. The production implementation,
//! [`EventSourceTransport`], drives `reqwest-eventsource` with its built-in
//! retry disabled; reconnection is owned by the session.

use std::pin::Pin;

use async_trait::async_trait;
use futures_util::{stream, Stream, StreamExt};
use reqwest::header::{ACCEPT, CACHE_CONTROL};
use reqwest_eventsource::{retry, Error as EventSourceError, Event, EventSource};

use crate::auth::redact_url;
use crate::error::{Result, TaskLinkError};

/// One SSE frame as delivered by the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseMessage {
    /// Event name; `message` for unnamed frames.
    pub event: String,
    pub data: String,
    /// Value of the `id:` field, empty when absent.
    pub id: String,
}

impl SseMessage {
    pub fn new(event: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            event: event.into(),
            data: data.into(),
            id: String::new(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// The server accepted the request and the event stream is open.
    Open,
    Message(SseMessage),
}

/// Items produced by an open transport. The stream ending means the server
/// closed the connection.
pub type TransportStream = Pin<Box<dyn Stream<Item = Result<TransportEvent>> + Send>>;

/// Opens one long-lived event stream.
#[async_trait]
pub trait StreamTransport: Send + Sync {
    /// Open `url`, resuming after `last_event_id` when given.
    async fn open(&self, url: &str, last_event_id: Option<&str>) -> Result<TransportStream>;
}

/// [`StreamTransport`] over HTTP using `reqwest-eventsource`.
#[derive(Debug, Clone)]
pub struct EventSourceTransport {
    http_client: reqwest::Client,
}

impl EventSourceTransport {
    /// The client must not carry a total request timeout, or it would cut
    /// every stream off after that long.
    pub fn new(http_client: reqwest::Client) -> Self {
        Self { http_client }
    }
}

#[async_trait]
impl StreamTransport for EventSourceTransport {
    async fn open(&self, url: &str, last_event_id: Option<&str>) -> Result<TransportStream> {
        let mut request = self
            .http_client
            .get(url)
            .header(ACCEPT, "text/event-stream")
            .header(CACHE_CONTROL, "no-cache");
        if let Some(id) = last_event_id {
            request = request.header("Last-Event-ID", id);
        }

        let mut source = EventSource::new(request)
            .map_err(|e| TaskLinkError::ConfigurationError(format!("Cannot build stream request: {}", e)))?;
        source.set_retry_policy(Box::new(retry::Never));

        log::debug!("[tasklog-link] Opening event stream {}", redact_url(url));

        let events = stream::unfold(Some(source), |state| async move {
            let mut source = state?;
            match source.next().await {
                Some(Ok(Event::Open)) => Some((Ok(TransportEvent::Open), Some(source))),
                Some(Ok(Event::Message(msg))) => {
                    let message = SseMessage {
                        event: msg.event,
                        data: msg.data,
                        id: msg.id,
                    };
                    Some((Ok(TransportEvent::Message(message)), Some(source)))
                },
                Some(Err(EventSourceError::StreamEnded)) | None => {
                    source.close();
                    None
                },
                Some(Err(e)) => {
                    source.close();
                    Some((Err(classify_error(e)), None))
                },
            }
        });

        Ok(Box::pin(events))
    }
}

fn classify_error(err: EventSourceError) -> TaskLinkError {
    match err {
        EventSourceError::InvalidStatusCode(status, _) => match status.as_u16() {
            401 => TaskLinkError::AuthenticationError(
                "Stream rejected: session expired".to_string(),
            ),
            404 => TaskLinkError::NotFound("log stream".to_string()),
            code => TaskLinkError::ServerError {
                status_code: code,
                message: status.canonical_reason().unwrap_or("").to_string(),
            },
        },
        EventSourceError::InvalidContentType(value, _) => TaskLinkError::MalformedPayload(format!(
            "Unexpected content type for event stream: {:?}",
            value
        )),
        EventSourceError::Transport(e) => TaskLinkError::from(e),
        EventSourceError::Utf8(e) => TaskLinkError::MalformedPayload(e.to_string()),
        EventSourceError::Parser(e) => TaskLinkError::MalformedPayload(e.to_string()),
        other => TaskLinkError::NetworkError(other.to_string()),
    }
}
