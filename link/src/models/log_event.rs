use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value as JsonValue;

/// Kind of a streamed log event, as named on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogEventKind {
    Log,
    Status,
    Complete,
    Error,
}

impl LogEventKind {
    /// Map an SSE `event:` name onto a kind.
    ///
    /// Unnamed events arrive as `message`; the backend writes plain log
    /// lines that way, so they are treated as `log`. Unknown names yield
    /// `None` and are skipped by the stream reader.
    pub fn from_wire(name: &str) -> Option<Self> {
        match name {
            "" | "message" | "log" => Some(Self::Log),
            "status" => Some(Self::Status),
            "complete" => Some(Self::Complete),
            "error" => Some(Self::Error),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Log => "log",
            Self::Status => "status",
            Self::Complete => "complete",
            Self::Error => "error",
        }
    }
}

/// Event payload: parsed JSON when possible, the raw text otherwise.
///
/// Only objects and arrays are `Structured`; that holds for values read back
/// with serde as well as for [`LogPayload::parse`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum LogPayload {
    Structured(JsonValue),
    Raw(String),
}

impl LogPayload {
    /// Parse `data` as JSON, falling back to the raw text.
    ///
    /// Bare JSON scalars (a line that happens to read `42` or `true`) are
    /// kept as raw text: log lines are text, and only objects/arrays carry
    /// structure worth preserving.
    pub fn parse(data: &str) -> Self {
        match serde_json::from_str::<JsonValue>(data) {
            Ok(value @ (JsonValue::Object(_) | JsonValue::Array(_))) => Self::Structured(value),
            _ => Self::Raw(data.to_string()),
        }
    }

    pub fn is_raw(&self) -> bool {
        matches!(self, Self::Raw(_))
    }

    /// Text content of the payload.
    ///
    /// For structured payloads this is the `content` (or `message`) field when
    /// present, otherwise the compact JSON rendering.
    pub fn content(&self) -> String {
        match self {
            Self::Raw(text) => text.clone(),
            Self::Structured(value) => value
                .get("content")
                .or_else(|| value.get("message"))
                .and_then(JsonValue::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| value.to_string()),
        }
    }

    pub fn as_json(&self) -> Option<&JsonValue> {
        match self {
            Self::Structured(value) => Some(value),
            Self::Raw(_) => None,
        }
    }
}

impl From<JsonValue> for LogPayload {
    fn from(value: JsonValue) -> Self {
        match value {
            JsonValue::Object(_) | JsonValue::Array(_) => Self::Structured(value),
            JsonValue::String(text) => Self::Raw(text),
            other => Self::Raw(other.to_string()),
        }
    }
}

impl<'de> Deserialize<'de> for LogPayload {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        JsonValue::deserialize(deserializer).map(Self::from)
    }
}

/// A discrete unit of streamed output. Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEvent {
    kind: LogEventKind,
    payload: LogPayload,
    received_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<String>,
}

impl LogEvent {
    pub fn new(kind: LogEventKind, payload: LogPayload) -> Self {
        Self {
            kind,
            payload,
            received_at: Utc::now(),
            id: None,
        }
    }

    pub(crate) fn with_id(mut self, id: Option<String>) -> Self {
        self.id = id.filter(|s| !s.is_empty());
        self
    }

    pub fn kind(&self) -> LogEventKind {
        self.kind
    }

    pub fn payload(&self) -> &LogPayload {
        &self.payload
    }

    /// Arrival timestamp, taken when the frame was read off the wire.
    pub fn received_at(&self) -> DateTime<Utc> {
        self.received_at
    }

    /// SSE event id, when the server sent one.
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn content(&self) -> String {
        self.payload.content()
    }
}
