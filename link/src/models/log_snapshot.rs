use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::time::Duration;

/// Work status codes the backend uses for finished runs.
const FINISHED_STATUSES: [i64; 2] = [3, 4];

/// Snapshot of a task/work log as returned by the polling endpoints.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LogSnapshot {
    /// Accumulated log text.
    #[serde(default, alias = "log", alias = "logs")]
    pub content: String,

    /// Backend work status code (3 = success, 4 = failed), if reported.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<i64>,

    /// Whether the run has finished.
    #[serde(default, alias = "finished", alias = "isCompleted")]
    pub completed: bool,

    /// Number of lines in `content`, if the backend reported it.
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "lineCount")]
    pub lines: Option<u64>,
}

impl LogSnapshot {
    /// Build a snapshot from a response body.
    ///
    /// Accepts the `{code, message, data}` envelope or a bare object; a body
    /// that is a plain string is taken as the log content. `completed` is
    /// derived from the status code when the flag itself is absent.
    pub fn from_body(body: &JsonValue, raw: &str) -> Self {
        let inner = match body {
            JsonValue::Object(map) => match map.get("data") {
                Some(data @ JsonValue::Object(_)) => data,
                // `{data: "<text>"}` carries the log itself
                Some(JsonValue::String(text)) => return Self::raw(text.clone()),
                _ => body,
            },
            JsonValue::String(text) => return Self::raw(text.clone()),
            _ => return Self::raw(raw.to_string()),
        };

        let mut snapshot = match serde_json::from_value::<LogSnapshot>(inner.clone()) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                log::warn!("[LOG_POLL] Irregular log snapshot ({}); reading fields one by one", e);
                Self::lenient(inner, raw)
            },
        };
        if !snapshot.completed {
            snapshot.completed = snapshot
                .status
                .map(|s| FINISHED_STATUSES.contains(&s))
                .unwrap_or(false);
        }
        if snapshot.lines.is_none() && !snapshot.content.is_empty() {
            snapshot.lines = Some(snapshot.content.lines().count() as u64);
        }
        snapshot
    }

    /// Field-by-field read of an object that does not match the strict shape.
    ///
    /// Wrongly typed fields are skipped; numbers may arrive as strings. When
    /// no content field holds text the raw body is kept as the content.
    fn lenient(value: &JsonValue, raw: &str) -> Self {
        let content = ["content", "log", "logs"]
            .iter()
            .find_map(|key| value.get(key).and_then(JsonValue::as_str))
            .map(str::to_string)
            .unwrap_or_else(|| raw.to_string());
        let completed = ["completed", "finished", "isCompleted"]
            .iter()
            .find_map(|key| value.get(key).and_then(JsonValue::as_bool))
            .unwrap_or(false);
        let lines = ["lines", "lineCount"]
            .iter()
            .find_map(|key| value.get(key).and_then(as_number))
            .and_then(|n| u64::try_from(n).ok());

        Self {
            content,
            status: value.get("status").and_then(as_number),
            completed,
            lines,
        }
    }

    fn raw(content: String) -> Self {
        let lines = Some(content.lines().count() as u64);
        Self {
            content,
            status: None,
            completed: false,
            lines,
        }
    }
}

fn as_number(value: &JsonValue) -> Option<i64> {
    match value {
        JsonValue::Number(n) => n.as_i64(),
        JsonValue::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Result of a polling retrieval: the snapshot plus how it was obtained.
#[derive(Debug, Clone)]
pub struct FetchedLog {
    pub snapshot: LogSnapshot,
    /// Attempts used, including the successful one.
    pub attempts: u32,
    /// Wall time across all attempts.
    pub elapsed: Duration,
}
