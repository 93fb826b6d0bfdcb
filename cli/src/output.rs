//! Terminal rendering of log events and snapshots.

use serde_json::Value as JsonValue;
use tasklog_link::{FetchedLog, LogEvent, LoginRedirect};

use crate::error::Result;

/// One streamed log entry, without its trailing newline.
pub fn format_log_line(event: &LogEvent) -> String {
    event.content().trim_end_matches(['\r', '\n']).to_string()
}

/// Status updates go to stderr so stdout stays the pure log.
pub fn format_status(event: &LogEvent) -> String {
    let status = event
        .payload()
        .as_json()
        .and_then(|v| v.get("status"))
        .map(render_scalar);
    match status {
        Some(status) => format!("[status] {}", status),
        None => format!("[status] {}", event.content()),
    }
}

pub fn format_completion(event: &LogEvent) -> String {
    let status = event
        .payload()
        .as_json()
        .and_then(|v| v.get("status"))
        .map(render_scalar);
    match status {
        Some(status) => format!("-- run finished (status {}) --", status),
        None => "-- run finished --".to_string(),
    }
}

fn render_scalar(value: &JsonValue) -> String {
    match value {
        JsonValue::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Snapshot as printed by `tasklog fetch`.
pub fn render_snapshot(fetched: &FetchedLog, json: bool) -> Result<String> {
    if json {
        return Ok(serde_json::to_string_pretty(&fetched.snapshot)?);
    }
    let mut out = fetched.snapshot.content.clone();
    if !out.is_empty() && !out.ends_with('\n') {
        out.push('\n');
    }
    Ok(out)
}

/// Prints the expiry notice to stderr; the process exits afterwards.
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalRedirect;

impl LoginRedirect for TerminalRedirect {
    fn show_notice(&self, message: &str) {
        eprintln!("{}", message);
    }

    fn redirect_to_login(&self) {
        eprintln!("Run `tasklog login --token <TOKEN>` to sign in again.");
    }
}
