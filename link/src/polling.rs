//! Snapshot retrieval of task logs with an escalating timeout budget.
//!
//! Large playbook logs can take the backend a long time to assemble. The
//! first request gets a short budget; only if that attempt times out is the
//! request repeated, once, with a much longer budget. Every other failure is
//! surfaced immediately.

use std::time::{Duration, Instant};

use log::{debug, info, warn};
use serde_json::Value as JsonValue;

use crate::{
    error::{Result, TaskLinkError},
    gateway::RequestGateway,
    models::{FetchedLog, GatewayResponse, LogSnapshot, RequestSpec},
    timeouts::LinkTimeouts,
};

/// Per-attempt timeouts for one retrieval.
///
/// Attempt 1 uses `first_timeout`, every later attempt `retry_timeout`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryBudget {
    first_timeout: Duration,
    retry_timeout: Duration,
    max_attempts: u32,
    attempts: u32,
}

impl RetryBudget {
    pub fn new(first_timeout: Duration, retry_timeout: Duration, max_attempts: u32) -> Self {
        Self {
            first_timeout,
            retry_timeout,
            max_attempts,
            attempts: 0,
        }
    }

    /// Short first attempt, one long retry.
    pub fn escalating(timeouts: &LinkTimeouts) -> Self {
        Self::new(timeouts.first_attempt_timeout, timeouts.retry_timeout, 2)
    }

    /// A single attempt, never retried.
    pub fn single(timeout: Duration) -> Self {
        Self::new(timeout, timeout, 1)
    }

    /// Start the next attempt, returning its timeout, or `None` when spent.
    pub fn next_attempt(&mut self) -> Option<Duration> {
        if self.attempts >= self.max_attempts {
            return None;
        }
        self.attempts += 1;
        Some(self.timeout_for(self.attempts))
    }

    fn timeout_for(&self, attempt: u32) -> Duration {
        if attempt <= 1 {
            self.first_timeout
        } else {
            self.retry_timeout
        }
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn is_exhausted(&self) -> bool {
        self.attempts >= self.max_attempts
    }
}

/// Fetches log snapshots over plain request/response HTTP.
#[derive(Clone, Debug)]
pub struct PollingFallbackClient {
    gateway: RequestGateway,
    timeouts: LinkTimeouts,
}

impl PollingFallbackClient {
    pub fn new(gateway: RequestGateway, timeouts: LinkTimeouts) -> Self {
        Self { gateway, timeouts }
    }

    /// Fetch the accumulated log of one work unit.
    ///
    /// Retries exactly once, with the long budget, when the first attempt
    /// times out. When the retry times out as well the error names the long
    /// budget and reports two attempts.
    pub async fn fetch_log(&self, task_id: u64, work_id: u64) -> Result<FetchedLog> {
        let path = log_path(task_id, work_id);
        let mut budget = RetryBudget::escalating(&self.timeouts);
        let start = Instant::now();

        while let Some(timeout) = budget.next_attempt() {
            let attempt = budget.attempts();
            let spec = RequestSpec::get(path.as_str())
                .query("t", nonce())
                .query("realtime", true)
                .query("includeBuffer", true)
                .timeout(timeout);

            debug!(
                "[LOG_POLL] Fetching task={} work={} attempt={} timeout={:?}",
                task_id, work_id, attempt, timeout
            );

            match self.gateway.send(spec).await {
                Ok(response) => {
                    let snapshot = snapshot_from(&response, &path)?;
                    let elapsed = start.elapsed();
                    info!(
                        "[LOG_POLL] Fetched task={} work={} bytes={} attempts={} elapsed_ms={}",
                        task_id,
                        work_id,
                        snapshot.content.len(),
                        attempt,
                        elapsed.as_millis()
                    );
                    return Ok(FetchedLog {
                        snapshot,
                        attempts: attempt,
                        elapsed,
                    });
                },
                Err(e) if e.is_timeout() && !budget.is_exhausted() => {
                    warn!(
                        "[LOG_POLL] Attempt {} timed out after {:?}; task is probably still running, retrying with {:?}",
                        attempt, timeout, self.timeouts.retry_timeout
                    );
                },
                Err(e) if e.is_timeout() => {
                    warn!(
                        "[LOG_POLL] Gave up on task={} work={} after {} attempts ({:?})",
                        task_id,
                        work_id,
                        attempt,
                        start.elapsed()
                    );
                    return Err(TaskLinkError::timeout("fetch_log", timeout, attempt));
                },
                Err(e) => return Err(e),
            }
        }

        Err(TaskLinkError::ConfigurationError("retry budget allows no attempts".into()))
    }

    /// Fetch the tail of a log straight from the backend's buffer.
    ///
    /// A single short attempt. Its failure is returned as-is; nothing falls
    /// back further.
    pub async fn fetch_log_direct(&self, task_id: u64, work_id: u64) -> Result<FetchedLog> {
        let path = format!("{}/direct", log_path(task_id, work_id));
        let timeout = self.timeouts.direct_timeout;
        let start = Instant::now();

        let spec = RequestSpec::get(path.as_str())
            .query("t", nonce())
            .query("tail", true)
            .query("lines", 1000)
            .query("nocache", true)
            .timeout(timeout);

        debug!("[LOG_POLL] Direct fetch task={} work={} timeout={:?}", task_id, work_id, timeout);

        let response = self.gateway.send(spec).await.map_err(|e| {
            if e.is_timeout() {
                TaskLinkError::timeout("fetch_log_direct", timeout, 1)
            } else {
                e
            }
        })?;

        Ok(FetchedLog {
            snapshot: snapshot_from(&response, &path)?,
            attempts: 1,
            elapsed: start.elapsed(),
        })
    }
}

fn log_path(task_id: u64, work_id: u64) -> String {
    format!("task/ansible/{}/log/{}", task_id, work_id)
}

/// Cache-busting nonce: current time in milliseconds.
fn nonce() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Interpret a successful response, honouring an application-level failure
/// code carried inside the envelope.
fn snapshot_from(response: &GatewayResponse, path: &str) -> Result<LogSnapshot> {
    if let Some(code) = response.body_code().filter(|c| *c >= 400) {
        let message = response.body_message().unwrap_or_default();
        return Err(if code == 404 {
            TaskLinkError::NotFound(if message.is_empty() { path.to_string() } else { message })
        } else {
            TaskLinkError::ServerError {
                status_code: code as u16,
                message,
            }
        });
    }
    match &response.body {
        JsonValue::Object(_) | JsonValue::String(_) => {
            Ok(LogSnapshot::from_body(&response.body, &response.raw))
        },
        // a bare scalar or array is log text that happens to parse as JSON
        _ => Ok(LogSnapshot::from_body(&JsonValue::Null, &response.raw)),
    }
}
