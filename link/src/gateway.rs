//! Single choke point for outbound HTTP calls.

use std::future;
use std::time::{Duration, Instant};

use log::{debug, warn};
use reqwest::StatusCode;

use crate::{
    auth::AuthProvider,
    error::{Result, TaskLinkError},
    models::{GatewayResponse, RequestSpec},
    session_expiry::SessionExpiryCoordinator,
    timeouts::LinkTimeouts,
};

/// Prefix every relative API path is normalized onto.
pub const API_PREFIX: &str = "/api/v1";

/// Body codes that signal an expired session on an otherwise successful
/// response.
const EXPIRY_BODY_CODES: [i64; 2] = [401, 406];

/// Sends every HTTP request of the client.
///
/// Per request it:
/// 1. refuses immediately while a login redirect is in progress,
/// 2. normalizes the path onto [`API_PREFIX`],
/// 3. attaches the bearer token from the session store,
/// 4. turns expiry signals (HTTP 401, body `code` 401/406) into a single
///    coordinator report and a future that never resolves,
/// 5. classifies everything else into a [`TaskLinkError`].
#[derive(Clone, Debug)]
pub struct RequestGateway {
    base_url: String,
    http_client: reqwest::Client,
    coordinator: SessionExpiryCoordinator,
    default_timeout: Duration,
}

impl RequestGateway {
    pub fn new(
        base_url: impl Into<String>,
        http_client: reqwest::Client,
        coordinator: SessionExpiryCoordinator,
        default_timeout: Duration,
    ) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            base_url,
            http_client,
            coordinator,
            default_timeout,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn coordinator(&self) -> &SessionExpiryCoordinator {
        &self.coordinator
    }

    /// Absolute URL for `path`.
    ///
    /// Absolute URLs pass through untouched. Relative paths are placed under
    /// [`API_PREFIX`] unless they already start with it.
    pub fn resolve_url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }
        let trimmed = path.trim_start_matches('/');
        let prefix = API_PREFIX.trim_start_matches('/');
        if trimmed == prefix || trimmed.starts_with(&format!("{}/", prefix)) {
            format!("{}/{}", self.base_url, trimmed)
        } else {
            format!("{}{}/{}", self.base_url, API_PREFIX, trimmed)
        }
    }

    /// Send a request.
    ///
    /// On a session-expiry signal the returned future never completes: the
    /// coordinator takes over and the caller's business logic must not run.
    /// Callers that need a bound wrap the call in `tokio::time::timeout`.
    pub async fn send(&self, spec: RequestSpec) -> Result<GatewayResponse> {
        if self.coordinator.is_redirecting() {
            debug!("[LINK_HTTP] Refusing {} {}: login redirect in progress", spec.method, spec.path);
            return Err(TaskLinkError::RedirectInProgress);
        }

        let url = self.resolve_url(&spec.path);
        let timeout = spec.timeout.unwrap_or(self.default_timeout);

        let mut req = self.http_client.request(spec.method.clone(), &url);
        if !spec.query.is_empty() {
            req = req.query(&spec.query);
        }
        for (name, value) in &spec.headers {
            req = req.header(name.as_str(), value.as_str());
        }
        if !spec.has_header("Authorization") {
            let auth = AuthProvider::from_store(self.coordinator.store().as_ref())?;
            req = auth.apply_to_request(req);
        }
        if let Some(body) = &spec.body {
            req = req.json(body);
        }
        if !LinkTimeouts::is_no_timeout(timeout) {
            req = req.timeout(timeout);
        }

        let start = Instant::now();
        debug!("[LINK_HTTP] Sending {} to {} (timeout={:?})", spec.method, url, timeout);

        let response = match req.send().await {
            Ok(response) => response,
            Err(e) => return Err(self.transport_error(e, &spec, timeout, start)),
        };
        let status = response.status();
        let raw = match response.text().await {
            Ok(raw) => raw,
            Err(e) => return Err(self.transport_error(e, &spec, timeout, start)),
        };
        debug!(
            "[LINK_HTTP] Response received: status={} bytes={} duration_ms={}",
            status,
            raw.len(),
            start.elapsed().as_millis()
        );

        let response = GatewayResponse::new(status.as_u16(), raw);

        if status == StatusCode::UNAUTHORIZED {
            return self.suppress_expired(response.body_message()).await;
        }

        if status.is_success() {
            if let Some(code) = response.body_code().filter(|c| EXPIRY_BODY_CODES.contains(c)) {
                debug!("[LINK_HTTP] Body code {} on {}: session expired", code, spec.path);
                return self.suppress_expired(response.body_message()).await;
            }
            return Ok(response);
        }

        let message = response.body_message().unwrap_or_default();
        warn!(
            "[LINK_HTTP] Server error: status={} message=\"{}\" duration_ms={}",
            status,
            message,
            start.elapsed().as_millis()
        );

        if status == StatusCode::NOT_FOUND {
            return Err(TaskLinkError::NotFound(if message.is_empty() {
                spec.path.clone()
            } else {
                message
            }));
        }

        Err(TaskLinkError::ServerError {
            status_code: status.as_u16(),
            message,
        })
    }

    async fn suppress_expired<T>(&self, message: Option<String>) -> Result<T> {
        self.coordinator.report_expiry(message.as_deref());
        future::pending().await
    }

    fn transport_error(
        &self,
        err: reqwest::Error,
        spec: &RequestSpec,
        timeout: Duration,
        start: Instant,
    ) -> TaskLinkError {
        warn!(
            "[LINK_HTTP] Transport error on {} {}: {} duration_ms={}",
            spec.method,
            spec.path,
            err,
            start.elapsed().as_millis()
        );
        if err.is_timeout() {
            TaskLinkError::timeout(format!("{} {}", spec.method, spec.path), timeout, 1)
        } else if err.is_connect() {
            TaskLinkError::NetworkError(format!("Cannot reach {}: {}", self.base_url, err))
        } else {
            TaskLinkError::from(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session_expiry::NoopRedirect;
    use crate::storage::MemorySessionStore;
    use std::sync::Arc;

    fn gateway(base: &str) -> RequestGateway {
        let coordinator = SessionExpiryCoordinator::new(
            Arc::new(MemorySessionStore::new()),
            Arc::new(NoopRedirect),
            Duration::from_secs(1),
        );
        RequestGateway::new(base, reqwest::Client::new(), coordinator, Duration::from_secs(5))
    }

    #[test]
    fn test_resolve_url_prefixes_relative_paths() {
        let gw = gateway("http://ops.local:8080/");
        assert_eq!(
            gw.resolve_url("task/ansible/1/log/2"),
            "http://ops.local:8080/api/v1/task/ansible/1/log/2"
        );
        assert_eq!(
            gw.resolve_url("/task/ansible/1/log/2"),
            "http://ops.local:8080/api/v1/task/ansible/1/log/2"
        );
        assert_eq!(gw.resolve_url("/api/v1/user/info"), "http://ops.local:8080/api/v1/user/info");
        assert_eq!(gw.resolve_url("https://elsewhere/x"), "https://elsewhere/x");
    }

    #[tokio::test]
    async fn test_refuses_while_redirecting() {
        let gw = gateway("http://127.0.0.1:9");
        gw.coordinator().report_expiry(None);

        let err = gw.send(RequestSpec::get("task")).await.unwrap_err();
        assert!(matches!(err, TaskLinkError::RedirectInProgress));
    }
}
