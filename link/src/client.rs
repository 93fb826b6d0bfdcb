//! Task log client with builder pattern.
//!
//! Wires the shared pieces together: one HTTP connection pool, one session
//! store, one [`SessionExpiryCoordinator`] and the [`RequestGateway`] every
//! request goes through.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value as JsonValue;

use crate::{
    auth::{resolve_token, stream_url_with_token},
    config::LinkConfig,
    error::{Result, TaskLinkError},
    gateway::{RequestGateway, API_PREFIX},
    models::{FetchedLog, HttpVersion, StreamOptions},
    polling::PollingFallbackClient,
    session_expiry::{LoggingRedirect, LoginRedirect, SessionExpiryCoordinator},
    storage::{FileSessionStore, MemorySessionStore, SessionStore, TOKEN_KEY},
    stream::StreamSession,
    timeouts::LinkTimeouts,
    transport::EventSourceTransport,
};

/// Client for the task log endpoints.
///
/// Use [`TaskLogClientBuilder`] to construct instances.
///
/// # Examples
///
/// ```rust,no_run
/// use tasklog_link::TaskLogClient;
///
/// # async fn example() -> tasklog_link::Result<()> {
/// let client = TaskLogClient::builder()
///     .base_url("http://localhost:8000")
///     .build()?;
///
/// client.establish_session("eyJhbGc...")?;
/// let fetched = client.fetch_log(42, 7).await?;
/// println!("{}", fetched.snapshot.content);
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct TaskLogClient {
    base_url: String,
    http_client: reqwest::Client,
    gateway: RequestGateway,
    polling: PollingFallbackClient,
    timeouts: LinkTimeouts,
    stream_options: StreamOptions,
}

impl TaskLogClient {
    /// Create a new builder for configuring the client
    pub fn builder() -> TaskLogClientBuilder {
        TaskLogClientBuilder::new()
    }

    /// Accumulated log of one work unit, with the escalating timeout budget.
    pub async fn fetch_log(&self, task_id: u64, work_id: u64) -> Result<FetchedLog> {
        self.polling.fetch_log(task_id, work_id).await
    }

    /// Tail of one work unit's log, single short attempt.
    pub async fn fetch_log_direct(&self, task_id: u64, work_id: u64) -> Result<FetchedLog> {
        self.polling.fetch_log_direct(task_id, work_id).await
    }

    /// Event-stream URL for one work unit, carrying the current token.
    ///
    /// The stream shares its path with the polling endpoint; the backend
    /// switches on `Accept: text/event-stream`.
    pub fn stream_url(&self, task_id: u64, work_id: u64) -> Result<String> {
        let url = format!(
            "{}{}/task/ansible/{}/log/{}",
            self.base_url, API_PREFIX, task_id, work_id
        );
        let token = resolve_token(self.session_store().as_ref())?;
        stream_url_with_token(&url, token.as_deref())
    }

    /// A new, idle stream session sharing this client's connection pool.
    ///
    /// A stream rejected with 401 is reported to the client's coordinator.
    pub fn new_stream_session(&self) -> StreamSession {
        let transport = Arc::new(EventSourceTransport::new(self.http_client.clone()));
        StreamSession::with_coordinator(transport, self.gateway.coordinator().clone())
    }

    /// Store `token` and end any expiry episode in progress.
    pub fn establish_session(&self, token: impl Into<String>) -> Result<()> {
        let token = token.into();
        if token.trim().is_empty() {
            return Err(TaskLinkError::ConfigurationError("token must not be empty".into()));
        }
        self.session_store()
            .set_item(TOKEN_KEY, JsonValue::String(token))?;
        self.gateway.coordinator().reset();
        log::debug!("[SESSION] Session established");
        Ok(())
    }

    /// Forget the stored session.
    pub fn logout(&self) -> Result<()> {
        self.session_store().clear_all()?;
        log::debug!("[SESSION] Session cleared");
        Ok(())
    }

    pub fn is_authenticated(&self) -> Result<bool> {
        Ok(resolve_token(self.session_store().as_ref())?.is_some())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn gateway(&self) -> &RequestGateway {
        &self.gateway
    }

    pub fn coordinator(&self) -> &SessionExpiryCoordinator {
        self.gateway.coordinator()
    }

    /// Get the configured timeouts
    pub fn timeouts(&self) -> &LinkTimeouts {
        &self.timeouts
    }

    /// Options applied by callers that do not bring their own.
    pub fn stream_options(&self) -> &StreamOptions {
        &self.stream_options
    }

    fn session_store(&self) -> &Arc<dyn SessionStore> {
        self.gateway.coordinator().store()
    }
}

/// Builder for configuring [`TaskLogClient`] instances.
pub struct TaskLogClientBuilder {
    base_url: Option<String>,
    token: Option<String>,
    timeouts: LinkTimeouts,
    stream_options: StreamOptions,
    http_version: HttpVersion,
    session_store: Option<Arc<dyn SessionStore>>,
    login_redirect: Arc<dyn LoginRedirect>,
}

impl TaskLogClientBuilder {
    fn new() -> Self {
        Self {
            base_url: None,
            token: None,
            timeouts: LinkTimeouts::default(),
            stream_options: StreamOptions::default(),
            http_version: HttpVersion::default(),
            session_store: None,
            login_redirect: Arc::new(LoggingRedirect),
        }
    }

    /// Set the backend root URL (without `/api/v1`)
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Seed the session store with a bearer token at build time
    pub fn token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Set comprehensive timeout configuration for all operations
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// use tasklog_link::{LinkTimeouts, TaskLogClient};
    ///
    /// # fn example() -> tasklog_link::Result<()> {
    /// let client = TaskLogClient::builder()
    ///     .base_url("http://localhost:8000")
    ///     .timeouts(LinkTimeouts::fast())
    ///     .build()?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn timeouts(mut self, timeouts: LinkTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    pub fn stream_options(mut self, options: StreamOptions) -> Self {
        self.stream_options = options;
        self
    }

    /// Set the HTTP protocol version to use
    ///
    /// - `HttpVersion::Http1` - HTTP/1.1 (default)
    /// - `HttpVersion::Http2` - HTTP/2 with prior knowledge
    /// - `HttpVersion::Auto` - Let the client negotiate with the server
    pub fn http_version(mut self, version: HttpVersion) -> Self {
        self.http_version = version;
        self
    }

    /// Where the session (token) lives. Defaults to an in-memory store.
    pub fn session_store(mut self, store: Arc<dyn SessionStore>) -> Self {
        self.session_store = Some(store);
        self
    }

    /// What happens on session expiry. Defaults to [`LoggingRedirect`].
    pub fn login_redirect(mut self, redirect: Arc<dyn LoginRedirect>) -> Self {
        self.login_redirect = redirect;
        self
    }

    /// Apply a loaded [`LinkConfig`].
    ///
    /// Settings made before this call are overwritten where the config has a
    /// value; a `store_path` selects a [`FileSessionStore`].
    pub fn config(mut self, config: &LinkConfig) -> Self {
        if let Some(url) = &config.server.url {
            self.base_url = Some(url.clone());
        }
        if let Some(token) = &config.token {
            self.token = Some(token.clone());
        }
        self.http_version = config.server.http_version;
        self.timeouts = config.timeouts();
        self.stream_options = config.stream.clone();
        if let Some(path) = &config.session.store_path {
            self.session_store = Some(Arc::new(FileSessionStore::with_namespace(
                path.clone(),
                config.session.namespace.clone(),
            )));
        }
        self
    }

    /// Build the client
    pub fn build(self) -> Result<TaskLogClient> {
        let base_url = self
            .base_url
            .filter(|u| !u.trim().is_empty())
            .ok_or_else(|| TaskLinkError::ConfigurationError("base_url is required".into()))?;
        let base_url = base_url.trim_end_matches('/').to_string();

        // No client-wide timeout: streams stay open indefinitely and the
        // gateway sets a budget on every plain request.
        let client_builder = reqwest::Client::builder()
            .connect_timeout(self.timeouts.connection_timeout)
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Duration::from_secs(90));

        let http_client = self
            .http_version
            .apply(client_builder)
            .build()
            .map_err(|e| TaskLinkError::ConfigurationError(e.to_string()))?;

        let store = self
            .session_store
            .unwrap_or_else(|| Arc::new(MemorySessionStore::new()));
        if let Some(token) = self.token.filter(|t| !t.trim().is_empty()) {
            store.set_item(TOKEN_KEY, JsonValue::String(token))?;
        }

        let coordinator =
            SessionExpiryCoordinator::new(store, self.login_redirect, self.timeouts.expiry_quiet_window);
        let gateway = RequestGateway::new(
            base_url.clone(),
            http_client.clone(),
            coordinator,
            self.timeouts.request_timeout,
        );
        let polling = PollingFallbackClient::new(gateway.clone(), self.timeouts.clone());

        log::debug!("[tasklog-link] Client built for {}", base_url);

        Ok(TaskLogClient {
            base_url,
            http_client,
            gateway,
            polling,
            timeouts: self.timeouts,
            stream_options: self.stream_options,
        })
    }
}
