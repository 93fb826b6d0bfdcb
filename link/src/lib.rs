//! # tasklog-link
//!
//! Client library for following the logs of remote automation runs.
//!
//! A run is identified by a task id and a work id. Its log can be followed
//! live over an event stream ([`StreamSession`]) or fetched as a snapshot
//! ([`PollingFallbackClient`]) when streaming is unavailable. Every plain
//! HTTP call goes through one [`RequestGateway`], and every session-expiry
//! signal, from any concurrent request or stream, collapses into a single
//! redirect to login through the [`SessionExpiryCoordinator`].
//!
//! ## Example
//!
//! ```rust,no_run
//! use tasklog_link::TaskLogClient;
//!
//! # async fn example() -> tasklog_link::Result<()> {
//! let client = TaskLogClient::builder()
//!     .base_url("http://localhost:8000")
//!     .token("eyJhbGc...")
//!     .build()?;
//!
//! let session = client.new_stream_session();
//! session.on_log(|event| println!("{}", event.content()));
//! session.on_complete(|_| println!("-- finished --"));
//!
//! let url = client.stream_url(42, 7)?;
//! if session.connect(url, client.stream_options().clone()).await.is_err() {
//!     let fetched = client.fetch_log(42, 7).await?;
//!     println!("{}", fetched.snapshot.content);
//! }
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod event_handlers;
pub mod gateway;
pub mod models;
pub mod polling;
pub mod reconnect;
pub mod session_expiry;
pub mod storage;
pub mod stream;
pub mod timeouts;
pub mod transport;

pub use auth::AuthProvider;
pub use client::{TaskLogClient, TaskLogClientBuilder};
pub use config::LinkConfig;
pub use error::{Result, TaskLinkError};
pub use event_handlers::{
    ConnectionError, DisconnectReason, EventDispatcher, ListenerId, StreamEvent, StreamEventKind,
};
pub use gateway::RequestGateway;
pub use models::{
    FetchedLog, GatewayResponse, HttpVersion, LogEvent, LogEventKind, LogPayload, LogSnapshot,
    RequestSpec, StreamOptions,
};
pub use polling::{PollingFallbackClient, RetryBudget};
pub use reconnect::ReconnectPolicy;
pub use session_expiry::{LoggingRedirect, LoginRedirect, NoopRedirect, SessionExpiryCoordinator};
pub use storage::{FileSessionStore, MemorySessionStore, SessionStore};
pub use stream::{ConnectionState, StreamController, StreamSession, StreamState};
pub use timeouts::LinkTimeouts;
pub use transport::{EventSourceTransport, SseMessage, StreamTransport, TransportEvent};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
