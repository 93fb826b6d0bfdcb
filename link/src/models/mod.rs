//! Data models for tasklog-link.
//!
//! Wire shapes of the log endpoints plus the option types that configure a
//! stream.

pub mod http_version;
pub mod log_event;
pub mod log_snapshot;
pub mod request;
pub mod stream_options;

pub use http_version::HttpVersion;
pub use log_event::{LogEvent, LogEventKind, LogPayload};
pub use log_snapshot::{FetchedLog, LogSnapshot};
pub use request::{ApiEnvelope, GatewayResponse, RequestSpec};
pub use stream_options::StreamOptions;
