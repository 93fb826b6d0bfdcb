//! Error types for tasklog-link.
//!
//! Every failure surfaced to callers is classified into one of the variants
//! below so the UI layer can build an accurate message (which timeout budget
//! ran out, how many attempts were made, whether the backend rejected the
//! request or the network is simply gone).

use std::time::Duration;
use thiserror::Error;

/// Result type for tasklog-link operations.
pub type Result<T> = std::result::Result<T, TaskLinkError>;

/// Errors that can occur while talking to the task log backend.
#[derive(Error, Debug, Clone)]
pub enum TaskLinkError {
    /// No response at all: DNS, refused connection, network down.
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Explicit or implicit session-expiry signal.
    #[error("Authentication error: {0}")]
    AuthenticationError(String),

    /// An attempt exceeded its time budget.
    #[error("{operation} timed out after {budget:?} (attempt {attempts})")]
    TimeoutError {
        operation: String,
        budget: Duration,
        attempts: u32,
    },

    /// Payload could not be parsed into the expected shape.
    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    /// Well-formed error response from the backend.
    #[error("Server error ({status_code}): {message}")]
    ServerError { status_code: u16, message: String },

    /// The requested task/work log does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// A stream could not reach the open state.
    #[error("Connect error: {0}")]
    ConnectError(String),

    /// Rejected locally because a login redirect is underway.
    #[error("Request refused: redirect to login in progress")]
    RedirectInProgress,

    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Operation cancelled")]
    Cancelled,
}

impl TaskLinkError {
    pub(crate) fn timeout(operation: impl Into<String>, budget: Duration, attempts: u32) -> Self {
        Self::TimeoutError {
            operation: operation.into(),
            budget,
            attempts,
        }
    }

    /// `true` for [`TaskLinkError::TimeoutError`].
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::TimeoutError { .. })
    }

    /// `true` when the failure came from a session-expiry signal.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::AuthenticationError(_))
    }

    /// `true` for failures where no response was received from the backend.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::NetworkError(_) | Self::TimeoutError { .. })
    }

    /// Message suitable for showing to an operator.
    ///
    /// Timeouts read as "still running" rather than as a failure, because on
    /// the log endpoints a timeout almost always means the backend is still
    /// producing a large result.
    pub fn user_message(&self) -> String {
        match self {
            Self::TimeoutError { budget, attempts, .. } => format!(
                "Task is still running: the backend did not answer within {}s (after {} attempt{}). Try again shortly.",
                budget.as_secs(),
                attempts,
                if *attempts == 1 { "" } else { "s" }
            ),
            Self::NetworkError(_) => {
                "Network connection failed, check your network settings".to_string()
            },
            Self::AuthenticationError(msg) => msg.clone(),
            Self::ServerError { status_code, message } => {
                if message.is_empty() {
                    format!("Request failed ({})", status_code)
                } else {
                    message.clone()
                }
            },
            Self::NotFound(what) => format!("Log not found: {}", what),
            Self::ConnectError(msg) => format!("Live log unavailable: {}", msg),
            other => other.to_string(),
        }
    }
}

impl From<reqwest::Error> for TaskLinkError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            // reqwest does not report which budget fired; callers that know
            // it construct the variant themselves.
            Self::timeout("request", Duration::ZERO, 1)
        } else if err.is_connect() {
            Self::NetworkError(format!("Connection failed: {}", err))
        } else if err.is_decode() {
            Self::MalformedPayload(err.to_string())
        } else if let Some(status) = err.status() {
            Self::ServerError {
                status_code: status.as_u16(),
                message: err.to_string(),
            }
        } else {
            Self::NetworkError(err.to_string())
        }
    }
}

impl From<serde_json::Error> for TaskLinkError {
    fn from(err: serde_json::Error) -> Self {
        Self::SerializationError(err.to_string())
    }
}

impl From<std::io::Error> for TaskLinkError {
    fn from(err: std::io::Error) -> Self {
        Self::StorageError(err.to_string())
    }
}

impl From<toml::de::Error> for TaskLinkError {
    fn from(err: toml::de::Error) -> Self {
        Self::ConfigurationError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_user_message_says_still_running() {
        let err = TaskLinkError::timeout("fetch_log", Duration::from_secs(180), 2);
        let msg = err.user_message();
        assert!(msg.contains("still running"));
        assert!(msg.contains("180s"));
        assert!(msg.contains("2 attempts"));
    }

    #[test]
    fn test_server_error_message_passthrough() {
        let err = TaskLinkError::ServerError {
            status_code: 500,
            message: "disk full".to_string(),
        };
        assert_eq!(err.user_message(), "disk full");

        let empty = TaskLinkError::ServerError {
            status_code: 502,
            message: String::new(),
        };
        assert_eq!(empty.user_message(), "Request failed (502)");
    }

    #[test]
    fn test_classification_helpers() {
        assert!(TaskLinkError::timeout("x", Duration::from_secs(1), 1).is_timeout());
        assert!(TaskLinkError::NetworkError("down".into()).is_transport());
        assert!(TaskLinkError::AuthenticationError("expired".into()).is_unauthorized());
        assert!(!TaskLinkError::NotFound("1/2".into()).is_transport());
    }
}
