//! Error types for tasklog-cli
//!
//! Provides user-friendly error messages for common CLI failures.

use std::fmt;
use tasklog_link::TaskLinkError;

/// Result type for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;

/// Errors that can occur in the CLI
#[derive(Debug)]
pub enum CliError {
    /// Error from tasklog-link library
    LinkError(TaskLinkError),

    /// Configuration file error
    ConfigurationError(String),

    /// File I/O error
    FileError(String),

    /// The session expired; the user has to log in again
    SessionExpired,

    /// User cancelled operation
    Cancelled,
}

impl CliError {
    fn format_link_error(err: &TaskLinkError) -> String {
        match err {
            TaskLinkError::NetworkError(msg) => {
                format!("Network error: {}", Self::clean_nested_message(msg))
            },
            TaskLinkError::ConfigurationError(msg) => format!("Configuration error: {}", msg),
            TaskLinkError::RedirectInProgress => {
                "Session expired; run `tasklog login --token <TOKEN>`".to_string()
            },
            other => other.user_message(),
        }
    }

    fn clean_nested_message(message: &str) -> String {
        let mut cleaned = message.trim();
        let prefixes = [
            "Connection failed:",
            "connection failed:",
            "Network error:",
            "network error:",
        ];

        loop {
            let mut stripped = false;
            for prefix in &prefixes {
                if let Some(rest) = cleaned.strip_prefix(prefix) {
                    cleaned = rest.trim_start();
                    stripped = true;
                    break;
                }
            }

            if !stripped {
                break;
            }
        }

        cleaned.to_string()
    }

    /// Process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::SessionExpired => 3,
            CliError::Cancelled => 130,
            CliError::LinkError(e) if e.is_timeout() => 4,
            _ => 1,
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::LinkError(e) => write!(f, "{}", Self::format_link_error(e)),
            CliError::ConfigurationError(msg) => write!(f, "Configuration error: {}", msg),
            CliError::FileError(msg) => write!(f, "File error: {}", msg),
            CliError::SessionExpired => {
                write!(f, "Session expired; run `tasklog login --token <TOKEN>`")
            },
            CliError::Cancelled => write!(f, "Operation cancelled"),
        }
    }
}

impl std::error::Error for CliError {}

impl From<TaskLinkError> for CliError {
    fn from(err: TaskLinkError) -> Self {
        match err {
            TaskLinkError::Cancelled => CliError::Cancelled,
            other => CliError::LinkError(other),
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        CliError::FileError(err.to_string())
    }
}

impl From<serde_json::Error> for CliError {
    fn from(err: serde_json::Error) -> Self {
        CliError::ConfigurationError(format!("JSON error: {}", err))
    }
}
