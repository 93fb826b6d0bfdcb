//! File-based client configuration.
//!
//! # Configuration Format
//!
//! ```toml
//! [server]
//! url = "http://ops.example.com:8000"
//! http_version = "http1"            # "http1", "http2", "auto"
//!
//! [stream]
//! auto_reconnect = true
//! reconnect_delay_ms = 1000
//! max_reconnect_attempts = 5
//! connect_timeout_ms = 10000
//!
//! [polling]
//! request_timeout_secs = 15
//! first_attempt_timeout_secs = 30
//! retry_timeout_secs = 180
//! direct_timeout_secs = 10
//!
//! [session]
//! quiet_window_ms = 1000
//! store_path = "~/.config/tasklog/session.json"
//! namespace = "tasklog"
//! ```
//!
//! Every key is optional. `TASKLOG_SERVER_URL` and `TASKLOG_TOKEN` override
//! the file when set.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TaskLinkError};
use crate::models::{HttpVersion, StreamOptions};
use crate::storage::DEFAULT_NAMESPACE;
use crate::timeouts::LinkTimeouts;

/// Environment variable overriding `[server] url`.
pub const ENV_SERVER_URL: &str = "TASKLOG_SERVER_URL";

/// Environment variable supplying a bearer token.
pub const ENV_TOKEN: &str = "TASKLOG_TOKEN";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LinkConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub stream: StreamOptions,

    #[serde(default)]
    pub polling: PollingConfig,

    #[serde(default)]
    pub session: SessionConfig,

    /// Token from the environment; never read from or written to the file.
    #[serde(skip)]
    pub token: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Backend root URL, without the `/api/v1` prefix.
    #[serde(default)]
    pub url: Option<String>,

    #[serde(default)]
    pub http_version: HttpVersion,

    /// TCP/TLS connect timeout in seconds.
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollingConfig {
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    #[serde(default = "default_first_attempt_timeout_secs")]
    pub first_attempt_timeout_secs: u64,

    #[serde(default = "default_retry_timeout_secs")]
    pub retry_timeout_secs: u64,

    #[serde(default = "default_direct_timeout_secs")]
    pub direct_timeout_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Quiet window after a login redirect, in milliseconds.
    #[serde(default = "default_quiet_window_ms")]
    pub quiet_window_ms: u64,

    /// Session file; an in-memory store is used when unset.
    #[serde(default)]
    pub store_path: Option<PathBuf>,

    #[serde(default = "default_namespace")]
    pub namespace: String,
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_request_timeout_secs() -> u64 {
    15
}

fn default_first_attempt_timeout_secs() -> u64 {
    30
}

fn default_retry_timeout_secs() -> u64 {
    180
}

fn default_direct_timeout_secs() -> u64 {
    10
}

fn default_quiet_window_ms() -> u64 {
    1000
}

fn default_namespace() -> String {
    DEFAULT_NAMESPACE.to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            url: None,
            http_version: HttpVersion::default(),
            connect_timeout_secs: default_connect_timeout_secs(),
        }
    }
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: default_request_timeout_secs(),
            first_attempt_timeout_secs: default_first_attempt_timeout_secs(),
            retry_timeout_secs: default_retry_timeout_secs(),
            direct_timeout_secs: default_direct_timeout_secs(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            quiet_window_ms: default_quiet_window_ms(),
            store_path: None,
            namespace: default_namespace(),
        }
    }
}

impl LinkConfig {
    /// Load configuration from `path`, then apply environment overrides.
    ///
    /// A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(path).map_err(|e| {
                TaskLinkError::ConfigurationError(format!(
                    "Failed to read config file '{}': {}",
                    path.display(),
                    e
                ))
            })?;
            Self::from_toml_str(&contents)?
        } else {
            log::debug!("[tasklog-link] No config at {}; using defaults", path.display());
            Self::default()
        };
        config.apply_env();
        Ok(config)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = toml::to_string_pretty(self)
            .map_err(|e| TaskLinkError::ConfigurationError(format!("Failed to serialize: {}", e)))?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Apply `TASKLOG_SERVER_URL` / `TASKLOG_TOKEN` when set and non-empty.
    pub fn apply_env(&mut self) {
        self.apply_overrides(
            std::env::var(ENV_SERVER_URL).ok(),
            std::env::var(ENV_TOKEN).ok(),
        );
    }

    fn apply_overrides(&mut self, url: Option<String>, token: Option<String>) {
        if let Some(url) = url.filter(|u| !u.trim().is_empty()) {
            self.server.url = Some(url);
        }
        if let Some(token) = token.filter(|t| !t.trim().is_empty()) {
            self.token = Some(token);
        }
    }

    pub fn timeouts(&self) -> LinkTimeouts {
        LinkTimeouts::builder()
            .connection_timeout(Duration::from_secs(self.server.connect_timeout_secs))
            .request_timeout_secs(self.polling.request_timeout_secs)
            .first_attempt_timeout_secs(self.polling.first_attempt_timeout_secs)
            .retry_timeout_secs(self.polling.retry_timeout_secs)
            .direct_timeout(Duration::from_secs(self.polling.direct_timeout_secs))
            .stream_connect_timeout(self.stream.connect_timeout())
            .expiry_quiet_window(Duration::from_millis(self.session.quiet_window_ms))
            .build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let mut config = LinkConfig::load(&dir.path().join("absent.toml")).unwrap();
        config.server.url = None;
        config.token = None;
        assert_eq!(config, LinkConfig::default());
        assert_eq!(config.stream.max_reconnect_attempts, 5);
        assert_eq!(config.session.namespace, "tasklog");
    }

    #[test]
    fn test_partial_file() {
        let config = LinkConfig::from_toml_str(
            r#"
            [server]
            url = "http://ops.local:8000"
            http_version = "auto"

            [polling]
            retry_timeout_secs = 300

            [stream]
            max_reconnect_attempts = 3
            "#,
        )
        .unwrap();

        assert_eq!(config.server.url.as_deref(), Some("http://ops.local:8000"));
        assert_eq!(config.server.http_version, HttpVersion::Auto);
        assert_eq!(config.polling.first_attempt_timeout_secs, 30);
        assert_eq!(config.stream.max_reconnect_attempts, 3);

        let timeouts = config.timeouts();
        assert_eq!(timeouts.retry_timeout, Duration::from_secs(300));
        assert_eq!(timeouts.first_attempt_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_invalid_toml() {
        let err = LinkConfig::from_toml_str("[server\nurl=").unwrap_err();
        assert!(matches!(err, TaskLinkError::ConfigurationError(_)));
    }

    #[test]
    fn test_overrides_ignore_blank_values() {
        let mut config = LinkConfig::default();
        config.server.url = Some("http://from-file".into());

        config.apply_overrides(Some("  ".into()), Some(String::new()));
        assert_eq!(config.server.url.as_deref(), Some("http://from-file"));
        assert_eq!(config.token, None);

        config.apply_overrides(Some("http://from-env".into()), Some("tok".into()));
        assert_eq!(config.server.url.as_deref(), Some("http://from-env"));
        assert_eq!(config.token.as_deref(), Some("tok"));
    }

    #[test]
    fn test_save_and_reload() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cfg").join("tasklog.toml");

        let mut config = LinkConfig::default();
        config.polling.direct_timeout_secs = 4;
        config.save(&path).unwrap();

        let reloaded = LinkConfig::from_toml_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(reloaded.polling.direct_timeout_secs, 4);
    }
}
