//! Configuration file handling for the terminal client.
//!
//! The file format is [`LinkConfig`]'s; this module adds `~` expansion, a
//! default location and the command-line overrides.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tasklog_link::{LinkConfig, LinkTimeouts, LoginRedirect, MemorySessionStore, TaskLogClient};

use crate::error::Result;

pub const DEFAULT_CONFIG_PATH: &str = "~/.config/tasklog/config.toml";

/// Session file used when the config does not name one.
pub const DEFAULT_SESSION_PATH: &str = "~/.config/tasklog/session.json";

pub const DEFAULT_SERVER_URL: &str = "http://localhost:8000";

/// Settings taken from the command line; they win over the file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub url: Option<String>,
    pub token: Option<String>,
    pub timeouts: Option<LinkTimeouts>,
    pub max_reconnect_attempts: Option<u32>,
}

pub fn expand_config_path(path: &Path) -> PathBuf {
    let path_str = path.to_str().unwrap_or(DEFAULT_CONFIG_PATH);
    if let Some(rest) = path_str.strip_prefix("~/") {
        if let Some(home_dir) = dirs::home_dir() {
            return home_dir.join(rest);
        }
    }
    path.to_path_buf()
}

/// Load the config file (defaults when missing) and resolve paths in it.
pub fn load_config(path: &Path) -> Result<LinkConfig> {
    let mut config = LinkConfig::load(&expand_config_path(path))?;
    let store_path = config
        .session
        .store_path
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_SESSION_PATH));
    config.session.store_path = Some(expand_config_path(&store_path));
    Ok(config)
}

/// Apply command-line overrides to a loaded config.
pub fn apply_overrides(config: &mut LinkConfig, overrides: &Overrides) {
    if let Some(url) = &overrides.url {
        config.server.url = Some(url.clone());
    }
    if config.server.url.is_none() {
        config.server.url = Some(DEFAULT_SERVER_URL.to_string());
    }
    if let Some(token) = &overrides.token {
        config.token = Some(token.clone());
    }
    if let Some(max) = overrides.max_reconnect_attempts {
        config.stream.max_reconnect_attempts = max;
    }
}

pub fn build_client(
    config: &LinkConfig,
    overrides: &Overrides,
    redirect: Arc<dyn LoginRedirect>,
) -> Result<TaskLogClient> {
    let mut builder = TaskLogClient::builder()
        .config(config)
        .login_redirect(redirect);
    if let Some(timeouts) = &overrides.timeouts {
        builder = builder.timeouts(timeouts.clone());
    }
    // a token from the flag or the environment is never written to the session file
    if let Some(token) = &config.token {
        builder = builder.session_store(Arc::new(MemorySessionStore::with_token(token.clone())));
    }
    Ok(builder.build()?)
}
