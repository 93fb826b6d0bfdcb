use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::reconnect::ReconnectPolicy;

/// Options for a live log stream.
///
/// These options control:
/// - Automatic reconnection after a transport failure
/// - Backoff timing and the reconnect budget
/// - The watchdog that bounds how long a connect attempt may take
///
/// # Example
///
/// ```rust
/// use tasklog_link::StreamOptions;
///
/// let options = StreamOptions::default()
///     .with_auto_reconnect(true)
///     .with_reconnect_delay_ms(2000)
///     .with_max_reconnect_attempts(3);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamOptions {
    /// Reconnect automatically after the transport fails.
    /// Default: true
    #[serde(default = "default_auto_reconnect")]
    pub auto_reconnect: bool,

    /// Delay before the first reconnect, in milliseconds.
    /// Default: 1000ms. Doubles for each further attempt.
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,

    /// Growth factor applied to the delay for each further attempt.
    /// Default: 2.0
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Ceiling for a single reconnect delay, in milliseconds.
    /// Default: 30000ms
    #[serde(default = "default_max_reconnect_delay_ms")]
    pub max_reconnect_delay_ms: u64,

    /// Reconnect attempts allowed before the session gives up.
    /// Default: 5. Zero disables reconnection.
    #[serde(default = "default_max_reconnect_attempts")]
    pub max_reconnect_attempts: u32,

    /// How long a connect attempt may take to reach the open state.
    /// Default: 10000ms
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
}

fn default_auto_reconnect() -> bool {
    true
}

fn default_reconnect_delay_ms() -> u64 {
    1000
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_max_reconnect_delay_ms() -> u64 {
    30000
}

fn default_max_reconnect_attempts() -> u32 {
    5
}

fn default_connect_timeout_ms() -> u64 {
    10000
}

impl Default for StreamOptions {
    fn default() -> Self {
        Self {
            auto_reconnect: default_auto_reconnect(),
            reconnect_delay_ms: default_reconnect_delay_ms(),
            backoff_multiplier: default_backoff_multiplier(),
            max_reconnect_delay_ms: default_max_reconnect_delay_ms(),
            max_reconnect_attempts: default_max_reconnect_attempts(),
            connect_timeout_ms: default_connect_timeout_ms(),
        }
    }
}

impl StreamOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set whether to reconnect automatically after a transport failure
    pub fn with_auto_reconnect(mut self, enabled: bool) -> Self {
        self.auto_reconnect = enabled;
        self
    }

    /// Set the delay before the first reconnect (in milliseconds)
    pub fn with_reconnect_delay_ms(mut self, delay_ms: u64) -> Self {
        self.reconnect_delay_ms = delay_ms;
        self
    }

    pub fn with_backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    /// Set the ceiling for a single reconnect delay (in milliseconds)
    pub fn with_max_reconnect_delay_ms(mut self, max_delay_ms: u64) -> Self {
        self.max_reconnect_delay_ms = max_delay_ms;
        self
    }

    /// Set the reconnect budget. Zero disables reconnection.
    pub fn with_max_reconnect_attempts(mut self, max_attempts: u32) -> Self {
        self.max_reconnect_attempts = max_attempts;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Fresh reconnect policy for a session using these options.
    pub fn reconnect_policy(&self) -> ReconnectPolicy {
        let max_attempts = if self.auto_reconnect {
            self.max_reconnect_attempts
        } else {
            0
        };
        ReconnectPolicy::new(Duration::from_millis(self.reconnect_delay_ms), max_attempts)
            .with_multiplier(self.backoff_multiplier)
            .with_max_delay(Duration::from_millis(self.max_reconnect_delay_ms))
    }
}
