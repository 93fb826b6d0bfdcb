//! Timeout configuration for tasklog-link operations.
//!
//! Centralizes every time budget the client uses: plain gateway requests,
//! the escalating budgets of the polling path, the direct-log path, the
//! stream connect watchdog and the session-expiry quiet window.

use std::time::Duration;

/// Timeout configuration for tasklog-link operations.
///
/// # Examples
///
/// ```rust
/// use tasklog_link::LinkTimeouts;
/// use std::time::Duration;
///
/// // Defaults match the backend's observed processing times
/// let timeouts = LinkTimeouts::default();
/// assert_eq!(timeouts.first_attempt_timeout, Duration::from_secs(30));
///
/// // Custom budgets
/// let timeouts = LinkTimeouts::builder()
///     .first_attempt_timeout_secs(10)
///     .retry_timeout_secs(60)
///     .build();
/// ```
#[derive(Debug, Clone)]
pub struct LinkTimeouts {
    /// Timeout for ordinary gateway requests.
    /// Default: 15 seconds
    pub request_timeout: Duration,

    /// Timeout for establishing TCP/TLS connections.
    /// Default: 10 seconds
    pub connection_timeout: Duration,

    /// First polling attempt budget (short).
    /// Default: 30 seconds
    pub first_attempt_timeout: Duration,

    /// Polling retry budget (long). Used only after the first attempt timed out.
    /// Default: 180 seconds
    pub retry_timeout: Duration,

    /// Budget for the direct log path. Never retried.
    /// Default: 10 seconds
    pub direct_timeout: Duration,

    /// Watchdog for a stream connect attempt to reach the open state.
    /// Default: 10 seconds
    pub stream_connect_timeout: Duration,

    /// Quiet window after a session-expiry redirect during which further
    /// expiry reports are ignored and new requests are refused.
    /// Default: 1 second
    pub expiry_quiet_window: Duration,
}

impl Default for LinkTimeouts {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(15),
            connection_timeout: Duration::from_secs(10),
            first_attempt_timeout: Duration::from_secs(30),
            retry_timeout: Duration::from_secs(180),
            direct_timeout: Duration::from_secs(10),
            stream_connect_timeout: Duration::from_secs(10),
            expiry_quiet_window: Duration::from_secs(1),
        }
    }
}

impl LinkTimeouts {
    /// Create a new builder for custom timeout configuration.
    pub fn builder() -> LinkTimeoutsBuilder {
        LinkTimeoutsBuilder::new()
    }

    /// Short budgets for local development against a backend on localhost.
    pub fn fast() -> Self {
        Self {
            request_timeout: Duration::from_secs(5),
            connection_timeout: Duration::from_secs(2),
            first_attempt_timeout: Duration::from_secs(5),
            retry_timeout: Duration::from_secs(30),
            direct_timeout: Duration::from_secs(3),
            stream_connect_timeout: Duration::from_secs(3),
            expiry_quiet_window: Duration::from_secs(1),
        }
    }

    /// Long budgets for high-latency links or very large playbook logs.
    pub fn relaxed() -> Self {
        Self {
            request_timeout: Duration::from_secs(60),
            connection_timeout: Duration::from_secs(30),
            first_attempt_timeout: Duration::from_secs(60),
            retry_timeout: Duration::from_secs(600),
            direct_timeout: Duration::from_secs(30),
            stream_connect_timeout: Duration::from_secs(30),
            expiry_quiet_window: Duration::from_secs(2),
        }
    }

    /// Check if a duration represents "no timeout" (zero or very large).
    pub fn is_no_timeout(duration: Duration) -> bool {
        duration.is_zero() || duration > Duration::from_secs(86400 * 365)
    }
}

/// Builder for [`LinkTimeouts`].
#[derive(Debug, Clone)]
pub struct LinkTimeoutsBuilder {
    timeouts: LinkTimeouts,
}

impl LinkTimeoutsBuilder {
    fn new() -> Self {
        Self {
            timeouts: LinkTimeouts::default(),
        }
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.timeouts.request_timeout = timeout;
        self
    }

    pub fn request_timeout_secs(self, secs: u64) -> Self {
        self.request_timeout(Duration::from_secs(secs))
    }

    pub fn connection_timeout(mut self, timeout: Duration) -> Self {
        self.timeouts.connection_timeout = timeout;
        self
    }

    pub fn first_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.timeouts.first_attempt_timeout = timeout;
        self
    }

    pub fn first_attempt_timeout_secs(self, secs: u64) -> Self {
        self.first_attempt_timeout(Duration::from_secs(secs))
    }

    pub fn retry_timeout(mut self, timeout: Duration) -> Self {
        self.timeouts.retry_timeout = timeout;
        self
    }

    pub fn retry_timeout_secs(self, secs: u64) -> Self {
        self.retry_timeout(Duration::from_secs(secs))
    }

    pub fn direct_timeout(mut self, timeout: Duration) -> Self {
        self.timeouts.direct_timeout = timeout;
        self
    }

    pub fn stream_connect_timeout(mut self, timeout: Duration) -> Self {
        self.timeouts.stream_connect_timeout = timeout;
        self
    }

    pub fn expiry_quiet_window(mut self, window: Duration) -> Self {
        self.timeouts.expiry_quiet_window = window;
        self
    }

    /// Build the timeout configuration.
    pub fn build(self) -> LinkTimeouts {
        self.timeouts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_timeouts() {
        let timeouts = LinkTimeouts::default();
        assert_eq!(timeouts.first_attempt_timeout, Duration::from_secs(30));
        assert_eq!(timeouts.retry_timeout, Duration::from_secs(180));
        assert_eq!(timeouts.stream_connect_timeout, Duration::from_secs(10));
        assert_eq!(timeouts.expiry_quiet_window, Duration::from_secs(1));
    }

    #[test]
    fn test_builder() {
        let timeouts = LinkTimeouts::builder()
            .first_attempt_timeout_secs(5)
            .retry_timeout_secs(20)
            .direct_timeout(Duration::from_millis(500))
            .build();

        assert_eq!(timeouts.first_attempt_timeout, Duration::from_secs(5));
        assert_eq!(timeouts.retry_timeout, Duration::from_secs(20));
        assert_eq!(timeouts.direct_timeout, Duration::from_millis(500));
    }

    #[test]
    fn test_retry_budget_is_longer_in_every_preset() {
        for t in [LinkTimeouts::default(), LinkTimeouts::fast(), LinkTimeouts::relaxed()] {
            assert!(t.retry_timeout > t.first_attempt_timeout);
        }
    }

    #[test]
    fn test_is_no_timeout() {
        assert!(LinkTimeouts::is_no_timeout(Duration::ZERO));
        assert!(!LinkTimeouts::is_no_timeout(Duration::from_secs(1)));
    }
}
