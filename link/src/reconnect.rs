//! Exponential reconnect backoff.

use std::time::Duration;

/// Reconnect schedule for a stream session.
///
/// The k-th delay (1-based) is `base_delay * multiplier^(k-1)`, capped at
/// `max_delay`. Once `max_attempts` delays have been handed out the policy is
/// exhausted and [`next_delay`](Self::next_delay) yields `None` until
/// [`reset`](Self::reset) is called on a successful open.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconnectPolicy {
    base_delay: Duration,
    multiplier: f64,
    max_attempts: u32,
    max_delay: Option<Duration>,
    attempt: u32,
}

impl ReconnectPolicy {
    pub fn new(base_delay: Duration, max_attempts: u32) -> Self {
        Self {
            base_delay,
            multiplier: 2.0,
            max_attempts,
            max_delay: None,
            attempt: 0,
        }
    }

    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = if multiplier.is_finite() && multiplier >= 1.0 {
            multiplier
        } else {
            1.0
        };
        self
    }

    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = if max_delay.is_zero() { None } else { Some(max_delay) };
        self
    }

    /// Consume one attempt and return how long to wait before it.
    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.attempt >= self.max_attempts {
            return None;
        }
        self.attempt += 1;
        Some(self.delay_for(self.attempt))
    }

    /// Delay before the k-th attempt, without consuming anything.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let factor = self.multiplier.powi(exp);
        let millis = (self.base_delay.as_millis() as f64 * factor).min(u64::MAX as f64);
        let delay = Duration::from_millis(millis as u64);
        match self.max_delay {
            Some(cap) => delay.min(cap),
            None => delay,
        }
    }

    pub fn reset(&mut self) {
        self.attempt = 0;
    }

    /// Attempts consumed since the last reset.
    pub fn attempts(&self) -> u32 {
        self.attempt
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn is_exhausted(&self) -> bool {
        self.attempt >= self.max_attempts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delays_double_from_base() {
        let mut policy = ReconnectPolicy::new(Duration::from_millis(1000), 5);
        let delays: Vec<_> = std::iter::from_fn(|| policy.next_delay()).collect();
        assert_eq!(
            delays,
            vec![
                Duration::from_secs(1),
                Duration::from_secs(2),
                Duration::from_secs(4),
                Duration::from_secs(8),
                Duration::from_secs(16),
            ]
        );
        assert!(policy.is_exhausted());
        assert_eq!(policy.next_delay(), None);
    }

    #[test]
    fn test_reset_restarts_schedule() {
        let mut policy = ReconnectPolicy::new(Duration::from_millis(500), 3);
        policy.next_delay();
        policy.next_delay();
        assert_eq!(policy.attempts(), 2);

        policy.reset();
        assert_eq!(policy.attempts(), 0);
        assert_eq!(policy.next_delay(), Some(Duration::from_millis(500)));
    }

    #[test]
    fn test_max_delay_caps() {
        let mut policy = ReconnectPolicy::new(Duration::from_secs(10), 4)
            .with_max_delay(Duration::from_secs(25));
        assert_eq!(policy.next_delay(), Some(Duration::from_secs(10)));
        assert_eq!(policy.next_delay(), Some(Duration::from_secs(20)));
        assert_eq!(policy.next_delay(), Some(Duration::from_secs(25)));
    }

    #[test]
    fn test_zero_budget() {
        let mut policy = ReconnectPolicy::new(Duration::from_secs(1), 0);
        assert_eq!(policy.next_delay(), None);
    }
}
