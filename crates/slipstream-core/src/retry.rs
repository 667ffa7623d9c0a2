//! Retry pacing for attach loops
//!
//! A missing target process is the normal state before the game launches,
//! so attach failure is recoverable by retrying on a strategy-controlled
//! schedule rather than a hot loop.

use std::time::Duration;

pub trait RetryStrategy {
    /// Delay before attempt number `attempt` (1-based), or `None` to give
    /// up.
    fn next_delay(&mut self, attempt: u32) -> Option<Duration>;
}

/// Retry forever with a constant delay.
pub struct FixedDelay {
    delay: Duration,
}

impl FixedDelay {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

impl RetryStrategy for FixedDelay {
    fn next_delay(&mut self, _attempt: u32) -> Option<Duration> {
        Some(self.delay)
    }
}

/// Doubling delay from `base` up to `max`, retrying forever.
pub struct ExponentialBackoff {
    base: Duration,
    max: Duration,
}

impl ExponentialBackoff {
    pub fn new(base: Duration, max: Duration) -> Self {
        Self { base, max }
    }
}

impl RetryStrategy for ExponentialBackoff {
    fn next_delay(&mut self, attempt: u32) -> Option<Duration> {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1).min(16));
        Some((self.base * factor).min(self.max))
    }
}

/// Fail after the first attempt.
pub struct NoRetry;

impl RetryStrategy for NoRetry {
    fn next_delay(&mut self, _attempt: u32) -> Option<Duration> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_delay() {
        let mut strategy = FixedDelay::new(Duration::from_secs(2));
        assert_eq!(strategy.next_delay(1), Some(Duration::from_secs(2)));
        assert_eq!(strategy.next_delay(50), Some(Duration::from_secs(2)));
    }

    #[test]
    fn test_exponential_backoff_caps_at_max() {
        let mut strategy =
            ExponentialBackoff::new(Duration::from_secs(1), Duration::from_secs(30));
        assert_eq!(strategy.next_delay(1), Some(Duration::from_secs(1)));
        assert_eq!(strategy.next_delay(2), Some(Duration::from_secs(2)));
        assert_eq!(strategy.next_delay(3), Some(Duration::from_secs(4)));
        assert_eq!(strategy.next_delay(6), Some(Duration::from_secs(30)));
        // Large attempt numbers must not overflow.
        assert_eq!(strategy.next_delay(1000), Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_no_retry() {
        let mut strategy = NoRetry;
        assert_eq!(strategy.next_delay(1), None);
    }
}
