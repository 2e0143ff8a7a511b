//! Reconnect backoff policy.

use std::time::Duration;

const DEFAULT_BASE: Duration = Duration::from_millis(1000);
const DEFAULT_CAP: Duration = Duration::from_millis(30_000);
const DEFAULT_MAX_ATTEMPTS: u32 = 10;

/// Exponential backoff with a cap and an attempt budget.
///
/// Delays double from `base` up to `cap`; after `max_attempts`
/// consecutive failures the policy is exhausted. A successful connect
/// resets the counter.
#[derive(Debug, Clone)]
pub struct Backoff {
    base: Duration,
    cap: Duration,
    max_attempts: u32,
    attempt: u32,
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(DEFAULT_BASE, DEFAULT_CAP, DEFAULT_MAX_ATTEMPTS)
    }
}

impl Backoff {
    pub fn new(base: Duration, cap: Duration, max_attempts: u32) -> Self {
        Self {
            base,
            cap,
            max_attempts,
            attempt: 0,
        }
    }

    /// Delay for a given zero-based attempt number: `min(base * 2^n, cap)`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
        self.base.saturating_mul(factor).min(self.cap)
    }

    /// Next delay to wait before reconnecting, or `None` once exhausted.
    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.attempt >= self.max_attempts {
            return None;
        }
        let delay = self.delay_for_attempt(self.attempt);
        self.attempt += 1;
        Some(delay)
    }

    /// Consecutive failures so far.
    pub fn attempts(&self) -> u32 {
        self.attempt
    }

    /// Reset after a successful connect.
    pub fn reset(&mut self) {
        self.attempt = 0;
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delays_double_from_base() {
        let mut backoff = Backoff::default();
        let delays: Vec<u64> = (0..5)
            .map(|_| backoff.next_delay().unwrap().as_millis() as u64)
            .collect();
        assert_eq!(delays, vec![1000, 2000, 4000, 8000, 16000]);
    }

    #[test]
    fn test_delay_caps_at_thirty_seconds() {
        let backoff = Backoff::default();
        assert_eq!(backoff.delay_for_attempt(5), Duration::from_millis(30_000));
        assert_eq!(backoff.delay_for_attempt(9), Duration::from_millis(30_000));
        // Large exponents must not overflow.
        assert_eq!(backoff.delay_for_attempt(40), Duration::from_millis(30_000));
    }

    #[test]
    fn test_exhausted_after_max_attempts() {
        let mut backoff = Backoff::default();
        for _ in 0..10 {
            assert!(backoff.next_delay().is_some());
        }
        assert!(backoff.next_delay().is_none());
        assert_eq!(backoff.attempts(), 10);
    }

    #[test]
    fn test_reset_restarts_the_sequence() {
        let mut backoff = Backoff::default();
        backoff.next_delay();
        backoff.next_delay();
        backoff.reset();
        assert_eq!(backoff.next_delay(), Some(Duration::from_millis(1000)));
    }
}
