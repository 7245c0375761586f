//! Reconnection backoff.
//!
//! Delay for attempt `n` (zero-based) is `min(base × 2^n, cap)`. The attempt
//! counter resets on every successful open.

use std::time::Duration;

use crate::websocket::client::WebSocketConfig;

/// Backoff parameters derived from [`WebSocketConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub max_attempts: u32,
    /// Scale each delay to 75-100% of its nominal value
    pub jitter: bool,
}

impl ReconnectPolicy {
    pub fn from_config(config: &WebSocketConfig) -> Self {
        Self {
            base_delay_ms: config.base_delay_ms,
            max_delay_ms: config.max_delay_ms,
            max_attempts: config.reconnect_attempts,
            jitter: config.jitter,
        }
    }

    /// Nominal delay for a zero-based attempt, before jitter.
    pub fn nominal_delay_ms(&self, attempt: u32) -> u64 {
        let exp_delay = self.base_delay_ms.saturating_mul(1u64 << attempt.min(32));
        exp_delay.min(self.max_delay_ms)
    }

    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let capped_delay = self.nominal_delay_ms(attempt);
        if !self.jitter {
            return Duration::from_millis(capped_delay);
        }
        let jitter_range = capped_delay / 4;
        let jitter = rand::random::<u64>() % (jitter_range + 1);
        Duration::from_millis(capped_delay - jitter_range + jitter)
    }
}

/// Attempt counter driven by the connection task.
#[derive(Debug, Clone)]
pub struct Backoff {
    policy: ReconnectPolicy,
    attempts: u32,
}

impl Backoff {
    pub fn new(policy: ReconnectPolicy) -> Self {
        Self { policy, attempts: 0 }
    }

    /// Delay before the next attempt, or `None` once the budget is spent.
    /// Increments the attempt counter.
    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.attempts >= self.policy.max_attempts {
            return None;
        }
        let delay = self.policy.delay_for_attempt(self.attempts);
        self.attempts += 1;
        Some(delay)
    }

    pub fn reset(&mut self) {
        self.attempts = 0;
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn policy(&self) -> &ReconnectPolicy {
        &self.policy
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(max_attempts: u32) -> ReconnectPolicy {
        ReconnectPolicy {
            base_delay_ms: 1000,
            max_delay_ms: 30_000,
            max_attempts,
            jitter: false,
        }
    }

    #[test]
    fn test_delays_double_then_cap() {
        let mut backoff = Backoff::new(policy(10));
        let delays: Vec<u64> = std::iter::from_fn(|| backoff.next_delay())
            .map(|d| d.as_millis() as u64)
            .collect();
        assert_eq!(
            delays,
            vec![1000, 2000, 4000, 8000, 16_000, 30_000, 30_000, 30_000, 30_000, 30_000]
        );
    }

    #[test]
    fn test_reset_restarts_at_base() {
        let mut backoff = Backoff::new(policy(10));
        backoff.next_delay();
        backoff.next_delay();
        assert_eq!(backoff.attempts(), 2);

        backoff.reset();
        assert_eq!(backoff.next_delay(), Some(Duration::from_millis(1000)));
    }

    #[test]
    fn test_budget_exhausted() {
        let mut backoff = Backoff::new(policy(2));
        assert!(backoff.next_delay().is_some());
        assert!(backoff.next_delay().is_some());
        assert!(backoff.next_delay().is_none());
        assert_eq!(backoff.attempts(), 2);
    }

    #[test]
    fn test_jitter_bounds() {
        let policy = ReconnectPolicy {
            jitter: true,
            ..policy(10)
        };
        for attempt in 0..6 {
            let nominal = policy.nominal_delay_ms(attempt) as u128;
            let delay = policy.delay_for_attempt(attempt).as_millis();
            assert!(delay <= nominal && delay >= nominal * 3 / 4);
        }
    }

    #[test]
    fn test_huge_attempt_saturates() {
        assert_eq!(policy(10).nominal_delay_ms(63), 30_000);
    }

    #[test]
    fn test_from_config() {
        let policy = ReconnectPolicy::from_config(&WebSocketConfig::default());
        assert_eq!(policy.base_delay_ms, 1000);
        assert_eq!(policy.max_delay_ms, 30_000);
        assert_eq!(policy.max_attempts, 10);
        assert!(!policy.jitter);
    }
}
