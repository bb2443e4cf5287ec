//! Exponential backoff policy for rate-limited RPC calls.

use rand::Rng;
use std::time::Duration;

/// Retry policy with exponential backoff.
///
/// ## Default Values
/// - Initial delay: 5 seconds
/// - Maximum delay: 30 seconds
/// - Maximum retry attempts: 5
/// - Jitter: disabled
///
/// ## Example
///
/// ```rust
/// use insider_fetcher::RetryPolicy;
/// use std::time::Duration;
///
/// let policy = RetryPolicy::default();
/// assert_eq!(policy.delay_for_attempt(1), Duration::from_secs(5));
/// assert_eq!(policy.delay_for_attempt(2), Duration::from_secs(10));
/// assert_eq!(policy.delay_for_attempt(4), Duration::from_secs(30));
/// ```
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    initial_backoff: Duration,
    max_backoff: Duration,
    max_retries: u32,
    jitter_enabled: bool,
}

impl RetryPolicy {
    /// Create a new retry policy.
    pub fn new(initial_backoff: Duration, max_backoff: Duration, max_retries: u32) -> Self {
        Self {
            initial_backoff,
            max_backoff,
            max_retries,
            jitter_enabled: false,
        }
    }

    /// Add 0-25% random jitter on top of each delay.
    pub fn with_jitter(mut self) -> Self {
        self.jitter_enabled = true;
        self
    }

    pub fn initial_backoff(&self) -> Duration {
        self.initial_backoff
    }

    pub fn max_backoff(&self) -> Duration {
        self.max_backoff
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Delay before retry `attempt` (1-based): `initial * 2^(attempt-1)`,
    /// capped at `max_backoff`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        // 2^16 is far beyond any useful cap
        let power = attempt.saturating_sub(1).min(16);
        let exponential = self.initial_backoff.saturating_mul(1u32 << power);
        let capped = exponential.min(self.max_backoff);

        if self.jitter_enabled {
            let factor = rand::thread_rng().gen::<f64>() * 0.25;
            capped + capped.mul_f64(factor)
        } else {
            capped
        }
    }

    /// Check if retry `attempt` (1-based) is allowed.
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt <= self.max_retries
    }

    /// Upper bound on time spent sleeping for one call (jitter excluded).
    pub fn worst_case_delay(&self) -> Duration {
        (1..=self.max_retries)
            .map(|attempt| {
                let power = attempt.saturating_sub(1).min(16);
                self.initial_backoff
                    .saturating_mul(1u32 << power)
                    .min(self.max_backoff)
            })
            .sum()
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(Duration::from_secs(5), Duration::from_secs(30), 5)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exponential_backoff_doubles_and_caps() {
        let policy = RetryPolicy::default();
        let delays: Vec<u64> = (1..=6)
            .map(|a| policy.delay_for_attempt(a).as_secs())
            .collect();
        assert_eq!(delays, vec![5, 10, 20, 30, 30, 30]);
    }

    #[test]
    fn test_should_retry_bound() {
        let policy = RetryPolicy::default();
        assert!(policy.should_retry(1));
        assert!(policy.should_retry(5));
        assert!(!policy.should_retry(6));
    }

    #[test]
    fn test_jitter_stays_within_quarter() {
        let policy = RetryPolicy::new(Duration::from_millis(1000), Duration::from_secs(30), 3)
            .with_jitter();
        for _ in 0..50 {
            let delay = policy.delay_for_attempt(1);
            assert!(delay >= Duration::from_millis(1000));
            assert!(delay <= Duration::from_millis(1250));
        }
    }

    #[test]
    fn test_worst_case_delay() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.worst_case_delay(), Duration::from_secs(5 + 10 + 20 + 30 + 30));
    }

    #[test]
    fn test_large_attempt_does_not_overflow() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for_attempt(u32::MAX), Duration::from_secs(30));
    }
}
