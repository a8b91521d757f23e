use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Explicit bounded retry policy.
///
/// Replaces ad-hoc timer-based retries: a transient failure is retried at
/// most `max_attempts` times in total, sleeping `backoff_ms * attempt`
/// between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first one. Minimum 1.
    pub max_attempts: u32,
    /// Base backoff in milliseconds, scaled linearly per attempt.
    pub backoff_ms: u64,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff_ms: u64) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff_ms,
        }
    }

    /// No retries: a single attempt.
    pub fn once() -> Self {
        Self::new(1, 0)
    }

    /// Delay to sleep before retry number `attempt` (1-based count of
    /// attempts already made).
    pub fn delay_before(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.backoff_ms.saturating_mul(attempt as u64))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, 250)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_policy_floors_attempts_at_one() {
        let p = RetryPolicy::new(0, 100);
        assert_eq!(p.max_attempts, 1);
    }

    #[test]
    fn test_retry_policy_backoff_scales() {
        let p = RetryPolicy::new(3, 100);
        assert_eq!(p.delay_before(1), Duration::from_millis(100));
        assert_eq!(p.delay_before(2), Duration::from_millis(200));
    }
}
