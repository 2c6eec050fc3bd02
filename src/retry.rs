use std::time::Duration;

/// Backoff configuration for transient request failures.
///
/// The delay before retry `n` (1-based) is `base_delay * multiplier^(n-1)`.
/// Which HTTP statuses count as transient is caller-classified through
/// `retry_on_status`; connection-level failures are always retried.
#[derive(Clone, Debug)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first one.
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub base_delay: Duration,
    /// Multiplicative factor applied to each subsequent retry delay.
    pub multiplier: f64,
    /// HTTP status codes that should trigger a retry. Statuses outside this
    /// list terminate immediately without consuming remaining attempts.
    pub retry_on_status: Vec<u16>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(1000),
            multiplier: 2.0,
            retry_on_status: vec![408, 429, 500, 502, 503, 504],
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
            ..Self::default()
        }
    }

    /// Whether a response status should be retried under this policy.
    pub fn should_retry_status(&self, status: u16) -> bool {
        self.retry_on_status.contains(&status)
    }

    /// Delay before the given retry (1-based).
    pub fn backoff_delay(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1).min(i32::MAX as u32) as i32;
        self.base_delay.mul_f64(self.multiplier.powi(exponent))
    }
}
