use std::time::Duration;

/// Upper bound on a single backoff pause.
const MAX_BACKOFF: Duration = Duration::from_secs(120);

/// Bounded exponential backoff for idempotent requests.
///
/// The first retry fires immediately; retry `n > 1` waits
/// `backoff_factor * 2^(n-1)`, capped at two minutes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub backoff_factor: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            backoff_factor: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            backoff_factor: Duration::ZERO,
        }
    }

    /// Total number of requests the policy allows.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries + 1
    }

    /// Pause before the `retry`-th retry (1-based).
    pub fn delay(&self, retry: u32) -> Duration {
        if retry <= 1 {
            return Duration::ZERO;
        }
        let exponent = (retry - 1).min(16);
        self.backoff_factor
            .saturating_mul(1u32 << exponent)
            .min(MAX_BACKOFF)
    }

    pub(crate) async fn pause(&self, retry: u32) {
        let delay = self.delay(retry);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}
