//! Retry policy for transient fetch failures.
//!
//! Backoff is pure exponential doubling: `retry_delay * 2^attempt` with a
//! 0-based attempt index, and no wait after the final attempt. The policy
//! bounds the *total* number of attempts, including the first.

use std::time::Duration;

/// Default maximum fetch attempts (including the initial attempt).
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default base delay between attempts.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(2);

/// Configuration for retry behavior with exponential backoff.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of attempts, including the initial one.
    max_retries: u32,
    /// Base delay; doubled for each subsequent attempt.
    retry_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay: DEFAULT_RETRY_DELAY,
        }
    }
}

impl RetryPolicy {
    /// Creates a policy with the given attempt bound and base delay.
    ///
    /// `max_retries` is clamped to at least 1 so a fetch always makes one
    /// attempt.
    #[must_use]
    pub fn new(max_retries: u32, retry_delay: Duration) -> Self {
        Self {
            max_retries: max_retries.max(1),
            retry_delay,
        }
    }

    /// Maximum number of attempts, including the initial one.
    #[must_use]
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Backoff delay after the given 0-based failed attempt.
    ///
    /// `delay = retry_delay * 2^attempt`.
    #[must_use]
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        self.retry_delay * 2u32.saturating_pow(attempt)
    }
}
