//! Session Retry Policy
//!
//! Fixed-delay retry policy for the navigation sequence. The whole sequence
//! is one attempt; a failed attempt waits a constant backoff before the next
//! one, and no delay follows the final attempt.

use std::time::Duration;

/// Configuration for session retry behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryConfig {
    /// Maximum number of attempts (at least 1 is always made).
    pub max_attempts: u32,
    /// Delay between attempts.
    pub backoff: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Duration::from_secs(1),
        }
    }
}

impl RetryConfig {
    /// Create a new configuration with custom values.
    #[must_use]
    pub const fn new(max_attempts: u32, backoff: Duration) -> Self {
        Self {
            max_attempts,
            backoff,
        }
    }
}

/// Tracks attempts against a [`RetryConfig`].
///
/// # Example
///
/// ```rust
/// use quote_proxy::infrastructure::upstream::retry::{RetryConfig, RetryPolicy};
/// use std::time::Duration;
///
/// let mut policy = RetryPolicy::new(RetryConfig::new(2, Duration::from_millis(10)));
/// assert_eq!(policy.begin_attempt(), Some(1));
/// assert_eq!(policy.backoff_after_failure(), Some(Duration::from_millis(10)));
/// assert_eq!(policy.begin_attempt(), Some(2));
/// assert_eq!(policy.backoff_after_failure(), None);
/// assert_eq!(policy.begin_attempt(), None);
/// ```
#[derive(Debug)]
pub struct RetryPolicy {
    config: RetryConfig,
    attempt_count: u32,
}

impl RetryPolicy {
    /// Create a new retry policy.
    #[must_use]
    pub const fn new(config: RetryConfig) -> Self {
        Self {
            config,
            attempt_count: 0,
        }
    }

    const fn max_attempts(&self) -> u32 {
        if self.config.max_attempts == 0 {
            1
        } else {
            self.config.max_attempts
        }
    }

    /// Start the next attempt, returning its 1-based number.
    ///
    /// Returns `None` once the attempt ceiling is reached.
    pub const fn begin_attempt(&mut self) -> Option<u32> {
        if self.attempt_count >= self.max_attempts() {
            return None;
        }
        self.attempt_count += 1;
        Some(self.attempt_count)
    }

    /// Delay to wait after the current attempt failed.
    ///
    /// Returns `None` when that attempt was the last one.
    #[must_use]
    pub const fn backoff_after_failure(&self) -> Option<Duration> {
        if self.should_retry() {
            Some(self.config.backoff)
        } else {
            None
        }
    }

    /// Get the current attempt count.
    #[must_use]
    pub const fn attempt_count(&self) -> u32 {
        self.attempt_count
    }

    /// Check if another attempt is allowed.
    #[must_use]
    pub const fn should_retry(&self) -> bool {
        self.attempt_count < self.max_attempts()
    }
}
