//! Bounded retry with optional exponential backoff.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;
use tracing::warn;

/// Retry behavior for the outer validation loop.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first. Never below 1.
    pub max_attempts: u32,
    /// Delay after the first failed attempt.
    pub delay: Duration,
    /// Multiplier applied to the delay after each further failure.
    pub backoff_multiplier: f64,
    /// Upper bound for any single delay.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::fixed(40, Duration::from_secs(10))
    }
}

impl RetryPolicy {
    /// A policy with a constant delay between attempts.
    #[must_use]
    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
            backoff_multiplier: 1.0,
            max_delay: delay.max(Duration::from_secs(60)),
        }
    }

    /// Sets the backoff multiplier.
    #[must_use]
    pub const fn with_backoff(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    /// Sets the delay cap.
    #[must_use]
    pub const fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    /// Delay to wait after the given failed attempt (1-based).
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        calculate_backoff(attempt, self.delay, self.max_delay, self.backoff_multiplier)
    }

    /// Check if another attempt may follow the given one.
    #[must_use]
    pub const fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }
}

/// Calculate a delay using exponential backoff.
#[must_use]
pub fn calculate_backoff(
    attempt: u32,
    initial_delay: Duration,
    max_delay: Duration,
    multiplier: f64,
) -> Duration {
    let factor = multiplier.max(1.0).powi(attempt.saturating_sub(1) as i32);
    let delay_millis = (initial_delay.as_millis() as f64 * factor) as u64;
    Duration::from_millis(delay_millis).min(max_delay)
}

/// A successful retried operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryOutcome<T> {
    /// The value produced by the successful attempt.
    pub value: T,
    /// Attempts used, including the successful one.
    pub attempts: u32,
}

/// Every attempt failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryExhausted<E> {
    /// The error of the last attempt.
    pub error: E,
    /// Attempts made.
    pub attempts: u32,
}

/// Runs `operation` until it succeeds or the policy's attempts are used up.
///
/// The closure receives the 1-based attempt number. Errors are not
/// inspected: every failure is retried.
pub async fn retry_with_backoff<F, Fut, T, E>(
    policy: &RetryPolicy,
    mut operation: F,
) -> Result<RetryOutcome<T>, RetryExhausted<E>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let mut attempt = 0;

    loop {
        attempt += 1;

        match operation(attempt).await {
            Ok(value) => {
                return Ok(RetryOutcome {
                    value,
                    attempts: attempt,
                });
            }
            Err(error) => {
                if !policy.should_retry(attempt) {
                    return Err(RetryExhausted {
                        error,
                        attempts: attempt,
                    });
                }

                let delay = policy.delay_for_attempt(attempt);
                warn!(
                    attempt,
                    max_attempts = policy.max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %error,
                    "attempt failed, retrying"
                );
                sleep(delay).await;
            }
        }
    }
}
