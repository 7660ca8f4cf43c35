//! Bounded retry for idempotent reads.
//!
//! Writes are never wrapped in a [`RetryPolicy`]: a resubmitted vote is
//! rejected by governance and a resubmitted edit can double-apply. Failed
//! writes are recovered by the next pass instead.

use crate::config::RetryConfig;
use crate::{Error, Result};
use std::time::Duration;

/// Longest single backoff, regardless of attempt number.
const MAX_BACKOFF_MS: u64 = 30_000;

/// Exponential-backoff retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_retries: u32,
    base_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

impl RetryPolicy {
    /// Creates a policy.
    #[must_use]
    pub const fn new(max_retries: u32, base_backoff_ms: u64) -> Self {
        Self {
            max_retries,
            base_backoff_ms,
        }
    }

    /// A policy that never retries.
    #[must_use]
    pub const fn none() -> Self {
        Self::new(0, 0)
    }

    /// Builds a policy from configuration.
    #[must_use]
    pub const fn from_config(config: &RetryConfig) -> Self {
        Self::new(config.max_retries, config.retry_backoff_ms)
    }

    /// Maximum retries after the first attempt.
    #[must_use]
    pub const fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Delay before retry number `attempt` (1-based): base, 2x base, 4x base...
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        let delay = self
            .base_backoff_ms
            .saturating_mul(1_u64 << exponent)
            .min(MAX_BACKOFF_MS);
        Duration::from_millis(delay)
    }

    /// Runs `call`, retrying transient failures.
    ///
    /// Only upstream errors and timeouts are retried, and client-side HTTP
    /// rejections (4xx) are returned immediately.
    ///
    /// # Errors
    ///
    /// Returns the last error once retries are exhausted, or the first
    /// non-retryable error.
    pub fn run<T, F>(&self, operation: &str, mut call: F) -> Result<T>
    where
        F: FnMut() -> Result<T>,
    {
        let mut attempt = 0_u32;
        loop {
            match call() {
                Ok(value) => return Ok(value),
                Err(err) if attempt < self.max_retries && is_retryable(&err) => {
                    attempt += 1;
                    let delay = self.delay_for_attempt(attempt);
                    tracing::warn!(
                        operation,
                        attempt,
                        max_retries = self.max_retries,
                        delay_ms = crate::duration_to_millis(delay),
                        error = %err,
                        "Retrying read"
                    );
                    metrics::counter!("sweep_upstream_retries_total", "operation" => operation.to_string())
                        .increment(1);
                    if !delay.is_zero() {
                        std::thread::sleep(delay);
                    }
                },
                Err(err) => return Err(err),
            }
        }
    }
}

fn is_retryable(err: &Error) -> bool {
    match err {
        Error::Upstream { cause, .. } => !cause.starts_with("HTTP 4"),
        other => other.is_transient(),
    }
}
