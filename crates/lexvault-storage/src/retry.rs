//! Retry logic for remote storage operations.

use std::future::Future;
use std::time::Duration;

use lexvault_core::{Error, Result};
use rand::Rng;
use tokio_util::sync::CancellationToken;

use crate::TRACING_TARGET_RETRY;

/// Exponential backoff with full jitter.
///
/// Only [`Transient`](lexvault_core::ErrorKind::Transient) errors are
/// retried; everything else, including not-found, is returned on the first
/// occurrence. With `max_attempts` unset the policy retries until the
/// operation succeeds or the cancellation token fires.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Maximum number of retries after the first attempt (`None` retries forever).
    pub max_attempts: Option<u32>,
    /// Upper bound of the first backoff window.
    pub initial_backoff: Duration,
    /// Cap on any single backoff window.
    pub max_backoff: Duration,
    /// Growth factor between consecutive windows.
    pub backoff_multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: None,
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(60),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Creates a policy that gives up after `max_attempts` retries.
    pub fn bounded(max_attempts: u32) -> Self {
        Self {
            max_attempts: Some(max_attempts),
            ..Self::default()
        }
    }

    /// Creates a policy that never retries.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: Some(0),
            initial_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
            backoff_multiplier: 1.0,
        }
    }

    /// Set the initial backoff window.
    #[must_use]
    pub fn with_initial_backoff(mut self, initial_backoff: Duration) -> Self {
        self.initial_backoff = initial_backoff;
        self
    }

    /// Set the maximum backoff window.
    #[must_use]
    pub fn with_max_backoff(mut self, max_backoff: Duration) -> Self {
        self.max_backoff = max_backoff;
        self
    }

    /// Set the backoff multiplier.
    #[must_use]
    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    /// Upper bound of the backoff window for the given (zero-based) retry.
    pub fn backoff_ceiling(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let millis = self.initial_backoff.as_millis() as f64 * self.backoff_multiplier.powi(exponent);
        let max_millis = self.max_backoff.as_millis() as f64;
        Duration::from_millis(millis.min(max_millis).max(0.0) as u64)
    }

    /// Picks a uniformly random delay in `[0, ceiling]`.
    fn jittered_backoff(&self, attempt: u32) -> Duration {
        let ceiling = self.backoff_ceiling(attempt).as_millis() as u64;
        if ceiling == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::rng().random_range(0..=ceiling))
    }

    fn exhausted(&self, attempt: u32) -> bool {
        self.max_attempts.is_some_and(|max| attempt >= max)
    }

    /// Runs `operation` until it succeeds, fails permanently, the attempt
    /// budget runs out, or `cancel` fires.
    pub async fn retry<F, Fut, T>(&self, cancel: &CancellationToken, mut operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 0u32;

        loop {
            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(Error::cancelled()),
                outcome = operation() => outcome,
            };

            let err = match outcome {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            if !err.is_retryable() {
                tracing::trace!(
                    target: TRACING_TARGET_RETRY,
                    error = %err,
                    "Non-retryable error, failing immediately"
                );
                return Err(err);
            }

            if self.exhausted(attempt) {
                tracing::warn!(
                    target: TRACING_TARGET_RETRY,
                    attempts = attempt + 1,
                    error = %err,
                    "Retry budget exhausted"
                );
                return Err(err);
            }

            let backoff = self.jittered_backoff(attempt);
            tracing::debug!(
                target: TRACING_TARGET_RETRY,
                attempt = attempt + 1,
                backoff_ms = backoff.as_millis() as u64,
                error = %err,
                "Retrying operation after backoff"
            );

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(Error::cancelled()),
                _ = tokio::time::sleep(backoff) => {}
            }

            attempt = attempt.saturating_add(1);
        }
    }
}
