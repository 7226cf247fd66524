//! Retry logic for parameter store operations.
//!
//! Provides bounded exponential backoff with jitter. Every failure is
//! classified as retryable or fatal; fatal errors propagate immediately and
//! retryable ones are retried until the attempt budget is spent, at which
//! point the last error is wrapped in [`IcError::RetryExhausted`].

use std::future::Future;
use std::time::Duration;

use ic_error::{ErrorCategory, IcError, Result};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Configuration for retry behavior.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts (including the first call) before giving up.
    pub max_attempts: u32,
    /// Backoff after the first failed attempt, in milliseconds.
    pub initial_backoff_ms: u64,
    /// Upper bound on the pre-jitter backoff, in milliseconds.
    pub max_backoff_ms: u64,
    /// Growth factor applied per attempt.
    pub multiplier: u32,
    /// Whether to add up to 25% random jitter on top of the backoff.
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff_ms: 100,
            max_backoff_ms: 10_000,
            multiplier: 2,
            jitter: true,
        }
    }
}

impl RetryConfig {
    /// Create a new retry configuration with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the total number of attempts (minimum 1).
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Set the initial backoff in milliseconds.
    pub fn with_initial_backoff_ms(mut self, initial_backoff_ms: u64) -> Self {
        self.initial_backoff_ms = initial_backoff_ms;
        self
    }

    /// Set the maximum backoff in milliseconds.
    pub fn with_max_backoff_ms(mut self, max_backoff_ms: u64) -> Self {
        self.max_backoff_ms = max_backoff_ms;
        self
    }

    /// Set the backoff growth factor.
    pub fn with_multiplier(mut self, multiplier: u32) -> Self {
        self.multiplier = multiplier.max(1);
        self
    }

    /// Enable or disable jitter.
    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Pre-jitter backoff after the failure of attempt `attempt` (zero-based).
    ///
    /// `min(max_backoff, initial * multiplier^attempt)`; non-decreasing in
    /// `attempt`.
    pub fn base_backoff(&self, attempt: u32) -> Duration {
        let factor = u64::from(self.multiplier).saturating_pow(attempt);
        let base_ms = self.initial_backoff_ms.saturating_mul(factor);
        Duration::from_millis(base_ms.min(self.max_backoff_ms))
    }

    /// Calculate the backoff duration for a given attempt, including jitter.
    pub fn backoff_duration(&self, attempt: u32) -> Duration {
        let capped_ms = self.base_backoff(attempt).as_millis() as u64;

        let final_ms = if self.jitter {
            let jitter_range = capped_ms / 4; // 25% jitter
            let jitter = rand::rng().random_range(0..=jitter_range);
            capped_ms.saturating_add(jitter)
        } else {
            capped_ms
        };

        Duration::from_millis(final_ms)
    }
}

/// Run `operation` until it succeeds, fails fatally, or the attempt budget
/// in `config` is spent.
///
/// `classify` decides which failures are worth another attempt. `cancel` is
/// checked before each retry and raced against every backoff sleep, so a
/// cancelled run never waits out a full backoff. Exhaustion wraps the last
/// error in `RetryExhausted`; a fired token yields `Cancelled`.
pub async fn with_retry<F, Fut, T, C>(
    config: &RetryConfig,
    operation_name: &str,
    cancel: &CancellationToken,
    classify: C,
    mut operation: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
    C: Fn(&IcError) -> ErrorCategory,
{
    let max_attempts = config.max_attempts.max(1);
    let mut attempt: u32 = 0;

    loop {
        if attempt > 0 && cancel.is_cancelled() {
            debug!(operation = operation_name, attempt, "Cancelled before retry");
            return Err(IcError::Cancelled);
        }

        let error = match operation().await {
            Ok(result) => return Ok(result),
            Err(e) => e,
        };
        attempt += 1;

        if classify(&error) == ErrorCategory::Fatal {
            debug!(
                operation = operation_name,
                attempt,
                error = %error,
                "Non-retryable error"
            );
            return Err(error);
        }

        if attempt >= max_attempts {
            warn!(
                operation = operation_name,
                attempts = attempt,
                error = %error,
                "Retries exhausted"
            );
            return Err(IcError::RetryExhausted {
                attempts: attempt,
                source: Box::new(error),
            });
        }

        let backoff = config.backoff_duration(attempt - 1);
        warn!(
            operation = operation_name,
            attempt,
            error = %error,
            backoff_ms = backoff.as_millis() as u64,
            "Retryable error, backing off"
        );

        tokio::select! {
            _ = cancel.cancelled() => {
                debug!(operation = operation_name, attempt, "Cancelled during backoff");
                return Err(IcError::Cancelled);
            }
            _ = sleep(backoff) => {}
        }
    }
}
