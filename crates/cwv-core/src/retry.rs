//! Retry with exponential backoff for measurement fetches.
//!
//! [`RetryingFetcher`] wraps any single-attempt [`MeasurementFetcher`] and
//! re-issues the call on transient failures (429, 5xx, timeouts, network
//! errors). Waits go through a [`Sleeper`] so the schedule can be asserted
//! in tests without real sleeping.

use std::time::Duration;

use crate::error::AppError;
use crate::models::{Category, UrlRecord};
use crate::traits::{MeasurementFetcher, Sleeper};

/// Retry configuration with exponential backoff.
///
/// Delay before retry `n` (1-indexed) is `base_delay * 2^(n-1)`, capped at
/// `max_delay`. With the defaults: 1s, then 2s.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Total attempts including the first one.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
        }
    }
}

impl RetryConfig {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
            ..Default::default()
        }
    }

    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    /// Delay to wait after failed attempt `attempt` (1-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        std::cmp::min(self.base_delay.saturating_mul(factor), self.max_delay)
    }
}

/// Production sleeper backed by the tokio timer.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioSleeper;

impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// A [`MeasurementFetcher`] wrapper that retries transient failures.
///
/// Permanent failures are returned immediately. When the last attempt
/// fails transiently the error is wrapped in
/// [`AppError::RetriesExhausted`].
#[derive(Clone)]
pub struct RetryingFetcher<F, S> {
    inner: F,
    sleeper: S,
    config: RetryConfig,
}

impl<F: MeasurementFetcher, S: Sleeper> RetryingFetcher<F, S> {
    pub fn new(inner: F, sleeper: S, config: RetryConfig) -> Self {
        Self {
            inner,
            sleeper,
            config,
        }
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }
}

impl<F: MeasurementFetcher> RetryingFetcher<F, TokioSleeper> {
    pub fn with_tokio(inner: F, config: RetryConfig) -> Self {
        Self::new(inner, TokioSleeper, config)
    }
}

impl<F: MeasurementFetcher, S: Sleeper> MeasurementFetcher for RetryingFetcher<F, S> {
    async fn fetch(
        &self,
        target: &UrlRecord,
        category: Category,
    ) -> Result<serde_json::Value, AppError> {
        let max_attempts = self.config.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            match self.inner.fetch(target, category).await {
                Ok(response) => {
                    if attempt > 1 {
                        tracing::info!(url_id = target.url_id, attempt, "Fetch succeeded after retry");
                    }
                    return Ok(response);
                }
                Err(e) if !e.is_retryable() => {
                    tracing::debug!(url_id = target.url_id, error = %e, "Permanent failure, not retrying");
                    return Err(e);
                }
                Err(e) if attempt >= max_attempts => {
                    tracing::warn!(
                        url_id = target.url_id,
                        url = %target.url,
                        attempts = attempt,
                        error = %e,
                        "Retries exhausted"
                    );
                    return Err(AppError::RetriesExhausted {
                        attempts: attempt,
                        last_error: Box::new(e),
                    });
                }
                Err(e) => {
                    let delay = self.config.delay_for_attempt(attempt);
                    tracing::warn!(
                        url_id = target.url_id,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Transient failure, backing off"
                    );
                    self.sleeper.sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}
