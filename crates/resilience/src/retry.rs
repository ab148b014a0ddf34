// crates/resilience/src/retry.rs
//! Retry with exponential backoff and jitter

use crate::config::RetryConfig;
use crate::error::{ResilienceError, ResilienceResult};
use crate::kind::matches_filter;
use rand::Rng;
use std::future::Future;
use std::time::Duration;

/// Executes an operation up to `max_attempts` times
#[derive(Debug, Clone, Default)]
pub struct RetryExecutor {
    config: RetryConfig,
}

impl RetryExecutor {
    /// Creates a new retry executor
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    /// Returns the configuration
    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Returns the maximum number of attempts, never less than one
    pub fn max_attempts(&self) -> usize {
        self.config.max_attempts.max(1)
    }

    /// Calculates the un-jittered delay after the given failed attempt (1-based)
    pub fn delay_for_attempt(&self, attempt: usize) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let exponent = i32::try_from(attempt - 1).unwrap_or(i32::MAX);
        let base = self.config.delay.as_secs_f64() * self.config.backoff_multiplier.powi(exponent);
        let capped = base.min(self.config.max_delay.as_secs_f64());

        Duration::try_from_secs_f64(capped).unwrap_or(self.config.max_delay)
    }

    /// Delay actually slept after the given attempt, jitter included
    fn backoff(&self, attempt: usize) -> Duration {
        let delay = self.delay_for_attempt(attempt);
        if !self.config.jitter {
            return delay;
        }
        let factor = 0.5 + rand::thread_rng().gen::<f64>();
        Duration::try_from_secs_f64(delay.as_secs_f64() * factor).unwrap_or(self.config.max_delay)
    }

    /// Checks if an error should be retried
    pub fn is_retryable(&self, error: &ResilienceError) -> bool {
        matches_filter(&self.config.retryable, &error.kind())
    }

    /// Executes an operation with retry logic
    ///
    /// Non-retryable errors are returned unchanged. When every attempt fails
    /// the last error is wrapped in [`ResilienceError::RetryExhausted`].
    pub async fn execute<F, Fut, T, E>(&self, mut operation: F) -> ResilienceResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Into<ResilienceError>,
    {
        let max_attempts = self.max_attempts();
        let mut attempt = 0;

        loop {
            attempt += 1;

            let err = match operation().await {
                Ok(value) => return Ok(value),
                Err(e) => e.into(),
            };

            if !self.is_retryable(&err) {
                return Err(err);
            }

            if attempt >= max_attempts {
                log::debug!("giving up after {} attempts: {}", attempt, err);
                return Err(ResilienceError::RetryExhausted {
                    attempts: max_attempts,
                    last_error: Box::new(err),
                });
            }

            let delay = self.backoff(attempt);
            log::debug!(
                "attempt {}/{} failed: {}; retrying in {:?}",
                attempt,
                max_attempts,
                err,
                delay
            );
            tokio::time::sleep(delay).await;
        }
    }
}

/// Executes an operation with retry logic
pub async fn with_retry<F, Fut, T, E>(config: &RetryConfig, operation: F) -> ResilienceResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Into<ResilienceError>,
{
    RetryExecutor::new(config.clone()).execute(operation).await
}
