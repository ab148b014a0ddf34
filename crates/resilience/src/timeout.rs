// crates/resilience/src/timeout.rs
//! Timeout handling utilities

use crate::config::TimeoutConfig;
use crate::error::{ResilienceError, ResilienceResult};
use std::future::Future;
use std::time::Duration;
use tokio::task::AbortHandle;

/// Runs a future under a deadline, dropping it when the deadline passes
pub async fn with_timeout<Fut, T>(duration: Duration, future: Fut) -> ResilienceResult<T>
where
    Fut: Future<Output = T>,
{
    tokio::time::timeout(duration, future)
        .await
        .map_err(|_| ResilienceError::Timeout {
            label: "operation".to_string(),
            duration,
        })
}

/// Aborts the spawned task unless disarmed, including when the caller is dropped
struct AbortOnDrop(Option<AbortHandle>);

impl AbortOnDrop {
    fn disarm(&mut self) {
        self.0 = None;
    }
}

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        if let Some(handle) = self.0.take() {
            handle.abort();
        }
    }
}

/// Bounds the execution time of spawned operations
#[derive(Debug, Clone, Default)]
pub struct TimeoutExecutor {
    config: TimeoutConfig,
}

impl TimeoutExecutor {
    /// Creates a new timeout executor
    pub fn new(config: TimeoutConfig) -> Self {
        Self { config }
    }

    /// Gets the timeout duration
    pub fn duration(&self) -> Duration {
        self.config.duration
    }

    /// Returns the configuration
    pub fn config(&self) -> &TimeoutConfig {
        &self.config
    }

    /// Executes an operation with this timeout
    ///
    /// The operation runs on its own task. On timeout the task is aborted if
    /// `cancel_on_timeout` is set, otherwise it is left to finish in the
    /// background. Abort is best effort: it takes effect at the task's next
    /// suspension point.
    pub async fn execute<F, Fut, T, E>(&self, label: &str, operation: F) -> ResilienceResult<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: Into<ResilienceError> + Send + 'static,
    {
        let mut handle = tokio::spawn(operation());
        let mut guard = AbortOnDrop(
            self.config
                .cancel_on_timeout
                .then(|| handle.abort_handle()),
        );

        match tokio::time::timeout(self.config.duration, &mut handle).await {
            Ok(Ok(result)) => {
                guard.disarm();
                result.map_err(Into::into)
            }
            Ok(Err(join_error)) => {
                guard.disarm();
                if join_error.is_panic() {
                    std::panic::resume_unwind(join_error.into_panic());
                }
                Err(ResilienceError::Cancelled)
            }
            Err(_) => {
                if self.config.cancel_on_timeout {
                    log::debug!("'{}' timed out after {:?}, aborting", label, self.config.duration);
                } else {
                    log::debug!(
                        "'{}' timed out after {:?}, left running",
                        label,
                        self.config.duration
                    );
                }
                drop(guard);
                Err(ResilienceError::Timeout {
                    label: label.to_string(),
                    duration: self.config.duration,
                })
            }
        }
    }
}
