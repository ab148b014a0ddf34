// crates/resilience/src/bulkhead.rs
//! Concurrency isolation

use crate::config::BulkheadConfig;
use crate::error::{ResilienceError, ResilienceResult};
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{Semaphore, SemaphorePermit};

/// Caps the number of concurrent executions
///
/// Cloning is cheap and shares the slots.
#[derive(Debug, Clone)]
pub struct BulkheadExecutor {
    config: BulkheadConfig,
    semaphore: Arc<Semaphore>,
    active: Arc<AtomicUsize>,
}

/// Held for the duration of an admitted execution
struct Slot<'a> {
    _permit: SemaphorePermit<'a>,
    active: &'a AtomicUsize,
}

impl Drop for Slot<'_> {
    fn drop(&mut self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
    }
}

impl BulkheadExecutor {
    /// Creates a new bulkhead
    pub fn new(config: BulkheadConfig) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(config.max_concurrent)),
            active: Arc::new(AtomicUsize::new(0)),
            config,
        }
    }

    /// Returns the configuration
    pub fn config(&self) -> &BulkheadConfig {
        &self.config
    }

    /// Number of executions currently running
    pub fn active(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// Number of free slots
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    async fn admit(&self) -> ResilienceResult<Slot<'_>> {
        let permit = if self.config.max_wait.is_zero() {
            self.semaphore.try_acquire().ok()
        } else {
            match tokio::time::timeout(self.config.max_wait, self.semaphore.acquire()).await {
                Ok(permit) => permit.ok(),
                Err(_) => None,
            }
        };

        let Some(permit) = permit else {
            log::debug!(
                "bulkhead rejected call ({} of {} slots busy)",
                self.active(),
                self.config.max_concurrent
            );
            return Err(ResilienceError::BulkheadFull {
                max_concurrent: self.config.max_concurrent,
            });
        };

        self.active.fetch_add(1, Ordering::SeqCst);
        Ok(Slot {
            _permit: permit,
            active: &self.active,
        })
    }

    /// Executes an operation inside the bulkhead
    ///
    /// The slot is released on every exit path, including cancellation of
    /// the returned future.
    pub async fn execute<F, Fut, T, E>(&self, operation: F) -> ResilienceResult<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Into<ResilienceError>,
    {
        let _slot = self.admit().await?;
        operation().await.map_err(Into::into)
    }
}

impl Default for BulkheadExecutor {
    fn default() -> Self {
        Self::new(BulkheadConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_bulkhead_admits_within_capacity() {
        let bulkhead = BulkheadExecutor::new(BulkheadConfig::new(2));
        let result = bulkhead.execute(|| async { Ok::<_, ResilienceError>(7) }).await;

        assert_eq!(result.ok(), Some(7));
        assert_eq!(bulkhead.active(), 0);
        assert_eq!(bulkhead.available(), 2);
    }

    #[tokio::test]
    async fn test_zero_wait_rejects_when_full() {
        let bulkhead = BulkheadExecutor::new(BulkheadConfig::new(1));
        let (release_tx, release_rx) = tokio::sync::oneshot::channel::<()>();

        let holder = {
            let bulkhead = bulkhead.clone();
            tokio::spawn(async move {
                bulkhead
                    .execute(|| async move {
                        let _ = release_rx.await;
                        Ok::<_, ResilienceError>(())
                    })
                    .await
            })
        };

        while bulkhead.active() == 0 {
            tokio::task::yield_now().await;
        }

        let rejected = bulkhead.execute(|| async { Ok::<_, ResilienceError>(()) }).await;
        assert!(matches!(
            rejected,
            Err(ResilienceError::BulkheadFull { max_concurrent: 1 })
        ));

        let _ = release_tx.send(());
        assert!(holder.await.expect("join").is_ok());
        assert_eq!(bulkhead.active(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_waiting_caller_gets_freed_slot() {
        let config = BulkheadConfig::new(1).with_max_wait(Duration::from_millis(100));
        let bulkhead = BulkheadExecutor::new(config);

        let holder = {
            let bulkhead = bulkhead.clone();
            tokio::spawn(async move {
                bulkhead
                    .execute(|| async {
                        tokio::time::sleep(Duration::from_millis(30)).await;
                        Ok::<_, ResilienceError>(())
                    })
                    .await
            })
        };
        while bulkhead.active() == 0 {
            tokio::task::yield_now().await;
        }

        let result = bulkhead.execute(|| async { Ok::<_, ResilienceError>("second") }).await;
        assert_eq!(result.ok(), Some("second"));
        assert!(holder.await.expect("join").is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_waiting_caller_times_out() {
        let config = BulkheadConfig::new(1).with_max_wait(Duration::from_millis(20));
        let bulkhead = BulkheadExecutor::new(config);

        let holder = {
            let bulkhead = bulkhead.clone();
            tokio::spawn(async move {
                bulkhead
                    .execute(|| async {
                        tokio::time::sleep(Duration::from_millis(500)).await;
                        Ok::<_, ResilienceError>(())
                    })
                    .await
            })
        };
        while bulkhead.active() == 0 {
            tokio::task::yield_now().await;
        }

        let result = bulkhead.execute(|| async { Ok::<_, ResilienceError>(()) }).await;
        assert!(matches!(result, Err(ResilienceError::BulkheadFull { .. })));
        holder.abort();
    }

    #[tokio::test]
    async fn test_slot_released_after_failure() {
        let bulkhead = BulkheadExecutor::new(BulkheadConfig::new(1));

        let result = bulkhead.execute(|| async { Err::<(), _>("broken") }).await;
        assert!(result.is_err());
        assert_eq!(bulkhead.active(), 0);
        assert_eq!(bulkhead.available(), 1);
    }
}
