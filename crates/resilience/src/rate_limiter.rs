// crates/resilience/src/rate_limiter.rs
//! Sliding-window rate limiting

use crate::config::RateLimitConfig;
use crate::error::{ResilienceError, ResilienceResult};
use std::collections::VecDeque;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

/// Sliding-window rate limiter
///
/// Cloning is cheap and shares the window.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    config: RateLimitConfig,
    requests: Arc<Mutex<VecDeque<Instant>>>,
}

impl RateLimiter {
    /// Creates a new rate limiter
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            requests: Arc::new(Mutex::new(VecDeque::with_capacity(config.calls.min(1024)))),
            config,
        }
    }

    /// Gets the maximum number of calls per window
    pub fn calls(&self) -> usize {
        self.config.calls
    }

    /// Gets the window length
    pub fn period(&self) -> Duration {
        self.config.period
    }

    fn window(&self) -> MutexGuard<'_, VecDeque<Instant>> {
        self.requests.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn prune(&self, requests: &mut VecDeque<Instant>, now: Instant) {
        while let Some(&oldest) = requests.front() {
            if now.duration_since(oldest) >= self.config.period {
                requests.pop_front();
            } else {
                break;
            }
        }
    }

    /// Attempts to record an admission, returning false when throttled
    pub fn try_acquire(&self) -> bool {
        let now = Instant::now();
        let mut requests = self.window();
        self.prune(&mut requests, now);

        if requests.len() < self.config.calls {
            requests.push_back(now);
            true
        } else {
            false
        }
    }

    /// Records an admission or fails with [`ResilienceError::RateLimitExceeded`]
    pub fn acquire(&self) -> ResilienceResult<()> {
        if self.try_acquire() {
            Ok(())
        } else {
            log::debug!(
                "rate limit of {} per {:?} reached",
                self.config.calls,
                self.config.period
            );
            Err(ResilienceError::RateLimitExceeded {
                calls: self.config.calls,
                period: self.config.period,
            })
        }
    }

    /// Executes an operation if the window has room
    pub async fn execute<F, Fut, T, E>(&self, operation: F) -> ResilienceResult<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Into<ResilienceError>,
    {
        self.acquire()?;
        operation().await.map_err(Into::into)
    }

    /// Admissions still available in the current window
    pub fn remaining_calls(&self) -> usize {
        let mut requests = self.window();
        self.prune(&mut requests, Instant::now());
        self.config.calls.saturating_sub(requests.len())
    }

    /// Time until the next admission becomes possible; zero when one is available now
    pub fn retry_after(&self) -> Duration {
        let now = Instant::now();
        let mut requests = self.window();
        self.prune(&mut requests, now);

        if requests.len() < self.config.calls {
            return Duration::ZERO;
        }
        requests
            .front()
            .map(|&oldest| self.config.period.saturating_sub(now.duration_since(oldest)))
            .unwrap_or(Duration::ZERO)
    }

    /// Forgets every recorded admission
    pub fn reset(&self) {
        self.window().clear();
    }
}
