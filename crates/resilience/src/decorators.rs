// crates/resilience/src/decorators.rs
//! Function-wrapping decorators
//!
//! Each decorator takes an operation `Fn() -> Future<Output = Result<T, E>>`
//! and returns an equivalent operation whose error type is
//! [`ResilienceError`], so decorators nest freely. The outermost decorator
//! applies first to the call and last to the result:
//!
//! ```rust
//! use breakwater_resilience::decorators::{circuit_breaker, retryable};
//! use breakwater_resilience::{CircuitBreaker, CircuitBreakerConfig, RetryConfig, RetryExecutor};
//!
//! # async fn fetch() -> Result<u32, std::io::Error> { Ok(1) }
//! let breaker = CircuitBreaker::new("inventory", CircuitBreakerConfig::default());
//! // Every retry attempt re-enters the breaker.
//! let guarded = retryable(RetryExecutor::new(RetryConfig::default()), circuit_breaker(breaker, fetch));
//! # let _ = guarded;
//! ```

use crate::bulkhead::BulkheadExecutor;
use crate::circuit_breaker::CircuitBreaker;
use crate::error::{ResilienceError, ResilienceResult};
use crate::kind::{matches_filter, ErrorKind};
use crate::rate_limiter::RateLimiter;
use crate::retry::RetryExecutor;
use crate::timeout::TimeoutExecutor;
use futures::future::{BoxFuture, FutureExt};
use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;

/// Retries the operation according to `executor`
pub fn retryable<F, Fut, T, E>(
    executor: RetryExecutor,
    operation: F,
) -> impl Fn() -> BoxFuture<'static, ResilienceResult<T>> + Clone + Send + Sync + 'static
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
    T: Send + 'static,
    E: Into<ResilienceError> + Send + 'static,
{
    let executor = Arc::new(executor);
    let operation = Arc::new(operation);
    move || {
        let executor = Arc::clone(&executor);
        let operation = Arc::clone(&operation);
        async move { executor.execute(|| operation()).await }.boxed()
    }
}

/// Guards the operation with a shared circuit breaker
pub fn circuit_breaker<F, Fut, T, E>(
    breaker: CircuitBreaker,
    operation: F,
) -> impl Fn() -> BoxFuture<'static, ResilienceResult<T>> + Clone + Send + Sync + 'static
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
    T: Send + 'static,
    E: Into<ResilienceError> + Send + 'static,
{
    let operation = Arc::new(operation);
    move || {
        let breaker = breaker.clone();
        let operation = Arc::clone(&operation);
        async move { breaker.execute(|| operation()).await }.boxed()
    }
}

/// Bounds each call by `executor`'s deadline, reporting `label` on timeout
pub fn timeout<F, Fut, T, E>(
    executor: TimeoutExecutor,
    label: impl Into<String>,
    operation: F,
) -> impl Fn() -> BoxFuture<'static, ResilienceResult<T>> + Clone + Send + Sync + 'static
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
    T: Send + 'static,
    E: Into<ResilienceError> + Send + 'static,
{
    let executor = Arc::new(executor);
    let label: Arc<str> = Arc::from(label.into());
    let operation = Arc::new(operation);
    move || {
        let executor = Arc::clone(&executor);
        let label = Arc::clone(&label);
        let operation = Arc::clone(&operation);
        async move { executor.execute(&label, || operation()).await }.boxed()
    }
}

/// Runs the operation inside a shared bulkhead
pub fn bulkhead<F, Fut, T, E>(
    executor: BulkheadExecutor,
    operation: F,
) -> impl Fn() -> BoxFuture<'static, ResilienceResult<T>> + Clone + Send + Sync + 'static
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
    T: Send + 'static,
    E: Into<ResilienceError> + Send + 'static,
{
    let operation = Arc::new(operation);
    move || {
        let executor = executor.clone();
        let operation = Arc::clone(&operation);
        async move { executor.execute(|| operation()).await }.boxed()
    }
}

/// Admits the operation through a shared rate limiter
pub fn rate_limited<F, Fut, T, E>(
    limiter: RateLimiter,
    operation: F,
) -> impl Fn() -> BoxFuture<'static, ResilienceResult<T>> + Clone + Send + Sync + 'static
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
    T: Send + 'static,
    E: Into<ResilienceError> + Send + 'static,
{
    let operation = Arc::new(operation);
    move || {
        let limiter = limiter.clone();
        let operation = Arc::clone(&operation);
        async move { limiter.execute(|| operation()).await }.boxed()
    }
}

/// Replacement produced by [`fallback`]
pub enum Fallback<T> {
    /// Return a clone of a fixed value
    Value(T),
    /// Compute a value from the caught error
    With(Arc<dyn Fn(ResilienceError) -> T + Send + Sync>),
}

impl<T> Fallback<T> {
    /// Builds a computed fallback
    pub fn with<F>(f: F) -> Self
    where
        F: Fn(ResilienceError) -> T + Send + Sync + 'static,
    {
        Self::With(Arc::new(f))
    }
}

impl<T: Clone> Fallback<T> {
    fn produce(&self, error: ResilienceError) -> T {
        match self {
            Self::Value(value) => value.clone(),
            Self::With(f) => f(error),
        }
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for Fallback<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Self::With(_) => f.write_str("With(..)"),
        }
    }
}

/// Replaces errors whose kind is in `kinds` (all errors when empty)
pub fn fallback<F, Fut, T, E, I>(
    operation: F,
    fallback: Fallback<T>,
    kinds: I,
) -> impl Fn() -> BoxFuture<'static, ResilienceResult<T>> + Clone + Send + Sync + 'static
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
    T: Clone + Send + Sync + 'static,
    E: Into<ResilienceError> + Send + 'static,
    I: IntoIterator<Item = ErrorKind>,
{
    let filter: Arc<HashSet<ErrorKind>> = Arc::new(kinds.into_iter().collect());
    let fallback = Arc::new(fallback);
    let operation = Arc::new(operation);
    move || {
        let filter = Arc::clone(&filter);
        let fallback = Arc::clone(&fallback);
        let operation = Arc::clone(&operation);
        async move {
            match operation().await.map_err(Into::into) {
                Ok(value) => Ok(value),
                Err(err) if matches_filter(&filter, &err.kind()) => {
                    log::debug!("falling back after: {}", err);
                    Ok(fallback.produce(err))
                }
                Err(err) => Err(err),
            }
        }
        .boxed()
    }
}
