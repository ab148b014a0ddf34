// crates/resilience/src/lib.rs
//! Resilience patterns for fault-tolerant async operations
//!
//! This crate provides composable executors that wrap a risky operation:
//! - Retry with exponential backoff and jitter
//! - Circuit breaker with a bounded half-open probe budget
//! - Timeout with optional cancellation
//! - Bulkhead concurrency isolation
//! - Sliding-window rate limiting
//!
//! Executors are created once and shared; clones share state. Stack them
//! with [`Pipeline`] or the functions in [`decorators`].
//!
//! # Example
//!
//! ```rust
//! use breakwater_resilience::{
//!     CircuitBreaker, CircuitBreakerConfig, Pipeline, ResilienceError, RetryConfig,
//!     RetryExecutor, TimeoutConfig, TimeoutExecutor,
//! };
//! use std::time::Duration;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let pipeline = Pipeline::builder()
//!     .retry(RetryExecutor::new(RetryConfig::new(3).with_delay(Duration::from_millis(10))))
//!     .circuit_breaker(CircuitBreaker::new("catalog", CircuitBreakerConfig::default()))
//!     .timeout(TimeoutExecutor::new(TimeoutConfig::new(Duration::from_secs(2))), "catalog.get")
//!     .build();
//!
//! let value = pipeline
//!     .execute(|| async { Ok::<_, ResilienceError>(42) })
//!     .await;
//! assert_eq!(value.ok(), Some(42));
//! # }
//! ```

mod bulkhead;
mod circuit_breaker;
mod config;
pub mod decorators;
mod error;
mod kind;
mod pipeline;
mod rate_limiter;
mod retry;
mod timeout;

pub use bulkhead::BulkheadExecutor;
pub use circuit_breaker::{CircuitBreaker, CircuitBreakerSnapshot, CircuitState};
pub use config::{BulkheadConfig, CircuitBreakerConfig, RateLimitConfig, RetryConfig, TimeoutConfig};
pub use decorators::Fallback;
pub use error::{BoxError, ResilienceError, ResilienceResult};
pub use kind::ErrorKind;
pub use pipeline::{Layer, LayerKind, Pipeline, PipelineBuilder};
pub use rate_limiter::RateLimiter;
pub use retry::{with_retry, RetryExecutor};
pub use timeout::{with_timeout, TimeoutExecutor};
