// crates/resilience/src/pipeline.rs
//! Ordered stacks of executors
//!
//! Layers are applied in insertion order: the first layer added is the
//! outermost, evaluated first on entry and last on exit.

use crate::bulkhead::BulkheadExecutor;
use crate::circuit_breaker::CircuitBreaker;
use crate::error::{ResilienceError, ResilienceResult};
use crate::rate_limiter::RateLimiter;
use crate::retry::RetryExecutor;
use crate::timeout::TimeoutExecutor;
use futures::future::{BoxFuture, FutureExt};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::sync::Arc;

type Operation<T> = Arc<dyn Fn() -> BoxFuture<'static, ResilienceResult<T>> + Send + Sync>;

/// Identifies a layer type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayerKind {
    RateLimit,
    Bulkhead,
    Retry,
    CircuitBreaker,
    Timeout,
}

impl fmt::Display for LayerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::RateLimit => "rate_limit",
            Self::Bulkhead => "bulkhead",
            Self::Retry => "retry",
            Self::CircuitBreaker => "circuit_breaker",
            Self::Timeout => "timeout",
        };
        f.write_str(name)
    }
}

/// A single executor in a pipeline
#[derive(Debug, Clone)]
pub enum Layer {
    RateLimit(RateLimiter),
    Bulkhead(BulkheadExecutor),
    Retry(RetryExecutor),
    CircuitBreaker(CircuitBreaker),
    Timeout {
        executor: TimeoutExecutor,
        label: String,
    },
}

impl Layer {
    /// Returns the layer type
    pub fn kind(&self) -> LayerKind {
        match self {
            Self::RateLimit(_) => LayerKind::RateLimit,
            Self::Bulkhead(_) => LayerKind::Bulkhead,
            Self::Retry(_) => LayerKind::Retry,
            Self::CircuitBreaker(_) => LayerKind::CircuitBreaker,
            Self::Timeout { .. } => LayerKind::Timeout,
        }
    }
}

/// Builder for [`Pipeline`]
#[derive(Debug, Default)]
pub struct PipelineBuilder {
    layers: Vec<Layer>,
}

impl PipelineBuilder {
    /// Appends a rate limiter
    pub fn rate_limit(self, limiter: RateLimiter) -> Self {
        self.layer(Layer::RateLimit(limiter))
    }

    /// Appends a bulkhead
    pub fn bulkhead(self, bulkhead: BulkheadExecutor) -> Self {
        self.layer(Layer::Bulkhead(bulkhead))
    }

    /// Appends a retry executor
    pub fn retry(self, retry: RetryExecutor) -> Self {
        self.layer(Layer::Retry(retry))
    }

    /// Appends a circuit breaker
    pub fn circuit_breaker(self, breaker: CircuitBreaker) -> Self {
        self.layer(Layer::CircuitBreaker(breaker))
    }

    /// Appends a timeout reported under `label`
    pub fn timeout(self, executor: TimeoutExecutor, label: impl Into<String>) -> Self {
        self.layer(Layer::Timeout {
            executor,
            label: label.into(),
        })
    }

    /// Appends any layer
    pub fn layer(mut self, layer: Layer) -> Self {
        self.layers.push(layer);
        self
    }

    /// Finishes the pipeline
    pub fn build(self) -> Pipeline {
        Pipeline {
            layers: self.layers.into(),
        }
    }
}

/// An ordered stack of executors sharing state across calls
#[derive(Debug, Clone)]
pub struct Pipeline {
    layers: Arc<[Layer]>,
}

impl Pipeline {
    /// Creates a builder
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::default()
    }

    /// Layer types from outermost to innermost
    pub fn layers(&self) -> Vec<LayerKind> {
        self.layers.iter().map(Layer::kind).collect()
    }

    /// Returns the first circuit breaker in the stack
    pub fn circuit_breaker(&self) -> Option<&CircuitBreaker> {
        self.layers.iter().find_map(|layer| match layer {
            Layer::CircuitBreaker(breaker) => Some(breaker),
            _ => None,
        })
    }

    /// Returns the first rate limiter in the stack
    pub fn rate_limiter(&self) -> Option<&RateLimiter> {
        self.layers.iter().find_map(|layer| match layer {
            Layer::RateLimit(limiter) => Some(limiter),
            _ => None,
        })
    }

    /// Returns the first bulkhead in the stack
    pub fn bulkhead(&self) -> Option<&BulkheadExecutor> {
        self.layers.iter().find_map(|layer| match layer {
            Layer::Bulkhead(bulkhead) => Some(bulkhead),
            _ => None,
        })
    }

    /// Executes an operation through every layer
    pub async fn execute<F, Fut, T, E>(&self, operation: F) -> ResilienceResult<T>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: Into<ResilienceError> + Send + 'static,
    {
        run(Arc::clone(&self.layers), 0, erase(operation)).await
    }

    /// Wraps an operation, returning an equivalent guarded operation
    pub fn wrap<F, Fut, T, E>(
        &self,
        operation: F,
    ) -> impl Fn() -> BoxFuture<'static, ResilienceResult<T>> + Clone + Send + Sync + 'static
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: Into<ResilienceError> + Send + 'static,
    {
        let layers = Arc::clone(&self.layers);
        let operation = erase(operation);
        move || run(Arc::clone(&layers), 0, Arc::clone(&operation))
    }
}

fn erase<F, Fut, T, E>(operation: F) -> Operation<T>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
    T: Send + 'static,
    E: Into<ResilienceError> + Send + 'static,
{
    Arc::new(move || {
        let fut = operation();
        async move { fut.await.map_err(Into::into) }.boxed()
    })
}

fn run<T>(layers: Arc<[Layer]>, depth: usize, operation: Operation<T>) -> BoxFuture<'static, ResilienceResult<T>>
where
    T: Send + 'static,
{
    async move {
        let Some(layer) = layers.get(depth) else {
            return operation().await;
        };
        let next = || run(Arc::clone(&layers), depth + 1, Arc::clone(&operation));

        match layer {
            Layer::RateLimit(limiter) => limiter.execute(next).await,
            Layer::Bulkhead(bulkhead) => bulkhead.execute(next).await,
            Layer::Retry(retry) => retry.execute(next).await,
            Layer::CircuitBreaker(breaker) => breaker.execute(next).await,
            Layer::Timeout { executor, label } => executor.execute(label, next).await,
        }
    }
    .boxed()
}
