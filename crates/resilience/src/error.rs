// crates/resilience/src/error.rs
//! Error types for resilience operations

use crate::kind::ErrorKind;
use std::time::Duration;
use thiserror::Error;

/// Boxed error produced by a wrapped operation
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result type for resilience operations
pub type ResilienceResult<T> = Result<T, ResilienceError>;

/// Errors that can occur in resilience operations
#[derive(Debug, Error)]
pub enum ResilienceError {
    /// Circuit breaker refused the call
    #[error("Circuit breaker '{name}' is open (failures: {failure_count})")]
    CircuitOpen { name: String, failure_count: usize },

    /// All retry attempts exhausted
    #[error("All {attempts} retry attempts exhausted: {last_error}")]
    RetryExhausted {
        attempts: usize,
        #[source]
        last_error: Box<ResilienceError>,
    },

    /// Operation timed out
    #[error("Operation '{label}' timed out after {duration:?}")]
    Timeout { label: String, duration: Duration },

    /// Bulkhead has no free slot
    #[error("Bulkhead is full (max concurrent: {max_concurrent})")]
    BulkheadFull { max_concurrent: usize },

    /// Rate limit exceeded
    #[error("Rate limit exceeded (limit: {calls} per {period:?})")]
    RateLimitExceeded { calls: usize, period: Duration },

    /// Operation was cancelled
    #[error("Operation was cancelled")]
    Cancelled,

    /// The wrapped operation failed
    #[error("{source}")]
    Operation {
        kind: ErrorKind,
        #[source]
        source: BoxError,
    },
}

impl ResilienceError {
    /// Wraps an operation error without a specific classification
    pub fn operation(source: impl Into<BoxError>) -> Self {
        Self::classified(ErrorKind::OPERATION, source)
    }

    /// Wraps an operation error tagged with `kind`
    pub fn classified(kind: impl Into<ErrorKind>, source: impl Into<BoxError>) -> Self {
        Self::Operation {
            kind: kind.into(),
            source: source.into(),
        }
    }

    /// Returns the classification used by retry, breaker and fallback filters
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::CircuitOpen { .. } => ErrorKind::CIRCUIT_OPEN,
            Self::RetryExhausted { .. } => ErrorKind::RETRY_EXHAUSTED,
            Self::Timeout { .. } => ErrorKind::TIMEOUT,
            Self::BulkheadFull { .. } => ErrorKind::BULKHEAD_FULL,
            Self::RateLimitExceeded { .. } => ErrorKind::RATE_LIMITED,
            Self::Cancelled => ErrorKind::CANCELLED,
            Self::Operation { kind, .. } => kind.clone(),
        }
    }

    /// Returns true if the error was produced by an executor refusing admission
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            Self::CircuitOpen { .. } | Self::BulkheadFull { .. } | Self::RateLimitExceeded { .. }
        )
    }

    /// Downcasts the wrapped operation error, if this is one
    pub fn operation_error<E>(&self) -> Option<&E>
    where
        E: std::error::Error + 'static,
    {
        match self {
            Self::Operation { source, .. } => source.downcast_ref::<E>(),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ResilienceError {
    fn from(err: std::io::Error) -> Self {
        Self::classified(ErrorKind::IO, err)
    }
}

impl From<String> for ResilienceError {
    fn from(message: String) -> Self {
        Self::operation(message)
    }
}

impl From<&str> for ResilienceError {
    fn from(message: &str) -> Self {
        Self::operation(message)
    }
}

impl From<BoxError> for ResilienceError {
    fn from(source: BoxError) -> Self {
        Self::Operation {
            kind: ErrorKind::OPERATION,
            source,
        }
    }
}
