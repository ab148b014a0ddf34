// crates/resilience/src/config.rs
//! Executor configuration
//!
//! Durations are `Duration` in code and fractional seconds in serialized
//! form (`delay_seconds = 0.25`).

use crate::kind::ErrorKind;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;

/// Retry configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum number of attempts (including the first attempt)
    pub max_attempts: usize,
    /// Delay before the first retry
    #[serde(rename = "delay_seconds", with = "secs")]
    pub delay: Duration,
    /// Backoff multiplier applied per attempt
    pub backoff_multiplier: f64,
    /// Upper bound for a single delay
    #[serde(rename = "max_delay_seconds", with = "secs")]
    pub max_delay: Duration,
    /// Scale each delay by a random factor in [0.5, 1.5)
    pub jitter: bool,
    /// Kinds worth retrying; empty retries any error
    pub retryable: HashSet<ErrorKind>,
}

impl RetryConfig {
    /// Creates a configuration with `max_attempts` and defaults elsewhere
    pub fn new(max_attempts: usize) -> Self {
        Self {
            max_attempts,
            ..Self::default()
        }
    }

    /// Sets the initial delay
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Sets the maximum delay
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Sets the backoff multiplier
    pub fn with_backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    /// Sets whether to use jitter
    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Restricts retries to the given kinds
    pub fn with_retryable<I, K>(mut self, kinds: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<ErrorKind>,
    {
        self.retryable = kinds.into_iter().map(Into::into).collect();
        self
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_secs(1),
            backoff_multiplier: 2.0,
            max_delay: Duration::from_secs(60),
            jitter: true,
            retryable: HashSet::new(),
        }
    }
}

/// Circuit breaker configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Number of failures before opening the circuit
    pub failure_threshold: usize,
    /// Duration to wait before probing after opening
    #[serde(rename = "timeout_seconds", with = "secs")]
    pub timeout: Duration,
    /// Number of successful probes needed to close from half-open
    pub success_threshold: usize,
    /// Total probes admitted per half-open episode
    pub half_open_max_calls: usize,
    /// Kinds counted as failures; empty counts every error
    pub retryable: HashSet<ErrorKind>,
}

impl CircuitBreakerConfig {
    /// Creates a new configuration
    pub fn new(failure_threshold: usize, timeout: Duration) -> Self {
        Self {
            failure_threshold,
            timeout,
            ..Self::default()
        }
    }

    /// Sets the success threshold
    pub fn with_success_threshold(mut self, threshold: usize) -> Self {
        self.success_threshold = threshold;
        self
    }

    /// Sets the half-open admission budget
    pub fn with_half_open_max_calls(mut self, calls: usize) -> Self {
        self.half_open_max_calls = calls;
        self
    }

    /// Restricts failure accounting to the given kinds
    pub fn with_retryable<I, K>(mut self, kinds: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<ErrorKind>,
    {
        self.retryable = kinds.into_iter().map(Into::into).collect();
        self
    }
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            timeout: Duration::from_secs(30),
            success_threshold: 2,
            half_open_max_calls: 3,
            retryable: HashSet::new(),
        }
    }
}

/// Timeout configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Deadline for a single execution
    #[serde(rename = "seconds", with = "secs")]
    pub duration: Duration,
    /// Abort the in-flight task when the deadline passes
    pub cancel_on_timeout: bool,
}

impl TimeoutConfig {
    /// Creates a cancelling timeout of `duration`
    pub fn new(duration: Duration) -> Self {
        Self {
            duration,
            cancel_on_timeout: true,
        }
    }

    /// Sets whether timed-out work is aborted
    pub fn with_cancel_on_timeout(mut self, cancel: bool) -> Self {
        self.cancel_on_timeout = cancel;
        self
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self::new(Duration::from_secs(30))
    }
}

/// Bulkhead configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BulkheadConfig {
    /// Maximum concurrent executions
    pub max_concurrent: usize,
    /// How long to wait for a slot; zero fails immediately when full
    #[serde(rename = "max_wait_seconds", with = "secs")]
    pub max_wait: Duration,
}

impl BulkheadConfig {
    /// Creates a non-waiting bulkhead of `max_concurrent` slots
    pub fn new(max_concurrent: usize) -> Self {
        Self {
            max_concurrent,
            max_wait: Duration::ZERO,
        }
    }

    /// Sets the slot wait
    pub fn with_max_wait(mut self, max_wait: Duration) -> Self {
        self.max_wait = max_wait;
        self
    }
}

impl Default for BulkheadConfig {
    fn default() -> Self {
        Self::new(10)
    }
}

/// Rate limiter configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Admissions allowed per window
    pub calls: usize,
    /// Length of the sliding window
    #[serde(rename = "period_seconds", with = "secs")]
    pub period: Duration,
}

impl RateLimitConfig {
    /// Creates a new configuration
    pub fn new(calls: usize, period: Duration) -> Self {
        Self { calls, period }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self::new(100, Duration::from_secs(60))
    }
}

/// (De)serializes a `Duration` as fractional seconds
mod secs {
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(value.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let seconds = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(seconds)
            .map_err(|_| D::Error::custom(format!("invalid duration: {seconds} seconds")))
    }
}
