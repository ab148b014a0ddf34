// crates/resilience/src/circuit_breaker.rs
//! Circuit breaker pattern implementation
//!
//! ```text
//! Closed   -> Open:     failure_count reaches failure_threshold
//! Open     -> HalfOpen: timeout elapsed since the last failure (checked lazily)
//! HalfOpen -> Closed:   success_count reaches success_threshold
//! HalfOpen -> Open:     any counted failure
//! ```
//!
//! The half-open admission counter caps the total number of probes per
//! half-open episode. It is never decremented when a probe finishes.

use crate::config::CircuitBreakerConfig;
use crate::error::{ResilienceError, ResilienceResult};
use crate::kind::matches_filter;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

/// Circuit breaker states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Circuit is closed, requests flow normally
    Closed,
    /// Circuit is open, requests are rejected
    Open,
    /// Circuit is half-open, testing if service recovered
    HalfOpen,
}

/// Point-in-time view of a breaker for external observers
#[derive(Debug, Clone, PartialEq)]
pub struct CircuitBreakerSnapshot {
    pub name: String,
    pub state: CircuitState,
    pub failure_count: usize,
    pub success_count: usize,
    pub half_open_admitted: usize,
    pub since_last_failure: Option<Duration>,
}

#[derive(Debug)]
struct CircuitBreakerState {
    state: CircuitState,
    failure_count: usize,
    success_count: usize,
    half_open_admitted: usize,
    last_failure_time: Option<Instant>,
}

impl CircuitBreakerState {
    fn new() -> Self {
        Self {
            state: CircuitState::Closed,
            failure_count: 0,
            success_count: 0,
            half_open_admitted: 0,
            last_failure_time: None,
        }
    }
}

/// Circuit breaker guarding one dependency
///
/// Cloning is cheap and shares state.
#[derive(Debug, Clone)]
pub struct CircuitBreaker {
    name: Arc<str>,
    config: CircuitBreakerConfig,
    state: Arc<Mutex<CircuitBreakerState>>,
}

impl CircuitBreaker {
    /// Creates a new circuit breaker
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self {
            name: Arc::from(name.into()),
            config,
            state: Arc::new(Mutex::new(CircuitBreakerState::new())),
        }
    }

    /// Returns the breaker name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the configuration
    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Gets the current state, moving Open to HalfOpen once the timeout has elapsed
    pub fn state(&self) -> CircuitState {
        let mut state = self.lock();
        self.refresh(&mut state);
        state.state
    }

    /// Returns counters and state for monitoring
    pub fn snapshot(&self) -> CircuitBreakerSnapshot {
        let mut state = self.lock();
        self.refresh(&mut state);
        CircuitBreakerSnapshot {
            name: self.name.to_string(),
            state: state.state,
            failure_count: state.failure_count,
            success_count: state.success_count,
            half_open_admitted: state.half_open_admitted,
            since_last_failure: state.last_failure_time.map(|t| t.elapsed()),
        }
    }

    /// Checks if a request can proceed, consuming a probe slot when half-open
    pub fn can_proceed(&self) -> ResilienceResult<()> {
        self.admit().map(|_| ())
    }

    /// Admits a call, returning true when it is a half-open probe
    fn admit(&self) -> ResilienceResult<bool> {
        let mut state = self.lock();
        self.refresh(&mut state);

        match state.state {
            CircuitState::Closed => Ok(false),
            CircuitState::HalfOpen => {
                if state.half_open_admitted >= self.config.half_open_max_calls {
                    log::debug!(
                        "circuit '{}' half-open budget of {} probes spent",
                        self.name,
                        self.config.half_open_max_calls
                    );
                    return Err(self.open_error(&state));
                }
                state.half_open_admitted += 1;
                Ok(true)
            }
            CircuitState::Open => Err(self.open_error(&state)),
        }
    }

    /// Records a successful operation
    pub fn record_success(&self) {
        let mut state = self.lock();
        match state.state {
            CircuitState::HalfOpen => {
                state.success_count += 1;
                if state.success_count >= self.config.success_threshold {
                    self.transition(&mut state, CircuitState::Closed);
                }
            }
            CircuitState::Closed => {
                state.failure_count = 0;
            }
            CircuitState::Open => {}
        }
    }

    /// Records a failed operation
    pub fn record_failure(&self) {
        let mut state = self.lock();
        state.failure_count += 1;
        state.last_failure_time = Some(Instant::now());

        match state.state {
            CircuitState::HalfOpen => self.transition(&mut state, CircuitState::Open),
            CircuitState::Closed if state.failure_count >= self.config.failure_threshold => {
                self.transition(&mut state, CircuitState::Open)
            }
            _ => {}
        }
    }

    /// Executes an operation through the circuit breaker
    ///
    /// Errors whose kind is outside the configured filter are returned
    /// without being counted. A half-open probe dropped before it finishes
    /// counts as a failure and reopens the circuit.
    pub async fn execute<F, Fut, T, E>(&self, operation: F) -> ResilienceResult<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Into<ResilienceError>,
    {
        let mut probe = ProbeGuard {
            breaker: self,
            armed: self.admit()?,
        };

        let outcome = operation().await;
        probe.armed = false;

        match outcome {
            Ok(value) => {
                self.record_success();
                Ok(value)
            }
            Err(e) => {
                let err = e.into();
                if matches_filter(&self.config.retryable, &err.kind()) {
                    self.record_failure();
                }
                Err(err)
            }
        }
    }

    /// Resets the circuit breaker to closed state
    pub fn reset(&self) {
        let mut state = self.lock();
        self.transition(&mut state, CircuitState::Closed);
        state.last_failure_time = None;
    }

    // Counter updates never panic, so a poisoned lock still holds consistent state.
    fn lock(&self) -> MutexGuard<'_, CircuitBreakerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn refresh(&self, state: &mut CircuitBreakerState) {
        if state.state != CircuitState::Open {
            return;
        }
        let elapsed = state
            .last_failure_time
            .map(|t| t.elapsed() >= self.config.timeout)
            .unwrap_or(true);
        if elapsed {
            self.transition(state, CircuitState::HalfOpen);
        }
    }

    fn transition(&self, state: &mut CircuitBreakerState, to: CircuitState) {
        let from = state.state;
        state.state = to;
        match to {
            CircuitState::Closed => {
                state.failure_count = 0;
                state.success_count = 0;
                state.half_open_admitted = 0;
            }
            CircuitState::HalfOpen | CircuitState::Open => {
                state.success_count = 0;
                state.half_open_admitted = 0;
            }
        }

        if from == to {
            return;
        }
        if to == CircuitState::Open {
            log::warn!(
                "circuit '{}' opened after {} failures",
                self.name,
                state.failure_count
            );
        } else {
            log::debug!("circuit '{}' {:?} -> {:?}", self.name, from, to);
        }
    }

    fn abandon_probe(&self) {
        let mut state = self.lock();
        if state.state != CircuitState::HalfOpen {
            return;
        }
        log::debug!("circuit '{}' probe dropped before completing", self.name);
        state.failure_count += 1;
        state.last_failure_time = Some(Instant::now());
        self.transition(&mut state, CircuitState::Open);
    }

    fn open_error(&self, state: &CircuitBreakerState) -> ResilienceError {
        ResilienceError::CircuitOpen {
            name: self.name.to_string(),
            failure_count: state.failure_count,
        }
    }
}

/// Reopens the circuit if an admitted probe is dropped mid-flight
struct ProbeGuard<'a> {
    breaker: &'a CircuitBreaker,
    armed: bool,
}

impl Drop for ProbeGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.breaker.abandon_probe();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kind::ErrorKind;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn breaker(failure_threshold: usize, timeout: Duration) -> CircuitBreaker {
        CircuitBreaker::new("test", CircuitBreakerConfig::new(failure_threshold, timeout))
    }

    #[test]
    fn test_circuit_breaker_initial_state() {
        let cb = CircuitBreaker::new("test", CircuitBreakerConfig::default());
        assert_eq!(cb.state(), CircuitState::Closed);
        assert_eq!(cb.name(), "test");
    }

    #[test]
    fn test_circuit_opens_after_threshold() {
        let cb = breaker(3, Duration::from_secs(1));

        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Closed);

        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Closed);

        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Open);
    }

    #[test]
    fn test_success_resets_failure_count_when_closed() {
        let cb = breaker(3, Duration::from_secs(1));

        cb.record_failure();
        cb.record_failure();
        cb.record_success();
        cb.record_failure();

        assert_eq!(cb.state(), CircuitState::Closed);
        assert_eq!(cb.snapshot().failure_count, 1);
    }

    #[test]
    fn test_circuit_rejects_when_open() {
        let cb = breaker(2, Duration::from_secs(10));

        cb.record_failure();
        cb.record_failure();

        let result = cb.can_proceed();
        assert!(matches!(
            result,
            Err(ResilienceError::CircuitOpen { failure_count: 2, .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_circuit_half_open_after_timeout() {
        let cb = breaker(2, Duration::from_millis(50));

        cb.record_failure();
        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Open);

        tokio::time::advance(Duration::from_millis(60)).await;

        assert_eq!(cb.state(), CircuitState::HalfOpen);
        assert!(cb.can_proceed().is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_circuit_closes_after_success_threshold() {
        let config = CircuitBreakerConfig::new(2, Duration::from_millis(50)).with_success_threshold(2);
        let cb = CircuitBreaker::new("test", config);

        cb.record_failure();
        cb.record_failure();
        tokio::time::advance(Duration::from_millis(60)).await;
        assert_eq!(cb.state(), CircuitState::HalfOpen);

        cb.record_success();
        assert_eq!(cb.state(), CircuitState::HalfOpen);

        cb.record_success();
        assert_eq!(cb.state(), CircuitState::Closed);

        let snapshot = cb.snapshot();
        assert_eq!(snapshot.failure_count, 0);
        assert_eq!(snapshot.success_count, 0);
        assert_eq!(snapshot.half_open_admitted, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_half_open_failure_reopens() {
        let cb = breaker(3, Duration::from_millis(50));
        for _ in 0..3 {
            cb.record_failure();
        }
        tokio::time::advance(Duration::from_millis(60)).await;
        assert_eq!(cb.state(), CircuitState::HalfOpen);

        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Open);
    }

    #[tokio::test(start_paused = true)]
    async fn test_half_open_admission_budget_is_total() {
        let config = CircuitBreakerConfig::new(1, Duration::from_millis(50))
            .with_success_threshold(10)
            .with_half_open_max_calls(2);
        let cb = CircuitBreaker::new("test", config);

        cb.record_failure();
        tokio::time::advance(Duration::from_millis(60)).await;

        for _ in 0..2 {
            let result = cb.execute(|| async { Ok::<_, ResilienceError>(()) }).await;
            assert!(result.is_ok());
        }

        // Both probes completed, yet the budget stays spent.
        assert_eq!(cb.state(), CircuitState::HalfOpen);
        let result = cb.execute(|| async { Ok::<_, ResilienceError>(()) }).await;
        assert!(matches!(result, Err(ResilienceError::CircuitOpen { .. })));
    }

    #[tokio::test]
    async fn test_execute_does_not_invoke_op_when_open() {
        let cb = breaker(1, Duration::from_secs(60));
        let calls = AtomicUsize::new(0);
        let calls = &calls;

        let _ = cb
            .execute(|| async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>("boom")
            })
            .await;
        let result = cb
            .execute(|| async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<_, ResilienceError>(())
            })
            .await;

        assert!(matches!(result, Err(ResilienceError::CircuitOpen { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_execute_returns_original_error() {
        let cb = CircuitBreaker::new("test", CircuitBreakerConfig::default());
        let result = cb.execute(|| async { Err::<i32, _>("disk full") }).await;

        match result {
            Err(err) => assert_eq!(err.to_string(), "disk full"),
            Ok(_) => panic!("expected failure"),
        }
        assert_eq!(cb.snapshot().failure_count, 1);
    }

    #[tokio::test]
    async fn test_unlisted_kinds_are_not_counted() {
        let config = CircuitBreakerConfig::new(1, Duration::from_secs(60)).with_retryable([ErrorKind::TIMEOUT]);
        let cb = CircuitBreaker::new("test", config);

        let result = cb
            .execute(|| async { Err::<(), _>(ResilienceError::classified("validation", "bad input")) })
            .await;
        assert!(result.is_err());
        assert_eq!(cb.state(), CircuitState::Closed);

        let _ = cb
            .execute(|| async {
                Err::<(), _>(ResilienceError::Timeout {
                    label: "probe".to_string(),
                    duration: Duration::from_millis(1),
                })
            })
            .await;
        assert_eq!(cb.state(), CircuitState::Open);
    }

    #[test]
    fn test_circuit_breaker_reset() {
        let cb = breaker(2, Duration::from_secs(1));

        cb.record_failure();
        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Open);

        cb.reset();
        assert_eq!(cb.state(), CircuitState::Closed);
        assert_eq!(cb.snapshot().since_last_failure, None);
    }

    #[test]
    fn test_clones_share_state() {
        let cb = breaker(1, Duration::from_secs(60));
        let other = cb.clone();

        other.record_failure();
        assert_eq!(cb.state(), CircuitState::Open);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_probe_reopens_circuit() {
        let config = CircuitBreakerConfig::new(1, Duration::from_millis(20))
            .with_success_threshold(1)
            .with_half_open_max_calls(1);
        let cb = CircuitBreaker::new("test", config);
        cb.record_failure();
        tokio::time::sleep(Duration::from_millis(25)).await;
        assert_eq!(cb.state(), CircuitState::HalfOpen);

        let abandoned = tokio::time::timeout(
            Duration::from_millis(10),
            cb.execute(|| async {
                tokio::time::sleep(Duration::from_secs(1)).await;
                Ok::<_, ResilienceError>(())
            }),
        )
        .await;
        assert!(abandoned.is_err());
        assert_eq!(cb.state(), CircuitState::Open);
        assert_eq!(cb.snapshot().half_open_admitted, 0);

        tokio::time::sleep(Duration::from_millis(25)).await;
        let result = cb.execute(|| async { Ok::<_, ResilienceError>(7) }).await;
        assert_eq!(result.ok(), Some(7));
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_call_while_closed_is_not_counted() {
        let cb = breaker(1, Duration::from_secs(60));

        let abandoned = tokio::time::timeout(
            Duration::from_millis(10),
            cb.execute(|| async {
                tokio::time::sleep(Duration::from_secs(1)).await;
                Ok::<_, ResilienceError>(())
            }),
        )
        .await;
        assert!(abandoned.is_err());
        assert_eq!(cb.state(), CircuitState::Closed);
        assert_eq!(cb.snapshot().failure_count, 0);
    }
}
