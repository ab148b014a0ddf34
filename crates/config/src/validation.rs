//! Validation system for policy values
//!
//! Each executor section implements [`ConfigSection`], reporting every bad
//! field under a dotted path so one pass surfaces all problems in a file.

pub use crate::error::ValidationError;
use breakwater_resilience::{
    BulkheadConfig, CircuitBreakerConfig, RateLimitConfig, RetryConfig, TimeoutConfig,
};
use std::time::Duration;

/// Upper bound for bulkhead slots and rate limit admissions
pub const MAX_CAPACITY: usize = 1_000_000;

/// Upper bound for retry attempts
pub const MAX_ATTEMPTS: usize = 100;

/// Upper bound for a single retry delay
pub const MAX_RETRY_DELAY: Duration = Duration::from_secs(24 * 60 * 60);

/// Trait for executor configuration sections that can validate themselves
pub trait ConfigSection {
    /// Validates the section, prefixing field names with `path`
    fn validate(&self, path: &str) -> Result<(), Vec<ValidationError>>;

    /// Returns the section name used in policy files
    fn section_name(&self) -> &'static str;
}

/// Common validators for policy values
pub struct Validator;

impl Validator {
    /// Validates that a numeric value is within a range
    pub fn in_range<T>(value: T, min: T, max: T, field: &str) -> Result<(), ValidationError>
    where
        T: PartialOrd + std::fmt::Display + Copy,
    {
        if !(min..=max).contains(&value) {
            Err(ValidationError::with_value(
                field,
                format!("must be between {} and {}", min, max),
                value,
            ))
        } else {
            Ok(())
        }
    }

    /// Validates that a count is at least one
    pub fn at_least_one(value: usize, field: &str) -> Result<(), ValidationError> {
        if value == 0 {
            Err(ValidationError::with_value(field, "must be at least 1", value))
        } else {
            Ok(())
        }
    }

    /// Validates that a duration is non-zero
    pub fn positive_duration(value: Duration, field: &str) -> Result<(), ValidationError> {
        if value.is_zero() {
            Err(ValidationError::new(field, "must be greater than zero"))
        } else {
            Ok(())
        }
    }

    /// Validates that a duration does not exceed `max`
    pub fn duration_at_most(
        value: Duration,
        max: Duration,
        field: &str,
    ) -> Result<(), ValidationError> {
        if value > max {
            Err(ValidationError::with_value(
                field,
                format!("must be at most {} seconds", max.as_secs_f64()),
                value.as_secs_f64(),
            ))
        } else {
            Ok(())
        }
    }

    /// Validates that a string is not empty
    pub fn not_empty(value: &str, field: &str) -> Result<(), ValidationError> {
        if value.trim().is_empty() {
            Err(ValidationError::new(field, "must not be empty"))
        } else {
            Ok(())
        }
    }

    /// Collects multiple validation results into a single result
    pub fn collect_errors(
        results: Vec<Result<(), ValidationError>>,
    ) -> Result<(), Vec<ValidationError>> {
        let errors: Vec<ValidationError> = results.into_iter().filter_map(|r| r.err()).collect();

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

fn field(path: &str, name: &str) -> String {
    format!("{}.{}", path, name)
}

impl ConfigSection for RetryConfig {
    fn validate(&self, path: &str) -> Result<(), Vec<ValidationError>> {
        let mut results = vec![
            Validator::in_range(self.max_attempts, 1, MAX_ATTEMPTS, &field(path, "max_attempts")),
            Validator::in_range(
                self.backoff_multiplier,
                1.0,
                10.0,
                &field(path, "backoff_multiplier"),
            ),
            Validator::duration_at_most(self.delay, MAX_RETRY_DELAY, &field(path, "delay_seconds")),
            Validator::duration_at_most(
                self.max_delay,
                MAX_RETRY_DELAY,
                &field(path, "max_delay_seconds"),
            ),
        ];
        if self.max_delay < self.delay {
            results.push(Err(ValidationError::with_value(
                field(path, "max_delay_seconds"),
                "must not be less than delay_seconds",
                self.max_delay.as_secs_f64(),
            )));
        }
        Validator::collect_errors(results)
    }

    fn section_name(&self) -> &'static str {
        "retry"
    }
}

impl ConfigSection for CircuitBreakerConfig {
    fn validate(&self, path: &str) -> Result<(), Vec<ValidationError>> {
        Validator::collect_errors(vec![
            Validator::at_least_one(self.failure_threshold, &field(path, "failure_threshold")),
            Validator::at_least_one(self.success_threshold, &field(path, "success_threshold")),
            Validator::at_least_one(self.half_open_max_calls, &field(path, "half_open_max_calls")),
            Validator::positive_duration(self.timeout, &field(path, "timeout_seconds")),
        ])
    }

    fn section_name(&self) -> &'static str {
        "circuit_breaker"
    }
}

impl ConfigSection for TimeoutConfig {
    fn validate(&self, path: &str) -> Result<(), Vec<ValidationError>> {
        Validator::collect_errors(vec![Validator::positive_duration(
            self.duration,
            &field(path, "seconds"),
        )])
    }

    fn section_name(&self) -> &'static str {
        "timeout"
    }
}

impl ConfigSection for BulkheadConfig {
    fn validate(&self, path: &str) -> Result<(), Vec<ValidationError>> {
        Validator::collect_errors(vec![Validator::in_range(
            self.max_concurrent,
            1,
            MAX_CAPACITY,
            &field(path, "max_concurrent"),
        )])
    }

    fn section_name(&self) -> &'static str {
        "bulkhead"
    }
}

impl ConfigSection for RateLimitConfig {
    fn validate(&self, path: &str) -> Result<(), Vec<ValidationError>> {
        Validator::collect_errors(vec![
            Validator::in_range(self.calls, 1, MAX_CAPACITY, &field(path, "calls")),
            Validator::positive_duration(self.period, &field(path, "period_seconds")),
        ])
    }

    fn section_name(&self) -> &'static str {
        "rate_limit"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_range_valid() {
        assert!(Validator::in_range(50, 0, 100, "test").is_ok());
        assert!(Validator::in_range(0, 0, 100, "test").is_ok());
        assert!(Validator::in_range(100, 0, 100, "test").is_ok());
    }

    #[test]
    fn test_in_range_invalid() {
        assert!(Validator::in_range(-1, 0, 100, "test").is_err());
        assert!(Validator::in_range(101, 0, 100, "test").is_err());
    }

    #[test]
    fn test_in_range_rejects_nan() {
        assert!(Validator::in_range(f64::NAN, 1.0, 10.0, "test").is_err());
    }

    #[test]
    fn test_retry_delays_are_bounded() {
        let config = RetryConfig::new(2)
            .with_delay(Duration::MAX)
            .with_max_delay(Duration::MAX);

        let errors = config.validate("r").unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(fields, vec!["r.delay_seconds", "r.max_delay_seconds"]);
        assert!(RetryConfig::new(2)
            .with_max_delay(MAX_RETRY_DELAY)
            .validate("r")
            .is_ok());
    }

    #[test]
    fn test_not_empty() {
        assert!(Validator::not_empty("payments", "test").is_ok());
        assert!(Validator::not_empty("   ", "test").is_err());
    }

    #[test]
    fn test_positive_duration() {
        assert!(Validator::positive_duration(Duration::from_millis(1), "test").is_ok());
        assert!(Validator::positive_duration(Duration::ZERO, "test").is_err());
    }

    #[test]
    fn test_collect_errors_some_err() {
        let results = vec![
            Ok(()),
            Err(ValidationError::new("field1", "error1")),
            Ok(()),
            Err(ValidationError::new("field2", "error2")),
        ];
        let result = Validator::collect_errors(results);
        assert_eq!(result.unwrap_err().len(), 2);
    }

    #[test]
    fn test_default_sections_are_valid() {
        assert!(RetryConfig::default().validate("retry").is_ok());
        assert!(CircuitBreakerConfig::default().validate("circuit_breaker").is_ok());
        assert!(TimeoutConfig::default().validate("timeout").is_ok());
        assert!(BulkheadConfig::default().validate("bulkhead").is_ok());
        assert!(RateLimitConfig::default().validate("rate_limit").is_ok());
    }

    #[test]
    fn test_retry_reports_every_bad_field() {
        let config = RetryConfig::new(0)
            .with_backoff_multiplier(0.5)
            .with_delay(Duration::from_secs(10))
            .with_max_delay(Duration::from_secs(1));

        let errors = config.validate("policies.db.retry").unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(
            fields,
            vec![
                "policies.db.retry.max_attempts",
                "policies.db.retry.backoff_multiplier",
                "policies.db.retry.max_delay_seconds",
            ]
        );
    }

    #[test]
    fn test_zero_thresholds_rejected() {
        let config = CircuitBreakerConfig::new(0, Duration::ZERO).with_half_open_max_calls(0);
        let errors = config.validate("cb").unwrap_err();
        assert_eq!(errors.len(), 3);
        assert_eq!(config.section_name(), "circuit_breaker");
    }

    #[test]
    fn test_rate_limit_needs_calls_and_period() {
        let errors = RateLimitConfig::new(0, Duration::ZERO)
            .validate("rl")
            .unwrap_err();
        assert_eq!(errors[0].field, "rl.calls");
        assert_eq!(errors[1].field, "rl.period_seconds");
    }
}
