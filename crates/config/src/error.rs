//! Error types for policy configuration

use std::path::PathBuf;
use thiserror::Error;

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors that can occur while loading, validating or saving policies
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read a policy file
    #[error("Failed to read policy file at {path}: {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to write a policy file
    #[error("Failed to write policy file at {path}: {source}")]
    WriteError {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Policy document is not valid TOML for the schema
    #[error("Failed to parse policy file{}: {source}", path_suffix(.path))]
    ParseError {
        path: Option<PathBuf>,
        source: toml::de::Error,
    },

    /// Failed to serialize policies
    #[error("Failed to serialize policies: {0}")]
    SerializeError(#[from] toml::ser::Error),

    /// Policy file contains invalid values
    #[error("Policy validation failed: {0}")]
    ValidationError(String),

    /// No policy registered under this name
    #[error("Unknown policy: {0}")]
    UnknownPolicy(String),

    /// Generic I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

fn path_suffix(path: &Option<PathBuf>) -> String {
    path.as_ref()
        .map(|p| format!(" at {}", p.display()))
        .unwrap_or_default()
}

impl From<Vec<ValidationError>> for ConfigError {
    fn from(errors: Vec<ValidationError>) -> Self {
        let joined = errors
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ");
        Self::ValidationError(joined)
    }
}

/// Validation error for a specific policy field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Path to the field (e.g., "policies.payments.retry.max_attempts")
    pub field: String,

    /// Human-readable error message
    pub message: String,

    /// The invalid value, if available
    pub value: Option<String>,
}

impl ValidationError {
    /// Creates a new validation error
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            value: None,
        }
    }

    /// Creates a validation error with the invalid value
    pub fn with_value(
        field: impl Into<String>,
        message: impl Into<String>,
        value: impl ToString,
    ) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            value: Some(value.to_string()),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Field '{}': {}", self.field, self.message)?;
        if let Some(ref value) = self.value {
            write!(f, " (got: {})", value)?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_display() {
        let err = ValidationError::new("policies.db.retry.max_attempts", "must be at least 1");
        assert_eq!(
            err.to_string(),
            "Field 'policies.db.retry.max_attempts': must be at least 1"
        );
    }

    #[test]
    fn test_validation_error_with_value() {
        let err = ValidationError::with_value("policies.db.rate_limit.calls", "must be at least 1", 0);
        assert_eq!(
            err.to_string(),
            "Field 'policies.db.rate_limit.calls': must be at least 1 (got: 0)"
        );
    }

    #[test]
    fn test_validation_errors_join_into_config_error() {
        let err = ConfigError::from(vec![
            ValidationError::new("a", "bad"),
            ValidationError::new("b", "worse"),
        ]);
        assert_eq!(
            err.to_string(),
            "Policy validation failed: Field 'a': bad; Field 'b': worse"
        );
    }

    #[test]
    fn test_parse_error_without_path() {
        let source = toml::from_str::<toml::Table>("not = [valid").unwrap_err();
        let err = ConfigError::ParseError { path: None, source };
        assert!(err.to_string().starts_with("Failed to parse policy file: "));
    }
}
