//! Policy file model and persistence
//!
//! A policy file maps names to executor stacks:
//!
//! ```toml
//! [policies.payments]
//! layers = ["retry", "timeout"]
//!
//! [policies.payments.retry]
//! max_attempts = 4
//!
//! [policies.payments.timeout]
//! seconds = 2.0
//! ```

use crate::error::{ConfigError, ConfigResult, ValidationError};
use crate::validation::{ConfigSection, Validator};
use breakwater_resilience::{
    BulkheadConfig, BulkheadExecutor, CircuitBreaker, CircuitBreakerConfig, LayerKind, Pipeline,
    RateLimitConfig, RateLimiter, RetryConfig, RetryExecutor, TimeoutConfig, TimeoutExecutor,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

/// Current policy file format version
pub const POLICY_FILE_VERSION: u32 = 1;

/// Layer order used when a policy does not list its layers
pub const DEFAULT_LAYER_ORDER: [LayerKind; 5] = [
    LayerKind::RateLimit,
    LayerKind::Bulkhead,
    LayerKind::Retry,
    LayerKind::CircuitBreaker,
    LayerKind::Timeout,
];

/// One named executor stack
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PolicyConfig {
    /// Explicit layer order, outermost first
    #[serde(skip_serializing_if = "Option::is_none")]
    pub layers: Option<Vec<LayerKind>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub rate_limit: Option<RateLimitConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub bulkhead: Option<BulkheadConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry: Option<RetryConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub circuit_breaker: Option<CircuitBreakerConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<TimeoutConfig>,
}

impl PolicyConfig {
    /// Layers this policy resolves to, outermost first
    ///
    /// A listed layer without a section uses that executor's defaults.
    pub fn resolved_layers(&self) -> Vec<LayerKind> {
        match &self.layers {
            Some(layers) => layers.clone(),
            None => DEFAULT_LAYER_ORDER
                .into_iter()
                .filter(|kind| self.has_section(*kind))
                .collect(),
        }
    }

    fn has_section(&self, kind: LayerKind) -> bool {
        match kind {
            LayerKind::RateLimit => self.rate_limit.is_some(),
            LayerKind::Bulkhead => self.bulkhead.is_some(),
            LayerKind::Retry => self.retry.is_some(),
            LayerKind::CircuitBreaker => self.circuit_breaker.is_some(),
            LayerKind::Timeout => self.timeout.is_some(),
        }
    }

    /// Validates every section and the layer list
    pub fn validate(&self, name: &str) -> Result<(), Vec<ValidationError>> {
        let path = format!("policies.{}", name);
        let mut errors = Vec::new();

        if let Err(e) = Validator::not_empty(name, "policies") {
            errors.push(e);
        }

        let layers = self.resolved_layers();
        if layers.is_empty() {
            errors.push(ValidationError::new(
                format!("{}.layers", path),
                "policy must configure at least one layer",
            ));
        }
        let mut seen = HashSet::new();
        for kind in &layers {
            if !seen.insert(*kind) {
                errors.push(ValidationError::with_value(
                    format!("{}.layers", path),
                    "layer listed more than once",
                    kind,
                ));
            }
        }

        let sections: [Option<&dyn ConfigSection>; 5] = [
            self.rate_limit.as_ref().map(|s| s as &dyn ConfigSection),
            self.bulkhead.as_ref().map(|s| s as &dyn ConfigSection),
            self.retry.as_ref().map(|s| s as &dyn ConfigSection),
            self.circuit_breaker.as_ref().map(|s| s as &dyn ConfigSection),
            self.timeout.as_ref().map(|s| s as &dyn ConfigSection),
        ];
        for section in sections.into_iter().flatten() {
            let section_path = format!("{}.{}", path, section.section_name());
            if let Err(mut section_errors) = section.validate(&section_path) {
                errors.append(&mut section_errors);
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Builds a fresh set of executors for this policy
    ///
    /// The circuit breaker is named after the policy and timeouts are
    /// reported under the policy name.
    pub fn build(&self, name: &str) -> Pipeline {
        let mut builder = Pipeline::builder();
        for kind in self.resolved_layers() {
            builder = match kind {
                LayerKind::RateLimit => builder.rate_limit(RateLimiter::new(
                    self.rate_limit.clone().unwrap_or_default(),
                )),
                LayerKind::Bulkhead => builder.bulkhead(BulkheadExecutor::new(
                    self.bulkhead.clone().unwrap_or_default(),
                )),
                LayerKind::Retry => {
                    builder.retry(RetryExecutor::new(self.retry.clone().unwrap_or_default()))
                }
                LayerKind::CircuitBreaker => builder.circuit_breaker(CircuitBreaker::new(
                    name,
                    self.circuit_breaker.clone().unwrap_or_default(),
                )),
                LayerKind::Timeout => builder.timeout(
                    TimeoutExecutor::new(self.timeout.clone().unwrap_or_default()),
                    name,
                ),
            };
        }
        builder.build()
    }
}

/// Root of a policy file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PolicyFile {
    /// Policy file format version
    pub version: u32,

    /// Policies by name
    pub policies: BTreeMap<String, PolicyConfig>,
}

impl Default for PolicyFile {
    fn default() -> Self {
        Self {
            version: POLICY_FILE_VERSION,
            policies: BTreeMap::new(),
        }
    }
}

impl PolicyFile {
    /// Parses a policy document without validating it
    pub fn from_toml_str(content: &str) -> ConfigResult<Self> {
        toml::from_str(content).map_err(|source| ConfigError::ParseError { path: None, source })
    }

    /// Reads and parses a policy file
    ///
    /// A missing file is an error; there is no implicit empty policy set.
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::ReadError {
            path: path.to_path_buf(),
            source,
        })?;
        let file: Self = toml::from_str(&content).map_err(|source| ConfigError::ParseError {
            path: Some(path.to_path_buf()),
            source,
        })?;
        log::debug!(
            "Loaded {} policies from {}",
            file.policies.len(),
            path.display()
        );
        Ok(file)
    }

    /// Validates every policy, collecting all field errors
    pub fn validate(&self) -> ConfigResult<()> {
        let mut errors = Vec::new();
        if self.version > POLICY_FILE_VERSION {
            errors.push(ValidationError::with_value(
                "version",
                format!("newer than supported version {}", POLICY_FILE_VERSION),
                self.version,
            ));
        }
        for (name, policy) in &self.policies {
            if let Err(mut policy_errors) = policy.validate(name) {
                errors.append(&mut policy_errors);
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors.into())
        }
    }

    /// Serializes the policies back to TOML
    pub fn to_toml_string(&self) -> ConfigResult<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Validates and atomically writes the file
    pub fn save(&self, path: impl AsRef<Path>) -> ConfigResult<()> {
        let path = path.as_ref();
        self.validate()?;
        let content = self.to_toml_string()?;

        let dir = match path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir)?;

        let mut temp_file = NamedTempFile::new_in(dir)?;
        temp_file.write_all(content.as_bytes())?;
        temp_file.flush()?;
        temp_file
            .persist(path)
            .map_err(|e| ConfigError::WriteError {
                path: path.to_path_buf(),
                source: e.error,
            })?;

        log::info!("Saved {} policies to {}", self.policies.len(), path.display());
        Ok(())
    }
}
