//! Named pipelines built from a policy file

use crate::error::{ConfigError, ConfigResult};
use crate::policy::PolicyFile;
use breakwater_resilience::{CircuitBreakerSnapshot, Pipeline};
use std::collections::BTreeMap;
use std::path::Path;

/// Caller-owned set of pipelines, one per policy
///
/// Each policy gets its own executor instances. Clones of the registry
/// share them, so a breaker opened through one clone is open for all.
#[derive(Debug, Clone, Default)]
pub struct PolicyRegistry {
    pipelines: BTreeMap<String, Pipeline>,
}

impl PolicyRegistry {
    /// Validates `file` and builds a pipeline for every policy
    pub fn from_file(file: &PolicyFile) -> ConfigResult<Self> {
        file.validate()?;
        let pipelines = file
            .policies
            .iter()
            .map(|(name, policy)| {
                let pipeline = policy.build(name);
                log::debug!("Built policy '{}' with layers {:?}", name, pipeline.layers());
                (name.clone(), pipeline)
            })
            .collect();
        Ok(Self { pipelines })
    }

    /// Loads, validates and builds in one step
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        Self::from_file(&PolicyFile::load(path)?)
    }

    /// Returns the pipeline for `name`
    pub fn get(&self, name: &str) -> Option<&Pipeline> {
        self.pipelines.get(name)
    }

    /// Returns the pipeline for `name`, failing when it is not registered
    pub fn require(&self, name: &str) -> ConfigResult<&Pipeline> {
        self.get(name)
            .ok_or_else(|| ConfigError::UnknownPolicy(name.to_string()))
    }

    /// Adds or replaces a pipeline
    pub fn insert(&mut self, name: impl Into<String>, pipeline: Pipeline) -> Option<Pipeline> {
        self.pipelines.insert(name.into(), pipeline)
    }

    /// Registered policy names in sorted order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.pipelines.keys().map(String::as_str)
    }

    /// Number of registered policies
    pub fn len(&self) -> usize {
        self.pipelines.len()
    }

    /// Whether no policies are registered
    pub fn is_empty(&self) -> bool {
        self.pipelines.is_empty()
    }

    /// Point-in-time state of every policy's circuit breaker
    pub fn breaker_snapshots(&self) -> Vec<CircuitBreakerSnapshot> {
        self.pipelines
            .values()
            .filter_map(Pipeline::circuit_breaker)
            .map(|breaker| breaker.snapshot())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use breakwater_resilience::{CircuitState, LayerKind};

    fn registry(toml: &str) -> PolicyRegistry {
        let file = PolicyFile::from_toml_str(toml).expect("should parse");
        PolicyRegistry::from_file(&file).expect("should build")
    }

    #[test]
    fn test_builds_one_pipeline_per_policy() {
        let registry = registry(
            r#"
            [policies.db.retry]
            max_attempts = 2

            [policies.db.circuit_breaker]
            failure_threshold = 3

            [policies.search.bulkhead]
            max_concurrent = 4
            "#,
        );

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.names().collect::<Vec<_>>(), vec!["db", "search"]);
        assert_eq!(
            registry.get("db").map(Pipeline::layers),
            Some(vec![LayerKind::Retry, LayerKind::CircuitBreaker])
        );
        assert!(registry.get("missing").is_none());
    }

    #[test]
    fn test_require_unknown_policy() {
        let registry = PolicyRegistry::default();
        assert!(registry.is_empty());
        assert!(matches!(
            registry.require("payments"),
            Err(ConfigError::UnknownPolicy(name)) if name == "payments"
        ));
    }

    #[test]
    fn test_invalid_file_builds_nothing() {
        let file = PolicyFile::from_toml_str(
            r#"
            [policies.db.bulkhead]
            max_concurrent = 0
            "#,
        )
        .expect("should parse");
        assert!(matches!(
            PolicyRegistry::from_file(&file),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn test_breaker_snapshots_cover_breaker_policies() {
        let registry = registry(
            r#"
            [policies.db.circuit_breaker]
            failure_threshold = 1

            [policies.cache.timeout]
            seconds = 0.5
            "#,
        );

        let breaker = registry
            .get("db")
            .and_then(Pipeline::circuit_breaker)
            .expect("db breaker");
        breaker.record_failure();

        let snapshots = registry.breaker_snapshots();
        assert_eq!(snapshots.len(), 1);
        assert_eq!(snapshots[0].name, "db");
        assert_eq!(snapshots[0].state, CircuitState::Open);
    }
}
