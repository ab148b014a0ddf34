//! Breakwater policy configuration
//!
//! Loads named resilience policies from TOML and turns each into a
//! [`Pipeline`](breakwater_resilience::Pipeline).
//!
//! # Architecture
//!
//! - **Sections**: each executor config implements [`ConfigSection`] for validation
//! - **All errors at once**: validation reports every bad field, not just the first
//! - **Atomic writes**: policy files are never left half-written
//! - **Caller-owned**: a [`PolicyRegistry`] is a plain value, there is no global state
//!
//! # Example
//!
//! ```rust
//! use breakwater_config::{PolicyFile, PolicyRegistry};
//!
//! let file = PolicyFile::from_toml_str(
//!     r#"
//!     [policies.catalog.retry]
//!     max_attempts = 3
//!
//!     [policies.catalog.timeout]
//!     seconds = 2.0
//!     "#,
//! )
//! .expect("valid TOML");
//!
//! let registry = PolicyRegistry::from_file(&file).expect("valid policies");
//! let catalog = registry.get("catalog").expect("catalog policy");
//! println!("catalog layers: {:?}", catalog.layers());
//! ```

mod error;
mod policy;
mod registry;
mod validation;

pub use error::{ConfigError, ConfigResult, ValidationError};
pub use policy::{PolicyConfig, PolicyFile, DEFAULT_LAYER_ORDER, POLICY_FILE_VERSION};
pub use registry::PolicyRegistry;
pub use validation::{ConfigSection, Validator, MAX_ATTEMPTS, MAX_CAPACITY, MAX_RETRY_DELAY};
