// crates/resilience/src/kind.rs
//! Error classification tags used by retry, breaker and fallback filters

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::HashSet;
use std::fmt;

/// A string tag classifying a failure
///
/// Built-in kinds cover the executors' own rejections. Callers tag their
/// operation errors with any other name (e.g. `"connection_reset"`) through
/// [`ResilienceError::classified`](crate::ResilienceError::classified).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ErrorKind(Cow<'static, str>);

impl ErrorKind {
    /// Operation exceeded its deadline
    pub const TIMEOUT: ErrorKind = ErrorKind::from_static("timeout");
    /// Circuit breaker refused admission
    pub const CIRCUIT_OPEN: ErrorKind = ErrorKind::from_static("circuit_open");
    /// Bulkhead had no free slot
    pub const BULKHEAD_FULL: ErrorKind = ErrorKind::from_static("bulkhead_full");
    /// Rate limiter refused admission
    pub const RATE_LIMITED: ErrorKind = ErrorKind::from_static("rate_limited");
    /// Every retry attempt failed
    pub const RETRY_EXHAUSTED: ErrorKind = ErrorKind::from_static("retry_exhausted");
    /// A timed task was cancelled from outside
    pub const CANCELLED: ErrorKind = ErrorKind::from_static("cancelled");
    /// I/O failure reported by the operation
    pub const IO: ErrorKind = ErrorKind::from_static("io");
    /// Unclassified operation failure
    pub const OPERATION: ErrorKind = ErrorKind::from_static("operation");

    /// Creates a kind from a static name
    pub const fn from_static(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }

    /// Creates a kind from any name
    pub fn new(name: impl Into<String>) -> Self {
        Self(Cow::Owned(name.into()))
    }

    /// Returns the tag name
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&'static str> for ErrorKind {
    fn from(name: &'static str) -> Self {
        Self::from_static(name)
    }
}

/// Returns true when `kind` passes a filter; an empty filter matches everything
pub(crate) fn matches_filter(filter: &HashSet<ErrorKind>, kind: &ErrorKind) -> bool {
    filter.is_empty() || filter.contains(kind)
}
