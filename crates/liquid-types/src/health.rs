//! Health check types
//!
//! Services register health checks with the health registry; a deployment
//! waits on a set of (service, check) pairs until all of them pass.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Required checks per service name.
///
/// Ordered so that log output and error reports are stable.
pub type HealthChecks = BTreeMap<String, Vec<String>>;

/// One health check of one service
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct HealthCheckKey {
    pub service: String,
    pub check: String,
}

impl HealthCheckKey {
    pub fn new(service: impl Into<String>, check: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            check: check.into(),
        }
    }
}

impl fmt::Display for HealthCheckKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.service, self.check)
    }
}

/// Status of a health check within one poll
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Passing,
    Warning,
    Critical,
    /// Declared but absent from the registry's report.
    Missing,
    /// Reported more than once with conflicting statuses.
    Ambiguous,
}

impl HealthStatus {
    /// Map a status string reported by the registry.
    ///
    /// Anything the registry reports other than passing or warning (for
    /// example maintenance mode) counts as critical.
    pub fn from_registry(status: &str) -> Self {
        match status {
            "passing" => Self::Passing,
            "warning" => Self::Warning,
            _ => Self::Critical,
        }
    }

    pub fn is_passing(&self) -> bool {
        matches!(self, Self::Passing)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Passing => "passing",
            Self::Warning => "warning",
            Self::Critical => "critical",
            Self::Missing => "missing",
            Self::Ambiguous => "ambiguous",
        }
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A check as reported by the health registry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckReport {
    pub name: String,
    pub status: HealthStatus,
}

impl CheckReport {
    pub fn new(name: impl Into<String>, status: HealthStatus) -> Self {
        Self {
            name: name.into(),
            status,
        }
    }
}
