//! Health waiting errors

use liquid_cluster::ClusterError;
use liquid_types::{HealthCheckKey, HealthStatus};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// A check that was not passing when a wait gave up
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedCheck {
    pub key: HealthCheckKey,
    pub status: HealthStatus,
}

impl fmt::Display for FailedCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.key, self.status)
    }
}

fn secs(elapsed: &Duration) -> f64 {
    elapsed.as_secs_f64()
}

fn describe(checks: &[FailedCheck]) -> String {
    checks
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Errors from waiting on health checks
#[derive(Debug, Error)]
pub enum HealthError {
    /// Checks never reached the required green streak
    #[error("checks failed after {:.2}s: {}", secs(.elapsed), describe(.failing))]
    ConvergenceTimeout {
        elapsed: Duration,
        failing: Vec<FailedCheck>,
    },

    /// The registry kept reporting conflicting statuses for the same check
    #[error(
        "checks reported twice with conflicting statuses after {:.2}s: {}; \
         halting and restarting the health registry may help",
        secs(.elapsed),
        describe(.checks)
    )]
    AmbiguousHealthReport {
        elapsed: Duration,
        checks: Vec<FailedCheck>,
    },

    /// The registry could not be queried
    #[error("health registry error: {0}")]
    Registry(#[from] ClusterError),
}

impl HealthError {
    /// Checks named by the error, if any.
    pub fn failing_checks(&self) -> &[FailedCheck] {
        match self {
            Self::ConvergenceTimeout { failing, .. } => failing,
            Self::AmbiguousHealthReport { checks, .. } => checks,
            Self::Registry(_) => &[],
        }
    }
}

/// Result type for health waiting
pub type HealthResult<T> = Result<T, HealthError>;
