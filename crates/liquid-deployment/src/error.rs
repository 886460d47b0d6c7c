//! Deployment error types

use liquid_cluster::ClusterError;
use liquid_health::HealthError;
use thiserror::Error;

/// Errors from deployment and collection operations
#[derive(Debug, Error)]
pub enum DeployError {
    /// Invalid or inconsistent configuration, or an operation the
    /// configuration does not allow
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Settings could not be loaded
    #[error("failed to load settings: {0}")]
    Settings(#[from] config::ConfigError),

    /// Stopped jobs did not die in time
    #[error("the following jobs are still running: {}", .jobs.join(", "))]
    JobTeardownTimeout { jobs: Vec<String> },

    /// An auth app registration returned something other than credentials
    #[error("registration of auth app {app} returned unusable output: {reason}")]
    Registration { app: String, reason: String },

    /// A job template could not be read
    #[error("template {template}: {reason}")]
    Template { template: String, reason: String },

    /// The host is not fit to run the stack
    #[error("system check failed: {0}")]
    Preflight(String),

    /// Health checks did not converge
    #[error(transparent)]
    Health(#[from] HealthError),

    /// A collaborator call failed
    #[error(transparent)]
    Cluster(#[from] ClusterError),
}

impl DeployError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }
}

/// Result type for deployment operations
pub type DeployResult<T> = Result<T, DeployError>;
