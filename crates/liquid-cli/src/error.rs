//! CLI error types

use liquid_cluster::ClusterError;
use liquid_deployment::DeployError;
use thiserror::Error;

/// Errors that end a CLI command
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Deploy(#[from] DeployError),

    #[error(transparent)]
    Cluster(#[from] ClusterError),

    /// A named thing does not exist
    #[error("not found: {0}")]
    NotFound(String),

    /// Settings are missing something the command needs
    #[error("configuration error: {0}")]
    Config(String),

    /// The operator could not be asked, e.g. without a terminal
    #[error("confirmation prompt failed: {0}")]
    Prompt(#[from] dialoguer::Error),

    #[error("failed to render output: {0}")]
    Output(#[from] serde_json::Error),
}

/// Result type for CLI commands
pub type CliResult<T> = Result<T, CliError>;
