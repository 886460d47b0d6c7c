//! Collaborator error types

use thiserror::Error;

/// Errors surfaced by any external system Liquid drives
#[derive(Debug, Error)]
pub enum ClusterError {
    /// HTTP transport failure
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-success HTTP status
    #[error("{service} returned {status}: {body}")]
    Status {
        service: &'static str,
        status: u16,
        body: String,
    },

    /// Response that could not be understood
    #[error("unexpected response from {service}: {reason}")]
    Decode {
        service: &'static str,
        reason: String,
    },

    /// External command exited unsuccessfully
    #[error("command `{command}` failed ({status}): {stderr}")]
    Command {
        command: String,
        status: String,
        stderr: String,
    },

    /// No container carries the requested task label
    #[error("no container found for task {0}")]
    NoContainer(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ClusterError {
    pub fn decode(service: &'static str, reason: impl ToString) -> Self {
        Self::Decode {
            service,
            reason: reason.to_string(),
        }
    }
}

/// Result type for collaborator operations
pub type ClusterResult<T> = Result<T, ClusterError>;
