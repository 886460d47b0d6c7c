//! Container runtime interface

use crate::error::ClusterResult;
use async_trait::async_trait;

/// Runs commands inside the containers of running job tasks
///
/// Containers are selected by task name: every task container carries a
/// `liquid_task=<task>` label.
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Ids of the containers running a task.
    async fn find_containers(&self, task: &str) -> ClusterResult<Vec<String>>;

    /// Run a command in the first container of a task and return its stdout.
    async fn exec(&self, task: &str, command: &[&str]) -> ClusterResult<String>;

    /// Run an interactive command attached to the current terminal.
    async fn shell(&self, task: &str, command: &[&str]) -> ClusterResult<()>;
}
