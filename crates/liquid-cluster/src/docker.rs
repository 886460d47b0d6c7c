//! Container runtime backed by the local `docker` command

use crate::containers::ContainerRuntime;
use crate::error::{ClusterError, ClusterResult};
use async_trait::async_trait;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, instrument};

const TASK_LABEL: &str = "liquid_task";

/// [`ContainerRuntime`] that shells out to `docker`
pub struct DockerCli {
    program: String,
}

impl DockerCli {
    pub fn new() -> Self {
        Self::with_program("docker")
    }

    /// Use a different executable, e.g. a wrapper script.
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    async fn output(&self, args: &[&str]) -> ClusterResult<String> {
        debug!(program = %self.program, ?args, "Running container command");

        let output = Command::new(&self.program)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .await?;

        if !output.status.success() {
            return Err(ClusterError::Command {
                command: format!("{} {}", self.program, args.join(" ")),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    async fn first_container(&self, task: &str) -> ClusterResult<String> {
        self.find_containers(task)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| ClusterError::NoContainer(task.to_string()))
    }
}

impl Default for DockerCli {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ContainerRuntime for DockerCli {
    async fn find_containers(&self, task: &str) -> ClusterResult<Vec<String>> {
        let filter = format!("label={}={}", TASK_LABEL, task);
        let stdout = self.output(&["ps", "-q", "--filter", &filter]).await?;

        Ok(stdout
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect())
    }

    #[instrument(skip(self))]
    async fn exec(&self, task: &str, command: &[&str]) -> ClusterResult<String> {
        let container = self.first_container(task).await?;

        let mut args = vec!["exec", container.as_str()];
        args.extend_from_slice(command);
        self.output(&args).await
    }

    async fn shell(&self, task: &str, command: &[&str]) -> ClusterResult<()> {
        let container = self.first_container(task).await?;

        let mut args = vec!["exec", "-it", container.as_str()];
        if command.is_empty() {
            args.push("bash");
        } else {
            args.extend_from_slice(command);
        }

        let status = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .await?;

        if !status.success() {
            return Err(ClusterError::Command {
                command: format!("{} {}", self.program, args.join(" ")),
                status: status.to_string(),
                stderr: String::new(),
            });
        }

        Ok(())
    }
}
