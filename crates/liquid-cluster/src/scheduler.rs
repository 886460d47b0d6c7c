//! Job scheduler interface

use crate::error::ClusterResult;
use async_trait::async_trait;
use liquid_types::{Allocation, JobSpec, JobSummary, ResourceRequirement};

/// The cluster-wide job scheduler
///
/// Submitting a job is idempotent on the scheduler side: running an unchanged
/// spec again is a no-op, which is what makes a whole deployment re-runnable.
#[async_trait]
pub trait JobScheduler: Send + Sync {
    /// Parse rendered job template text into the scheduler's job form.
    async fn parse(&self, template: &str) -> ClusterResult<JobSpec>;

    /// Submit (or resubmit) a job.
    async fn run(&self, spec: &JobSpec) -> ClusterResult<()>;

    /// Stop a job by name.
    async fn stop(&self, job: &str) -> ClusterResult<()>;

    /// List all jobs known to the scheduler.
    async fn list_jobs(&self) -> ClusterResult<Vec<JobSummary>>;

    /// List the allocations of a job.
    async fn job_allocations(&self, job: &str) -> ClusterResult<Vec<Allocation>>;

    /// Address of the scheduler agent this client talks to.
    async fn address(&self) -> ClusterResult<String>;

    /// Garbage-collect dead jobs and allocations.
    async fn gc(&self) -> ClusterResult<()>;

    /// Resources requested by the tasks and task groups of a job.
    fn resource_requirements(&self, spec: &JobSpec) -> Vec<ResourceRequirement> {
        spec.resources()
    }
}
