//! Nomad HTTP API client

use crate::error::{ClusterError, ClusterResult};
use crate::http::ApiClient;
use crate::scheduler::JobScheduler;
use async_trait::async_trait;
use liquid_types::{Allocation, JobSpec, JobStatus, JobSummary};
use reqwest::header::HeaderMap;
use reqwest::Method;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, instrument};

/// [`JobScheduler`] backed by a Nomad agent
pub struct NomadClient {
    api: ApiClient,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawJob {
    #[serde(rename = "ID")]
    id: String,
    status: JobStatus,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawAllocation {
    #[serde(rename = "ID")]
    id: String,
    client_status: String,
    task_group: String,
}

#[derive(Deserialize)]
struct AgentSelf {
    member: AgentMember,
}

#[derive(Deserialize)]
struct AgentMember {
    #[serde(rename = "Addr")]
    addr: String,
}

impl NomadClient {
    pub fn new(base_url: &str, timeout: Duration) -> ClusterResult<Self> {
        Ok(Self {
            api: ApiClient::new("nomad", base_url, timeout, HeaderMap::new())?,
        })
    }
}

#[async_trait]
impl JobScheduler for NomadClient {
    #[instrument(skip(self, template))]
    async fn parse(&self, template: &str) -> ClusterResult<JobSpec> {
        let request = self
            .api
            .request(Method::POST, "/v1/jobs/parse")
            .json(&json!({ "JobHCL": template, "Canonicalize": true }));

        let raw: serde_json::Value = self.api.json(request).await?;
        JobSpec::from_json(raw).map_err(|e| ClusterError::decode(self.api.service(), e))
    }

    #[instrument(skip(self, spec), fields(job = %spec.id()))]
    async fn run(&self, spec: &JobSpec) -> ClusterResult<()> {
        let request = self
            .api
            .request(Method::POST, "/v1/jobs")
            .json(&json!({ "Job": spec.as_json() }));

        self.api.send(request).await?;
        debug!(job = %spec.id(), "Job submitted");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn stop(&self, job: &str) -> ClusterResult<()> {
        let request = self.api.request(Method::DELETE, &format!("/v1/job/{}", job));
        self.api.send(request).await
    }

    async fn list_jobs(&self) -> ClusterResult<Vec<JobSummary>> {
        let request = self.api.request(Method::GET, "/v1/jobs");
        let jobs: Vec<RawJob> = self.api.json(request).await?;

        Ok(jobs
            .into_iter()
            .map(|job| JobSummary::new(job.id, job.status))
            .collect())
    }

    async fn job_allocations(&self, job: &str) -> ClusterResult<Vec<Allocation>> {
        let request = self
            .api
            .request(Method::GET, &format!("/v1/job/{}/allocations", job));
        let allocations: Option<Vec<RawAllocation>> = self.api.json_optional(request).await?;

        Ok(allocations
            .unwrap_or_default()
            .into_iter()
            .map(|alloc| Allocation {
                id: alloc.id,
                client_status: alloc.client_status,
                task_group: alloc.task_group,
            })
            .collect())
    }

    async fn address(&self) -> ClusterResult<String> {
        let request = self.api.request(Method::GET, "/v1/agent/self");
        let agent: AgentSelf = self.api.json(request).await?;
        Ok(agent.member.addr)
    }

    async fn gc(&self) -> ClusterResult<()> {
        let request = self.api.request(Method::PUT, "/v1/system/gc");
        self.api.send(request).await
    }
}
