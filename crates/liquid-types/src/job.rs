//! Scheduler job types
//!
//! A [`JobSpec`] is the scheduler's own JSON form of a job, as returned by
//! parsing a rendered template. It is submitted back to the scheduler
//! verbatim; the typed [`JobLayout`] view is only read to find the declared
//! health checks and resource requirements.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A parsed scheduler job
#[derive(Debug, Clone, PartialEq)]
pub struct JobSpec {
    raw: serde_json::Value,
    layout: JobLayout,
}

impl JobSpec {
    /// Wrap a parsed job, reading its layout.
    pub fn from_json(raw: serde_json::Value) -> Result<Self, serde_json::Error> {
        let layout = JobLayout::deserialize(&raw)?;
        Ok(Self { raw, layout })
    }

    /// The job as the scheduler expects it on submission.
    pub fn as_json(&self) -> &serde_json::Value {
        &self.raw
    }

    pub fn id(&self) -> &str {
        &self.layout.id
    }

    pub fn layout(&self) -> &JobLayout {
        &self.layout
    }

    /// Health checks declared by every service in the job.
    ///
    /// Services are declared either on a task group or on a task. Services
    /// without any checks are still returned, with an empty list.
    pub fn health_checks(&self) -> Vec<ServiceChecks> {
        let mut result = Vec::new();

        for group in self.layout.task_groups.iter().flatten() {
            let group_services = group.services.iter().flatten();
            let task_services = group
                .tasks
                .iter()
                .flatten()
                .flat_map(|task| task.services.iter().flatten());

            for service in group_services.chain(task_services) {
                result.push(ServiceChecks {
                    service: service.name.clone(),
                    checks: service
                        .checks
                        .iter()
                        .flatten()
                        .map(|check| check.name.clone())
                        .collect(),
                });
            }
        }

        result
    }

    /// Resource requirements of every task and task group in the job.
    pub fn resources(&self) -> Vec<ResourceRequirement> {
        let mut result = Vec::new();

        for group in self.layout.task_groups.iter().flatten() {
            if let Some(disk) = &group.ephemeral_disk {
                result.push(ResourceRequirement {
                    owner: group.name.clone(),
                    kind: ResourceKind::Group,
                    resource: "EphemeralDiskMB".to_string(),
                    amount: disk.size_mb,
                });
            }

            for task in group.tasks.iter().flatten() {
                if let Some(resources) = &task.resources {
                    result.push(ResourceRequirement {
                        owner: task.name.clone(),
                        kind: ResourceKind::Task,
                        resource: "MemoryMB".to_string(),
                        amount: resources.memory_mb,
                    });
                    result.push(ResourceRequirement {
                        owner: task.name.clone(),
                        kind: ResourceKind::Task,
                        resource: "CPU".to_string(),
                        amount: resources.cpu,
                    });
                }
            }
        }

        result
    }
}

/// Typed view of the parts of a job this system reads
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct JobLayout {
    #[serde(rename = "ID")]
    pub id: String,
    #[serde(default)]
    pub task_groups: Option<Vec<TaskGroupLayout>>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TaskGroupLayout {
    pub name: String,
    #[serde(default)]
    pub services: Option<Vec<ServiceLayout>>,
    #[serde(default)]
    pub tasks: Option<Vec<TaskLayout>>,
    #[serde(default)]
    pub ephemeral_disk: Option<EphemeralDiskLayout>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TaskLayout {
    pub name: String,
    #[serde(default)]
    pub services: Option<Vec<ServiceLayout>>,
    #[serde(default)]
    pub resources: Option<ResourcesLayout>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ServiceLayout {
    pub name: String,
    #[serde(default)]
    pub checks: Option<Vec<CheckLayout>>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CheckLayout {
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ResourcesLayout {
    #[serde(rename = "CPU", default)]
    pub cpu: Option<u64>,
    #[serde(rename = "MemoryMB", default)]
    pub memory_mb: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct EphemeralDiskLayout {
    #[serde(rename = "SizeMB", default)]
    pub size_mb: Option<u64>,
}

/// Checks declared by one service of a job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceChecks {
    pub service: String,
    pub checks: Vec<String>,
}

/// What a resource requirement is attached to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceKind {
    Task,
    Group,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Task => f.write_str("task"),
            Self::Group => f.write_str("group"),
        }
    }
}

/// One resource amount required by a task or task group
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceRequirement {
    /// Task or task group name.
    pub owner: String,
    pub kind: ResourceKind,
    /// Scheduler resource name, e.g. `MemoryMB`.
    pub resource: String,
    /// `None` when the scheduler did not report an amount.
    pub amount: Option<u64>,
}

/// Scheduler-side job status
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Running,
    Dead,
    #[serde(other)]
    Unknown,
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => f.write_str("pending"),
            Self::Running => f.write_str("running"),
            Self::Dead => f.write_str("dead"),
            Self::Unknown => f.write_str("unknown"),
        }
    }
}

/// A job as listed by the scheduler
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSummary {
    pub id: String,
    pub status: JobStatus,
}

impl JobSummary {
    pub fn new(id: impl Into<String>, status: JobStatus) -> Self {
        Self {
            id: id.into(),
            status,
        }
    }
}

/// A placement of a job's task group on a client node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Allocation {
    pub id: String,
    pub client_status: String,
    pub task_group: String,
}

impl Allocation {
    pub fn is_running(&self) -> bool {
        self.client_status == "running"
    }
}
