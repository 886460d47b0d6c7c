//! Liquid Types - Core types for cluster deployment orchestration
//!
//! Liquid deploys a multi-service stack onto a Nomad cluster. The stack is
//! made of a core job, shared dependency jobs and one pair of jobs per tenant
//! collection. These types are shared by the collaborator clients, the
//! convergence waiter and the deployment sequencer.
//!
//! ## Key Concepts
//!
//! - **JobSpec**: A parsed scheduler job, with its declared health checks
//! - **HealthCheckKey / HealthStatus**: One (service, check) pair and its state
//! - **CollectionName**: A tenant collection and its job/task naming convention
//! - **SecretPath / SecretValue**: Secret store addressing and payloads
//! - **AuthApp**: An OAuth client registration against the core job
//!
//! Nothing in this crate performs I/O.

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]

pub mod auth;
pub mod health;
pub mod job;
pub mod names;
pub mod secret;

// Re-export main types
pub use auth::AuthApp;
pub use health::{CheckReport, HealthCheckKey, HealthChecks, HealthStatus};
pub use job::{
    Allocation, JobLayout, JobSpec, JobStatus, JobSummary, ResourceKind, ResourceRequirement,
    ServiceChecks,
};
pub use names::{CollectionJob, CollectionJobKind, CollectionName, NameError, SecretPath};
pub use secret::SecretValue;
