//! Liquid Cluster - Collaborator clients
//!
//! Liquid does not implement a scheduler, a health registry or a secret
//! store; it drives existing ones. Every external system sits behind a narrow
//! trait so the orchestration logic can be exercised against in-memory
//! implementations:
//!
//! | Trait | Production implementation |
//! |---|---|
//! | [`JobScheduler`] | [`NomadClient`] (Nomad HTTP API) |
//! | [`HealthRegistry`], [`KeyValueStore`] | [`ConsulClient`] (Consul HTTP API) |
//! | [`SecretStore`] | [`VaultClient`] (Vault HTTP API, KV engine) |
//! | [`ContainerRuntime`] | [`DockerCli`] (the `docker` command) |
//! | [`SearchIndex`] | [`HooverSearch`] (management commands in the search task) |
//! | [`ResidualData`] | [`VolumeData`] (collection directories on disk) |
//!
//! The [`memory`] module holds the in-memory counterparts.

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]

pub mod consul;
pub mod containers;
pub mod data;
pub mod docker;
pub mod error;
pub mod hoover;
mod http;
pub mod memory;
pub mod nomad;
pub mod registry;
pub mod scheduler;
pub mod search;
pub mod secrets;
pub mod vault;
pub mod volumes;

// Re-exports
pub use consul::ConsulClient;
pub use containers::ContainerRuntime;
pub use data::ResidualData;
pub use docker::DockerCli;
pub use error::{ClusterError, ClusterResult};
pub use hoover::HooverSearch;
pub use nomad::NomadClient;
pub use registry::{HealthRegistry, KeyValueStore};
pub use scheduler::JobScheduler;
pub use search::SearchIndex;
pub use secrets::SecretStore;
pub use vault::VaultClient;
pub use volumes::VolumeData;
