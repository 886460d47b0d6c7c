//! Liquid Deployment - Bringing a Liquid node to its declared state
//!
//! Liquid deploys a fixed stack of services plus one set of jobs per
//! document collection onto a scheduler-managed cluster.
//!
//! ## Key Components
//!
//! - [`LiquidConfig`]: Settings loaded once at start and passed to every
//!   component
//! - [`Deployer`]: The ordered deploy sequence, halt and resource totals
//! - [`SecretProvisioner`]: Generates secrets the first time they are needed
//! - [`AuthAppRegistrar`]: Registers OAuth clients with the core job
//! - [`CollectionReconciler`]: Initializes, garbage-collects and purges
//!   collections
//! - [`DeploymentContext`]: The configuration and collaborators of one run

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]

pub mod auth_apps;
pub mod collections;
pub mod config;
pub mod context;
pub mod error;
pub mod preflight;
pub mod render;
pub mod resources;
pub mod secrets;
pub mod sequencer;

// Re-exports
pub use auth_apps::{core_auth_apps, AuthAppRegistrar};
pub use collections::{CollectionPlan, CollectionReconciler};
pub use config::{CollectionConfig, JobConfig, LiquidConfig};
pub use context::DeploymentContext;
pub use error::{DeployError, DeployResult};
pub use render::{FileTemplates, InMemoryTemplates, TemplateRenderer, TemplateVars};
pub use resources::ResourceTotals;
pub use secrets::{random_secret, SecretProvisioner};
pub use sequencer::{DeployOptions, DeployReport, Deployer};
