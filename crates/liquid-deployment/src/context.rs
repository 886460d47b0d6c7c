//! Deployment Context - the configuration and collaborators of one run
//!
//! Built once at process start and handed to every component, so nothing
//! below it looks configuration up on its own.

use crate::auth_apps::AuthAppRegistrar;
use crate::collections::CollectionReconciler;
use crate::config::LiquidConfig;
use crate::render::TemplateRenderer;
use crate::secrets::SecretProvisioner;
use liquid_cluster::{
    ContainerRuntime, HealthRegistry, JobScheduler, KeyValueStore, ResidualData, SearchIndex,
    SecretStore,
};
use liquid_health::ConvergenceWaiter;
use std::sync::Arc;

/// Configuration plus one handle per external system
#[derive(Clone)]
pub struct DeploymentContext {
    pub config: Arc<LiquidConfig>,
    pub scheduler: Arc<dyn JobScheduler>,
    pub health: Arc<dyn HealthRegistry>,
    pub kv: Arc<dyn KeyValueStore>,
    pub secrets: Arc<dyn SecretStore>,
    pub containers: Arc<dyn ContainerRuntime>,
    pub search: Arc<dyn SearchIndex>,
    pub data: Arc<dyn ResidualData>,
    pub templates: Arc<dyn TemplateRenderer>,
}

impl DeploymentContext {
    /// Health waiter using the configured wait settings.
    pub fn waiter(&self) -> ConvergenceWaiter {
        ConvergenceWaiter::new(self.health.clone(), self.config.deploy.wait_config())
    }

    pub fn provisioner(&self) -> SecretProvisioner {
        SecretProvisioner::new(self.secrets.clone())
    }

    pub fn registrar(&self) -> AuthAppRegistrar {
        AuthAppRegistrar::new(self.containers.clone(), self.secrets.clone())
    }

    pub fn reconciler(&self) -> CollectionReconciler {
        CollectionReconciler::new(
            self.config.clone(),
            self.scheduler.clone(),
            self.containers.clone(),
            self.search.clone(),
            self.data.clone(),
        )
    }
}
