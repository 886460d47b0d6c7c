//! OAuth client registration against the core job
//!
//! Applications authenticate their users through the core job. Each one needs
//! an OAuth client created inside the running core container; the returned
//! credentials are stored in the secret store for the application's job.

use crate::config::LiquidConfig;
use crate::error::{DeployError, DeployResult};
use liquid_cluster::{ContainerRuntime, SecretStore};
use liquid_types::{AuthApp, SecretValue};
use std::sync::Arc;
use tracing::{info, instrument};

/// Task running the core web application.
pub const CORE_TASK: &str = "liquid-core";

/// Auth apps every deployment registers, followed by those contributed by
/// the configured jobs.
pub fn core_auth_apps(config: &LiquidConfig) -> Vec<AuthApp> {
    let callback = |app: &str| format!("{}/__auth/callback", config.app_url(app));

    let mut apps = vec![
        AuthApp::new("authdemo", "liquid/authdemo/auth.oauth2", callback("authdemo")),
        AuthApp::new("hoover", "liquid/hoover/auth.oauth2", callback("hoover")),
        AuthApp::new("dokuwiki", "liquid/dokuwiki/auth.oauth2", callback("dokuwiki")),
        AuthApp::new(
            "rocketchat-authproxy",
            "liquid/rocketchat/auth.oauth2",
            callback("rocketchat"),
        ),
        AuthApp::new(
            "rocketchat-app",
            "liquid/rocketchat/app.oauth2",
            format!("{}/_oauth/liquid", config.app_url("rocketchat")),
        ),
        AuthApp::new("nextcloud", "liquid/nextcloud/auth.oauth2", callback("nextcloud")),
    ];

    for job in &config.jobs {
        apps.extend(job.core_auth_apps.iter().cloned());
    }
    apps
}

/// Parse the JSON object printed by the registration command.
fn parse_credentials(app: &str, stdout: &str) -> DeployResult<SecretValue> {
    let registration_error = |reason: String| DeployError::Registration {
        app: app.to_string(),
        reason,
    };

    let parsed: serde_json::Value =
        serde_json::from_str(stdout.trim()).map_err(|e| registration_error(e.to_string()))?;

    let object = parsed
        .as_object()
        .ok_or_else(|| registration_error("expected a JSON object".to_string()))?;

    Ok(object
        .iter()
        .map(|(field, value)| {
            let value = match value {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            (field.clone(), value)
        })
        .collect())
}

/// Registers auth apps inside the core container
pub struct AuthAppRegistrar {
    containers: Arc<dyn ContainerRuntime>,
    secrets: Arc<dyn SecretStore>,
}

impl AuthAppRegistrar {
    pub fn new(containers: Arc<dyn ContainerRuntime>, secrets: Arc<dyn SecretStore>) -> Self {
        Self {
            containers,
            secrets,
        }
    }

    /// Register one app and store its credentials.
    #[instrument(skip(self, app), fields(app = %app.name))]
    pub async fn register(&self, app: &AuthApp) -> DeployResult<()> {
        info!(app = %app.name, callback = %app.callback, "Registering auth app");

        let stdout = self
            .containers
            .exec(
                CORE_TASK,
                &[
                    "./manage.py",
                    "createoauth2app",
                    app.name.as_str(),
                    app.callback.as_str(),
                ],
            )
            .await?;

        let credentials = parse_credentials(&app.name, &stdout)?;
        self.secrets.set(&app.vault_path, &credentials).await?;
        Ok(())
    }

    /// Register every app whose credentials are not stored yet.
    ///
    /// With `force`, apps are registered again even when credentials exist.
    /// Returns the names of the registered apps.
    pub async fn register_all(&self, apps: &[AuthApp], force: bool) -> DeployResult<Vec<String>> {
        let mut registered = Vec::new();

        for app in apps {
            if !force && self.secrets.read(&app.vault_path).await?.is_some() {
                info!(app = %app.name, path = %app.vault_path, "Auth app already registered");
                continue;
            }
            self.register(app).await?;
            registered.push(app.name.clone());
        }

        Ok(registered)
    }
}
