//! Wiring of the production collaborators

use crate::error::{CliError, CliResult};
use liquid_cluster::{ConsulClient, DockerCli, HooverSearch, NomadClient, VaultClient, VolumeData};
use liquid_deployment::{DeploymentContext, FileTemplates, LiquidConfig};
use std::sync::Arc;

/// Environment variable consulted when the settings carry no Vault token.
pub const VAULT_TOKEN_ENV: &str = "VAULT_TOKEN";

fn vault_token(config: &LiquidConfig) -> CliResult<String> {
    config
        .cluster
        .vault_token
        .clone()
        .or_else(|| std::env::var(VAULT_TOKEN_ENV).ok())
        .filter(|token| !token.is_empty())
        .ok_or_else(|| {
            CliError::Config(format!(
                "no Vault token: set cluster.vault_token or {}",
                VAULT_TOKEN_ENV
            ))
        })
}

/// Build the deployment context against the real cluster.
pub fn connect(config: Arc<LiquidConfig>) -> CliResult<DeploymentContext> {
    let timeout = config.cluster.request_timeout();

    let consul = Arc::new(ConsulClient::new(&config.cluster.consul_url, timeout)?);
    let containers = Arc::new(DockerCli::new());

    Ok(DeploymentContext {
        scheduler: Arc::new(NomadClient::new(&config.cluster.nomad_url, timeout)?),
        health: consul.clone(),
        kv: consul,
        secrets: Arc::new(VaultClient::new(
            &config.cluster.vault_url,
            &vault_token(&config)?,
            timeout,
        )?),
        search: Arc::new(HooverSearch::new(containers.clone())),
        containers,
        data: Arc::new(VolumeData::new(&config.liquid.volumes)),
        templates: Arc::new(FileTemplates::new(config.liquid.templates.clone())),
        config,
    })
}
