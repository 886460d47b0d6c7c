//! Vault HTTP API client
//!
//! Secrets live in a version 1 KV engine mounted at `liquid/`. Paths given to
//! this client already include the mount, e.g. `liquid/rocketchat/adminuser`.

use crate::error::{ClusterError, ClusterResult};
use crate::http::ApiClient;
use crate::secrets::SecretStore;
use async_trait::async_trait;
use liquid_types::{SecretPath, SecretValue};
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::Method;
use serde::Deserialize;
use serde_json::json;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::info;

const ENGINE_MOUNT: &str = "liquid";

/// [`SecretStore`] backed by a Vault server
pub struct VaultClient {
    api: ApiClient,
}

#[derive(Deserialize)]
struct SecretResponse {
    data: BTreeMap<String, serde_json::Value>,
}

#[derive(Deserialize)]
struct ListResponse {
    data: ListData,
}

#[derive(Deserialize)]
struct ListData {
    keys: Vec<String>,
}

impl VaultClient {
    pub fn new(base_url: &str, token: &str, timeout: Duration) -> ClusterResult<Self> {
        let mut headers = HeaderMap::new();
        let mut token = HeaderValue::from_str(token)
            .map_err(|e| ClusterError::decode("vault", format!("invalid token: {}", e)))?;
        token.set_sensitive(true);
        headers.insert("X-Vault-Token", token);

        Ok(Self {
            api: ApiClient::new("vault", base_url, timeout, headers)?,
        })
    }
}

#[async_trait]
impl SecretStore for VaultClient {
    async fn read(&self, path: &SecretPath) -> ClusterResult<Option<SecretValue>> {
        let request = self.api.request(Method::GET, &format!("/v1/{}", path));
        let response: Option<SecretResponse> = self.api.json_optional(request).await?;

        Ok(response.map(|secret| {
            secret
                .data
                .into_iter()
                .map(|(field, value)| {
                    let value = match value {
                        serde_json::Value::String(s) => s,
                        other => other.to_string(),
                    };
                    (field, value)
                })
                .collect()
        }))
    }

    async fn set(&self, path: &SecretPath, value: &SecretValue) -> ClusterResult<()> {
        let request = self
            .api
            .request(Method::PUT, &format!("/v1/{}", path))
            .json(value);
        self.api.send(request).await
    }

    async fn list(&self, prefix: &str) -> ClusterResult<Vec<String>> {
        let prefix = prefix.trim_end_matches('/');
        let request = self
            .api
            .request(Method::GET, &format!("/v1/{}", prefix))
            .query(&[("list", "true")]);
        let response: Option<ListResponse> = self.api.json_optional(request).await?;

        Ok(response.map(|r| r.data.keys).unwrap_or_default())
    }

    async fn ensure_engine(&self) -> ClusterResult<()> {
        let request = self.api.request(Method::GET, "/v1/sys/mounts");
        let mounts: serde_json::Value = self.api.json(request).await?;

        // Newer servers nest the mounts under "data" as well as at top level.
        let mount_key = format!("{}/", ENGINE_MOUNT);
        let present = mounts.get(&mount_key).is_some()
            || mounts
                .get("data")
                .and_then(|data| data.get(&mount_key))
                .is_some();

        if present {
            return Ok(());
        }

        info!(mount = ENGINE_MOUNT, "Enabling secret engine");
        let request = self
            .api
            .request(Method::POST, &format!("/v1/sys/mounts/{}", ENGINE_MOUNT))
            .json(&json!({ "type": "kv", "options": { "version": "1" } }));
        self.api.send(request).await
    }
}
