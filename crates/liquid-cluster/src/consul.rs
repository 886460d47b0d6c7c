//! Consul HTTP API client

use crate::error::ClusterResult;
use crate::http::ApiClient;
use crate::registry::{HealthRegistry, KeyValueStore};
use async_trait::async_trait;
use liquid_types::{CheckReport, HealthStatus};
use reqwest::header::HeaderMap;
use reqwest::Method;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

/// [`HealthRegistry`] and [`KeyValueStore`] backed by a Consul agent
pub struct ConsulClient {
    api: ApiClient,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawCheck {
    name: String,
    status: String,
}

impl ConsulClient {
    pub fn new(base_url: &str, timeout: Duration) -> ClusterResult<Self> {
        Ok(Self {
            api: ApiClient::new("consul", base_url, timeout, HeaderMap::new())?,
        })
    }
}

#[async_trait]
impl HealthRegistry for ConsulClient {
    async fn checks(&self, service: &str) -> ClusterResult<Vec<CheckReport>> {
        let request = self
            .api
            .request(Method::GET, &format!("/v1/health/checks/{}", service));
        let checks: Vec<RawCheck> = self.api.json(request).await?;

        Ok(checks
            .into_iter()
            .map(|c| CheckReport::new(c.name, HealthStatus::from_registry(&c.status)))
            .collect())
    }
}

#[async_trait]
impl KeyValueStore for ConsulClient {
    async fn set(&self, key: &str, value: &str) -> ClusterResult<()> {
        debug!(key, "Setting cluster configuration value");
        let request = self
            .api
            .request(Method::PUT, &format!("/v1/kv/{}", key))
            .body(value.to_string());
        self.api.send(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_string, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_checks_map_statuses() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/health/checks/hoover-search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                { "Name": "http", "Status": "passing", "ServiceName": "hoover-search" },
                { "Name": "ping", "Status": "critical", "ServiceName": "hoover-search" },
                { "Name": "disk", "Status": "maintenance", "ServiceName": "hoover-search" }
            ])))
            .mount(&server)
            .await;

        let consul = ConsulClient::new(&server.uri(), Duration::from_secs(5)).unwrap();
        let checks = consul.checks("hoover-search").await.unwrap();

        assert_eq!(
            checks,
            vec![
                CheckReport::new("http", HealthStatus::Passing),
                CheckReport::new("ping", HealthStatus::Critical),
                CheckReport::new("disk", HealthStatus::Critical),
            ]
        );
    }

    #[tokio::test]
    async fn test_kv_set_puts_raw_value() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/v1/kv/liquid_domain"))
            .and(body_string("liquid.example.org"))
            .respond_with(ResponseTemplate::new(200).set_body_string("true"))
            .expect(1)
            .mount(&server)
            .await;

        let consul = ConsulClient::new(&server.uri(), Duration::from_secs(5)).unwrap();
        consul.set("liquid_domain", "liquid.example.org").await.unwrap();
    }
}
