//! Shared JSON-over-HTTP plumbing for the Nomad, Consul and Vault clients

use crate::error::{ClusterError, ClusterResult};
use reqwest::header::HeaderMap;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;

pub(crate) struct ApiClient {
    client: Client,
    base_url: String,
    service: &'static str,
}

impl ApiClient {
    pub(crate) fn new(
        service: &'static str,
        base_url: &str,
        timeout: Duration,
        headers: HeaderMap,
    ) -> ClusterResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            service,
        })
    }

    pub(crate) fn service(&self) -> &'static str {
        self.service
    }

    #[cfg(test)]
    pub(crate) fn base_url(&self) -> &str {
        &self.base_url
    }

    pub(crate) fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        self.client.request(method, url)
    }

    /// Send and decode a JSON body.
    pub(crate) async fn json<T: DeserializeOwned>(&self, request: RequestBuilder) -> ClusterResult<T> {
        let response = self.checked(request.send().await?).await?;
        self.decode(response).await
    }

    /// Send and decode a JSON body, mapping 404 to `None`.
    pub(crate) async fn json_optional<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> ClusterResult<Option<T>> {
        let response = request.send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = self.checked(response).await?;
        self.decode(response).await.map(Some)
    }

    /// Send and ignore the response body.
    pub(crate) async fn send(&self, request: RequestBuilder) -> ClusterResult<()> {
        self.checked(request.send().await?).await?;
        Ok(())
    }

    async fn checked(&self, response: Response) -> ClusterResult<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(ClusterError::Status {
            service: self.service,
            status: status.as_u16(),
            body,
        })
    }

    async fn decode<T: DeserializeOwned>(&self, response: Response) -> ClusterResult<T> {
        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| ClusterError::decode(self.service, e))
    }
}
