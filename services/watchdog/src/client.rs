//! HTTP compute provider client.
//!
//! Implements [`ComputeApi`] against the provider's REST surface:
//! - `GET /v1/instances?scope=&page_token=` for the paginated inventory
//! - `POST /v1/instances/{id}/stop` and `/start` for lifecycle requests
//! - `PATCH /v1/instances/{id}` with an update mask for label writes

use std::collections::HashMap;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use reqwest::Method;
use serde::Serialize;
use tracing::{debug, error};

use crate::compute::{ComputeApi, InstancePage, Operation};
use crate::config::Config;

/// Compute provider API client.
pub struct HttpComputeClient {
    client: reqwest::Client,
    base_url: String,
    api_token: Option<String>,
}

impl HttpComputeClient {
    /// Create a new compute client.
    pub fn new(config: &Config) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            base_url: config.compute_endpoint.trim_end_matches('/').to_string(),
            api_token: config.api_token.clone(),
        }
    }

    fn request(&self, method: Method, url: &str) -> reqwest::RequestBuilder {
        let mut request = self.client.request(method, url);
        if let Some(token) = &self.api_token {
            request = request.bearer_auth(token);
        }
        request
    }
}

#[derive(Debug, Serialize)]
struct UpdateInstanceRequest {
    labels: HashMap<String, String>,
    update_mask: UpdateMask,
}

#[derive(Debug, Serialize)]
struct UpdateMask {
    paths: Vec<String>,
}

#[async_trait]
impl ComputeApi for HttpComputeClient {
    async fn list_instances(&self, scope: &str, page_token: Option<&str>) -> Result<InstancePage> {
        let url = format!("{}/v1/instances", self.base_url);
        let mut query: Vec<(&str, &str)> = vec![("scope", scope)];
        if let Some(token) = page_token {
            query.push(("page_token", token));
        }
        debug!(url = %url, scope = %scope, "Listing instances");

        let response = self.request(Method::GET, &url).query(&query).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!(status = %status, body = %body, "Failed to list instances");
            anyhow::bail!("Failed to list instances: {} - {}", status, body);
        }

        let page: InstancePage = response.json().await?;
        debug!(
            instance_count = page.instances.len(),
            has_next_page = page.next_page_token.is_some(),
            "Fetched instance page"
        );

        Ok(page)
    }

    async fn stop_instance(&self, id: &str) -> Result<Operation> {
        let url = format!("{}/v1/instances/{}/stop", self.base_url, id);
        debug!(instance_id = %id, "Submitting stop request");

        let response = self.request(Method::POST, &url).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!(instance_id = %id, status = %status, body = %body, "Failed to stop instance");
            anyhow::bail!("Failed to stop instance {}: {} - {}", id, status, body);
        }

        Ok(response.json().await?)
    }

    async fn start_instance(&self, id: &str) -> Result<Operation> {
        let url = format!("{}/v1/instances/{}/start", self.base_url, id);
        debug!(instance_id = %id, "Submitting start request");

        let response = self.request(Method::POST, &url).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!(instance_id = %id, status = %status, body = %body, "Failed to start instance");
            anyhow::bail!("Failed to start instance {}: {} - {}", id, status, body);
        }

        Ok(response.json().await?)
    }

    async fn update_labels(
        &self,
        id: &str,
        labels: HashMap<String, String>,
        paths: &[&str],
    ) -> Result<Operation> {
        let url = format!("{}/v1/instances/{}", self.base_url, id);
        let request = UpdateInstanceRequest {
            labels,
            update_mask: UpdateMask {
                paths: paths.iter().map(|path| path.to_string()).collect(),
            },
        };
        debug!(instance_id = %id, "Submitting label update");

        let response = self
            .request(Method::PATCH, &url)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!(instance_id = %id, status = %status, body = %body, "Failed to update instance labels");
            anyhow::bail!(
                "Failed to update labels on instance {}: {} - {}",
                id,
                status,
                body
            );
        }

        Ok(response.json().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_request_serialization() {
        let mut labels = HashMap::new();
        labels.insert("last-restarted".to_string(), "1754300000".to_string());
        let request = UpdateInstanceRequest {
            labels,
            update_mask: UpdateMask {
                paths: vec!["labels".to_string()],
            },
        };

        let json = serde_json::to_string(&request).unwrap();
        assert!(json.contains("\"labels\":{\"last-restarted\":\"1754300000\"}"));
        assert!(json.contains("\"update_mask\":{\"paths\":[\"labels\"]}"));
    }

    #[test]
    fn test_operation_deserialization_defaults_done() {
        let operation: Operation = serde_json::from_str(r#"{"id": "op-1"}"#).unwrap();
        assert_eq!(operation.id, "op-1");
        assert!(!operation.done);
    }
}
