//! REST implementation of the cloud provisioning API
//!
//! Talks JSON to a configurable base URL with bearer-token auth. Resource
//! kinds map onto a conventional path layout (`/regions/{region}/clusters`,
//! `/identities`, ...); find operations filter by well-known name.

use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use super::{CloudClient, CloudError, ServiceSpec, ServiceState};
use crate::config::CloudConfig;

use async_trait::async_trait;

/// A created or listed resource
#[derive(Debug, Deserialize)]
struct ResourceRecord {
    id: String,
}

/// A name-filtered listing
#[derive(Debug, Deserialize)]
struct ResourceList {
    items: Vec<ResourceRecord>,
}

/// Wire shape of a service description
#[derive(Debug, Deserialize)]
struct ServiceDescription {
    status: String,
    #[serde(default)]
    failure_reason: Option<String>,
    #[serde(default)]
    attachments: Vec<Attachment>,
}

/// A service's network attachment
#[derive(Debug, Deserialize)]
struct Attachment {
    status: String,
    #[serde(default)]
    public_address: Option<String>,
}

/// HTTP client for the provisioning API
pub struct HttpCloudClient {
    http: Client,
    base_url: String,
    token: String,
}

impl HttpCloudClient {
    /// Create a client from configuration
    ///
    /// Reads the API token from the environment variable named in config.
    pub fn from_config(config: &CloudConfig) -> Result<Self, CloudError> {
        debug!(base_url = %config.base_url, "from_config: called");
        let token = std::env::var(&config.api_token_env).map_err(|_| {
            CloudError::MissingPrerequisite(format!("API token not set ({} environment variable)", config.api_token_env))
        })?;

        let http = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, CloudError> {
        let response = self
            .http
            .get(self.url(path))
            .bearer_auth(&self.token)
            .send()
            .await?;
        Self::parse(path, response).await
    }

    async fn post_json<T: DeserializeOwned>(&self, path: &str, body: &serde_json::Value) -> Result<T, CloudError> {
        let response = self
            .http
            .post(self.url(path))
            .bearer_auth(&self.token)
            .json(body)
            .send()
            .await?;
        Self::parse(path, response).await
    }

    async fn delete(&self, path: &str) -> Result<(), CloudError> {
        let response = self
            .http
            .delete(self.url(path))
            .bearer_auth(&self.token)
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    /// Map a response status to the error taxonomy, passing successes through
    async fn check(response: reqwest::Response) -> Result<reqwest::Response, CloudError> {
        let status = response.status();
        if status.as_u16() == 429 {
            return Err(CloudError::Throttled);
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(CloudError::Api {
                status: status.as_u16(),
                message,
            });
        }
        Ok(response)
    }

    async fn parse<T: DeserializeOwned>(path: &str, response: reqwest::Response) -> Result<T, CloudError> {
        let response = Self::check(response).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| CloudError::InvalidResponse(format!("{path}: {e}")))
    }

    /// Find a region-scoped resource by well-known name
    async fn find_named(&self, region: &str, kind: &str, name: &str) -> Result<Option<String>, CloudError> {
        debug!(region, kind, name, "find_named: called");
        let list: ResourceList = self
            .get_json(&format!("/regions/{region}/{kind}?name={name}"))
            .await?;
        Ok(list.items.into_iter().next().map(|r| r.id))
    }

    /// Create a region-scoped resource with a well-known name
    async fn create_named(&self, region: &str, kind: &str, name: &str) -> Result<String, CloudError> {
        debug!(region, kind, name, "create_named: called");
        let record: ResourceRecord = self
            .post_json(&format!("/regions/{region}/{kind}"), &serde_json::json!({ "name": name }))
            .await?;
        Ok(record.id)
    }
}

#[async_trait]
impl CloudClient for HttpCloudClient {
    async fn find_cluster(&self, region: &str, name: &str) -> Result<Option<String>, CloudError> {
        self.find_named(region, "clusters", name).await
    }

    async fn create_cluster(&self, region: &str, name: &str) -> Result<String, CloudError> {
        self.create_named(region, "clusters", name).await
    }

    async fn find_network_rule(&self, region: &str, name: &str) -> Result<Option<String>, CloudError> {
        self.find_named(region, "network-rules", name).await
    }

    async fn create_network_rule(&self, region: &str, name: &str) -> Result<String, CloudError> {
        self.create_named(region, "network-rules", name).await
    }

    async fn delete_network_rule(&self, region: &str, rule_id: &str) -> Result<(), CloudError> {
        self.delete(&format!("/regions/{region}/network-rules/{rule_id}")).await
    }

    async fn find_task_template(&self, region: &str, name: &str) -> Result<Option<String>, CloudError> {
        self.find_named(region, "task-templates", name).await
    }

    async fn create_task_template(&self, region: &str, name: &str) -> Result<String, CloudError> {
        self.create_named(region, "task-templates", name).await
    }

    async fn find_execution_identity(&self, name: &str) -> Result<Option<String>, CloudError> {
        debug!(name, "find_execution_identity: called");
        let list: ResourceList = self.get_json(&format!("/identities?name={name}")).await?;
        Ok(list.items.into_iter().next().map(|r| r.id))
    }

    async fn create_execution_identity(&self, name: &str) -> Result<String, CloudError> {
        debug!(name, "create_execution_identity: called");
        let record: ResourceRecord = self
            .post_json("/identities", &serde_json::json!({ "name": name }))
            .await?;
        Ok(record.id)
    }

    async fn delete_execution_identity(&self, identity_id: &str) -> Result<(), CloudError> {
        self.delete(&format!("/identities/{identity_id}")).await
    }

    async fn create_service(&self, region: &str, spec: &ServiceSpec) -> Result<String, CloudError> {
        debug!(region, name = %spec.name, "create_service: called");
        let body = serde_json::json!({
            "name": spec.name,
            "cluster": spec.cluster,
            "task-template": spec.task_template,
            "network-rule": spec.network_rule,
            "execution-identity": spec.execution_identity,
        });
        let record: ResourceRecord = self.post_json(&format!("/regions/{region}/services"), &body).await?;
        Ok(record.id)
    }

    async fn describe_service(&self, region: &str, service_id: &str) -> Result<ServiceState, CloudError> {
        debug!(region, service_id, "describe_service: called");
        let desc: ServiceDescription = self
            .get_json(&format!("/regions/{region}/services/{service_id}"))
            .await?;

        if desc.status == "FAILED" {
            let reason = desc.failure_reason.unwrap_or_else(|| "unspecified".to_string());
            return Ok(ServiceState::Failed { reason });
        }

        let running = desc
            .attachments
            .iter()
            .find(|a| a.status == "RUNNING" && a.public_address.is_some());

        match running {
            Some(attachment) => {
                // find() above guarantees the address is present
                let address = attachment
                    .public_address
                    .clone()
                    .ok_or_else(|| CloudError::InvalidResponse("running attachment without address".to_string()))?;
                Ok(ServiceState::Ready { address })
            }
            None => Ok(ServiceState::Pending),
        }
    }

    async fn delete_service(&self, region: &str, service_id: &str) -> Result<(), CloudError> {
        self.delete(&format!("/regions/{region}/services/{service_id}")).await
    }
}
