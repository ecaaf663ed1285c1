//! Cloud provisioning API seam
//!
//! The fleet manager talks to the compute platform exclusively through the
//! [`CloudClient`] trait: clusters, task templates, network rules, execution
//! identities, and services. Any platform offering equivalent primitives is
//! substitutable; [`HttpCloudClient`] is the shipped REST implementation.

mod error;
mod http;

use async_trait::async_trait;

pub use error::CloudError;
pub use http::HttpCloudClient;

/// Observed state of a provisioned service
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceState {
    /// Active with a running network attachment and resolved public address
    Ready { address: String },

    /// Still provisioning; poll again later
    Pending,

    /// The platform reports the service cannot come up
    Failed { reason: String },
}

/// Everything needed to create one proxy service
#[derive(Debug, Clone)]
pub struct ServiceSpec {
    /// Service name, unique within the region
    pub name: String,

    /// Cluster the service runs in
    pub cluster: String,

    /// Task template describing the proxy container
    pub task_template: String,

    /// Network-access rule granting egress
    pub network_rule: String,

    /// Execution identity the platform runs the task as
    pub execution_identity: String,
}

/// Capability set required from the compute platform
///
/// Find operations look resources up by well-known name and return `None`
/// when absent, enabling the describe-before-create pattern that survives
/// process restarts.
#[async_trait]
pub trait CloudClient: Send + Sync {
    async fn find_cluster(&self, region: &str, name: &str) -> Result<Option<String>, CloudError>;
    async fn create_cluster(&self, region: &str, name: &str) -> Result<String, CloudError>;

    async fn find_network_rule(&self, region: &str, name: &str) -> Result<Option<String>, CloudError>;
    async fn create_network_rule(&self, region: &str, name: &str) -> Result<String, CloudError>;
    async fn delete_network_rule(&self, region: &str, rule_id: &str) -> Result<(), CloudError>;

    async fn find_task_template(&self, region: &str, name: &str) -> Result<Option<String>, CloudError>;
    async fn create_task_template(&self, region: &str, name: &str) -> Result<String, CloudError>;

    async fn find_execution_identity(&self, name: &str) -> Result<Option<String>, CloudError>;
    async fn create_execution_identity(&self, name: &str) -> Result<String, CloudError>;
    async fn delete_execution_identity(&self, identity_id: &str) -> Result<(), CloudError>;

    async fn create_service(&self, region: &str, spec: &ServiceSpec) -> Result<String, CloudError>;

    /// Describe a service, resolving the public address from its running
    /// network attachment when ready
    async fn describe_service(&self, region: &str, service_id: &str) -> Result<ServiceState, CloudError>;

    async fn delete_service(&self, region: &str, service_id: &str) -> Result<(), CloudError>;
}
