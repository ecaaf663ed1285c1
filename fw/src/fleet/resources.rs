//! Per-region shared resource cache
//!
//! Every region needs a cluster, a network-access rule, and a task template
//! before any service can be created in it. Each is looked up by well-known
//! name before being created, so a restarted process adopts what an earlier
//! run left behind.
//!
//! Two mutual-exclusion levels apply: a keyed mutex serializes setup per
//! region, and one global mutex serializes task-template creation across all
//! regions, because the platform throttles that call type aggressively when
//! issued concurrently. The global mutex wraps only the narrow template
//! find-or-create, never the whole region sequence, and no holder of it ever
//! waits on a region mutex.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::cloud::{CloudClient, CloudError};
use crate::retry::RetryExecutor;

/// Well-known names for shared resources
#[derive(Debug, Clone)]
pub struct ResourceNames {
    pub cluster: String,
    pub network_rule: String,
    pub task_template: String,
    pub execution_identity: String,
}

impl Default for ResourceNames {
    fn default() -> Self {
        Self {
            cluster: "fleetwatch".to_string(),
            network_rule: "fleetwatch-egress".to_string(),
            task_template: "fleetwatch-proxy".to_string(),
            execution_identity: "fleetwatch-exec".to_string(),
        }
    }
}

/// Handles to one region's shared resources
#[derive(Debug, Clone)]
pub struct RegionResources {
    pub cluster: String,
    pub network_rule: String,
    pub task_template: String,
}

/// Lazily populated cache of region resource sets
pub struct ResourceCache {
    cloud: Arc<dyn CloudClient>,
    retry: RetryExecutor,
    names: ResourceNames,
    cache: Mutex<HashMap<String, Arc<RegionResources>>>,
    region_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
    template_lock: Mutex<()>,
}

impl ResourceCache {
    pub fn new(cloud: Arc<dyn CloudClient>, retry: RetryExecutor, names: ResourceNames) -> Self {
        Self {
            cloud,
            retry,
            names,
            cache: Mutex::new(HashMap::new()),
            region_locks: Mutex::new(HashMap::new()),
            template_lock: Mutex::new(()),
        }
    }

    /// Ensure a region's resources exist, creating whatever is missing
    ///
    /// Concurrent calls for the same region block on the region mutex and
    /// observe the cache once the first caller populates it. On failure the
    /// region is left uncached so a later call retries from scratch.
    pub async fn ensure(&self, region: &str) -> Result<Arc<RegionResources>, CloudError> {
        debug!(region, "ensure: called");
        let lock = self.region_lock(region).await;
        let _guard = lock.lock().await;

        if let Some(cached) = self.cache.lock().await.get(region).cloned() {
            debug!(region, "ensure: cache hit");
            return Ok(cached);
        }

        info!(region, "Setting up region resources");
        let cluster = self.ensure_cluster(region).await?;
        let network_rule = self.ensure_network_rule(region).await?;
        let task_template = {
            // One template creation system-wide at a time
            let _global = self.template_lock.lock().await;
            debug!(region, "ensure: holding global template lock");
            self.ensure_task_template(region).await?
        };

        let set = Arc::new(RegionResources {
            cluster,
            network_rule,
            task_template,
        });
        self.cache.lock().await.insert(region.to_string(), set.clone());
        info!(region, "Region resources ready");
        Ok(set)
    }

    /// Snapshot of all cached region resource sets
    pub async fn snapshot(&self) -> Vec<(String, Arc<RegionResources>)> {
        self.cache
            .lock()
            .await
            .iter()
            .map(|(region, set)| (region.clone(), set.clone()))
            .collect()
    }

    async fn region_lock(&self, region: &str) -> Arc<Mutex<()>> {
        let mut locks = self.region_locks.lock().await;
        locks
            .entry(region.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Describe-before-create: look the cluster up by name, create if absent
    async fn ensure_cluster(&self, region: &str) -> Result<String, CloudError> {
        let existing = self
            .retry
            .execute("describe-cluster", CloudError::is_transient, || {
                self.cloud.find_cluster(region, &self.names.cluster)
            })
            .await?;
        if let Some(id) = existing {
            debug!(region, %id, "ensure_cluster: reusing existing");
            return Ok(id);
        }

        let id = self
            .retry
            .execute("create-cluster", CloudError::is_transient, || {
                self.cloud.create_cluster(region, &self.names.cluster)
            })
            .await?;
        info!(region, %id, "Created cluster");
        Ok(id)
    }

    async fn ensure_network_rule(&self, region: &str) -> Result<String, CloudError> {
        let existing = self
            .retry
            .execute("describe-network-rule", CloudError::is_transient, || {
                self.cloud.find_network_rule(region, &self.names.network_rule)
            })
            .await?;
        if let Some(id) = existing {
            debug!(region, %id, "ensure_network_rule: reusing existing");
            return Ok(id);
        }

        let id = self
            .retry
            .execute("create-network-rule", CloudError::is_transient, || {
                self.cloud.create_network_rule(region, &self.names.network_rule)
            })
            .await?;
        info!(region, %id, "Created network rule");
        Ok(id)
    }

    /// Caller must hold the global template lock
    async fn ensure_task_template(&self, region: &str) -> Result<String, CloudError> {
        let existing = self
            .retry
            .execute("describe-task-template", CloudError::is_transient, || {
                self.cloud.find_task_template(region, &self.names.task_template)
            })
            .await?;
        if let Some(id) = existing {
            debug!(region, %id, "ensure_task_template: reusing existing");
            return Ok(id);
        }

        let id = self
            .retry
            .execute("create-task-template", CloudError::is_transient, || {
                self.cloud.create_task_template(region, &self.names.task_template)
            })
            .await?;
        info!(region, %id, "Created task template");
        Ok(id)
    }
}
