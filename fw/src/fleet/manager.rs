//! FleetManager - provisioning, validation, and teardown of proxy units
//!
//! Provisioning runs in two phases. Phase 1 submits create-service requests
//! in bounded chunks with a fixed inter-chunk delay so the platform's
//! creation-call budget is never burst through. Phase 2 polls readiness with
//! unbounded concurrency, because describe calls do not share that budget;
//! this lets workers start on the first ready unit while later units are
//! still coming up. Every ready unit is persisted immediately, so a crash
//! mid-batch loses at most the in-flight portion.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use eyre::{Result, eyre};
use futures::future::join_all;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, error, info, warn};
use uuid::Uuid;
use watchstore::FleetStateStore;

use crate::cloud::{CloudClient, CloudError, ServiceSpec, ServiceState};
use crate::retry::RetryExecutor;

use super::resources::{ResourceCache, ResourceNames};
use super::unit::ProxyUnit;

/// Configuration for the FleetManager
#[derive(Debug, Clone)]
pub struct FleetManagerConfig {
    /// Default region rotation for provisioning
    pub regions: Vec<String>,

    /// Concurrent create-service submissions per chunk
    pub submit_concurrency: usize,

    /// Delay between submission chunks
    pub chunk_delay: Duration,

    /// Hard deadline for a unit to become ready
    pub readiness_timeout: Duration,

    /// Interval between readiness polls
    pub readiness_poll_interval: Duration,

    /// Port the proxy container listens on
    pub proxy_port: u16,
}

impl Default for FleetManagerConfig {
    fn default() -> Self {
        Self {
            regions: vec![
                "us-east-1".to_string(),
                "us-west-2".to_string(),
                "eu-west-1".to_string(),
            ],
            submit_concurrency: 5,
            chunk_delay: Duration::from_secs(1),
            readiness_timeout: Duration::from_secs(300),
            readiness_poll_interval: Duration::from_secs(5),
            proxy_port: 3128,
        }
    }
}

/// A service whose creation was accepted, awaiting readiness
#[derive(Debug, Clone)]
struct Submission {
    region: String,
    service_id: String,
    created_at: DateTime<Utc>,
}

/// Owns the set of live proxy units
pub struct FleetManager {
    config: FleetManagerConfig,
    cloud: Arc<dyn CloudClient>,
    retry: RetryExecutor,
    resources: ResourceCache,
    names: ResourceNames,

    /// Live units; handed to the worker pool as a snapshot at startup
    units: RwLock<Vec<ProxyUnit>>,

    /// Single writer for the wholesale state-file rewrite
    store: Mutex<FleetStateStore>,

    /// Round-robin cursor over the region list
    region_cursor: AtomicUsize,

    /// Process-wide execution identity, created once and cached
    identity: Mutex<Option<String>>,
}

impl FleetManager {
    /// Create a new FleetManager
    pub fn new(
        config: FleetManagerConfig,
        cloud: Arc<dyn CloudClient>,
        store: FleetStateStore,
        names: ResourceNames,
    ) -> Self {
        debug!(
            regions = config.regions.len(),
            submit_concurrency = config.submit_concurrency,
            "FleetManager::new: called"
        );
        let retry = RetryExecutor::default();
        Self {
            resources: ResourceCache::new(cloud.clone(), retry.clone(), names.clone()),
            config,
            cloud,
            retry,
            names,
            units: RwLock::new(Vec::new()),
            store: Mutex::new(store),
            region_cursor: AtomicUsize::new(0),
            identity: Mutex::new(None),
        }
    }

    /// Load persisted units and validate each against live service state
    ///
    /// Units whose service is no longer active with a running replica are
    /// dropped and the persisted list rewritten. A validation error for one
    /// unit only removes that unit.
    pub async fn init(&self) -> Result<usize> {
        debug!("init: called");
        let records = self.store.lock().await.load()?;
        info!(count = records.len(), "Validating persisted fleet");

        let checks = join_all(records.into_iter().map(|record| async move {
            let state = self.cloud.describe_service(&record.region, &record.service_id).await;
            (record, state)
        }))
        .await;

        let mut valid = Vec::new();
        for (record, state) in checks {
            match state {
                Ok(ServiceState::Ready { .. }) => {
                    debug!(region = %record.region, service_id = %record.service_id, "init: unit healthy");
                    valid.push(ProxyUnit::from_record(record));
                }
                Ok(state) => {
                    warn!(
                        region = %record.region,
                        service_id = %record.service_id,
                        ?state,
                        "Dropping unit failing validation"
                    );
                }
                Err(e) => {
                    warn!(
                        region = %record.region,
                        service_id = %record.service_id,
                        error = %e,
                        "Dropping unit after validation error"
                    );
                }
            }
        }

        let count = valid.len();
        *self.units.write().await = valid;
        self.persist().await?;
        info!(count, "Fleet validated");
        Ok(count)
    }

    /// Snapshot of the live unit set
    pub async fn units(&self) -> Vec<ProxyUnit> {
        self.units.read().await.clone()
    }

    /// Provision a batch of units across regions
    ///
    /// Returns the successfully finalized units; `count - returned.len()` is
    /// the failure count, always reported in the summary log.
    pub async fn provision_batch(&self, count: usize, regions: Option<&[String]>) -> Result<Vec<ProxyUnit>> {
        debug!(count, ?regions, "provision_batch: called");
        let assignments = self.assign_regions(count, regions)?;
        info!(count, "Provisioning batch");

        // Phase 1: chunked submissions; a failure never blocks siblings
        let mut submissions = Vec::new();
        let chunks: Vec<&[String]> = assignments.chunks(self.config.submit_concurrency.max(1)).collect();
        let chunk_count = chunks.len();
        for (i, chunk) in chunks.into_iter().enumerate() {
            debug!(chunk = i + 1, chunk_count, size = chunk.len(), "provision_batch: submitting chunk");
            let results = join_all(chunk.iter().map(|region| self.submit(region))).await;
            for (region, result) in chunk.iter().zip(results) {
                match result {
                    Ok(submission) => submissions.push(submission),
                    Err(e) => {
                        error!(%region, error = %e, "Service request failed");
                    }
                }
            }
            if i + 1 < chunk_count {
                tokio::time::sleep(self.config.chunk_delay).await;
            }
        }

        // Phase 2: readiness polling, unbounded
        debug!(submitted = submissions.len(), "provision_batch: awaiting readiness");
        let results = join_all(submissions.into_iter().map(|submission| {
            let region = submission.region.clone();
            let service_id = submission.service_id.clone();
            async move {
                match self.await_ready(submission).await {
                    Ok(unit) => Some(unit),
                    Err(e) => {
                        error!(%region, %service_id, error = %e, "Unit failed to become ready");
                        None
                    }
                }
            }
        }))
        .await;

        let units: Vec<ProxyUnit> = results.into_iter().flatten().collect();
        info!(
            requested = count,
            provisioned = units.len(),
            failed = count - units.len(),
            "Provisioning batch complete"
        );
        Ok(units)
    }

    /// Provision a single unit, bypassing batch chunking
    pub async fn provision_one(&self, region: Option<&str>) -> Result<ProxyUnit> {
        debug!(?region, "provision_one: called");
        let region = match region {
            Some(r) => r.to_string(),
            None => self
                .assign_regions(1, None)?
                .into_iter()
                .next()
                .ok_or_else(|| eyre!("No regions available for provisioning"))?,
        };

        let submission = self.submit(&region).await?;
        self.await_ready(submission).await
    }

    /// Tear down one unit by its id (or service identifier)
    ///
    /// Deletion errors are logged, not thrown, so local state never drifts
    /// from a partially-deleted resource.
    pub async fn teardown_one(&self, id: &str) -> Result<Option<ProxyUnit>> {
        debug!(%id, "teardown_one: called");
        let unit = {
            let units = self.units.read().await;
            units.iter().find(|u| u.id() == id || u.service_id == id).cloned()
        };
        let Some(unit) = unit else {
            debug!(%id, "teardown_one: no matching unit");
            return Ok(None);
        };

        if let Err(e) = self.cloud.delete_service(&unit.region, &unit.service_id).await {
            warn!(
                region = %unit.region,
                service_id = %unit.service_id,
                error = %e,
                "Service delete failed; removing from fleet anyway"
            );
        }

        self.units.write().await.retain(|u| u.service_id != unit.service_id);
        self.persist().await?;
        info!(region = %unit.region, service_id = %unit.service_id, "Unit torn down");
        Ok(Some(unit))
    }

    /// Tear down every unit, then best-effort clean up shared resources
    pub async fn teardown_all(&self) -> Result<usize> {
        let snapshot = self.units.read().await.clone();
        info!(count = snapshot.len(), "Tearing down fleet");

        join_all(snapshot.iter().map(|unit| async move {
            if let Err(e) = self.cloud.delete_service(&unit.region, &unit.service_id).await {
                warn!(
                    region = %unit.region,
                    service_id = %unit.service_id,
                    error = %e,
                    "Service delete failed"
                );
            }
        }))
        .await;

        self.units.write().await.clear();
        self.persist().await?;

        // Shared resources are optional cleanup: other fleets may still
        // depend on them
        for (region, resources) in self.resources.snapshot().await {
            if let Err(e) = self.cloud.delete_network_rule(&region, &resources.network_rule).await {
                debug!(%region, error = %e, "Network rule cleanup skipped");
            }
        }
        if let Some(identity) = self.identity.lock().await.take() {
            if let Err(e) = self.cloud.delete_execution_identity(&identity).await {
                debug!(%identity, error = %e, "Execution identity cleanup skipped");
            }
        }

        info!(count = snapshot.len(), "Fleet teardown complete");
        Ok(snapshot.len())
    }

    /// Compute a region for each new unit by round-robin
    fn assign_regions(&self, count: usize, override_list: Option<&[String]>) -> Result<Vec<String>> {
        let list: &[String] = match override_list {
            Some(list) if !list.is_empty() => list,
            _ => &self.config.regions,
        };
        if list.is_empty() {
            return Err(eyre!("No regions available for provisioning"));
        }

        Ok((0..count)
            .map(|_| {
                let i = self.region_cursor.fetch_add(1, Ordering::SeqCst);
                list[i % list.len()].clone()
            })
            .collect())
    }

    /// Phase 1 for one unit: ensure shared resources, request the service
    async fn submit(&self, region: &str) -> Result<Submission, CloudError> {
        debug!(region, "submit: called");
        let resources = self.resources.ensure(region).await?;
        let identity = self.ensure_identity().await?;

        let created_at = Utc::now();
        let spec = ServiceSpec {
            name: format!("fleetwatch-{}", Uuid::now_v7().simple()),
            cluster: resources.cluster.clone(),
            task_template: resources.task_template.clone(),
            network_rule: resources.network_rule.clone(),
            execution_identity: identity,
        };

        let service_id = self
            .retry
            .execute("create-service", CloudError::is_transient, || {
                self.cloud.create_service(region, &spec)
            })
            .await?;

        info!(region, %service_id, "Service requested");
        Ok(Submission {
            region: region.to_string(),
            service_id,
            created_at,
        })
    }

    /// Phase 2 for one unit: poll until a running attachment appears
    ///
    /// The finalized unit is appended to persisted state before this
    /// returns, so a crash mid-batch loses at most the in-flight portion.
    async fn await_ready(&self, submission: Submission) -> Result<ProxyUnit> {
        debug!(region = %submission.region, service_id = %submission.service_id, "await_ready: called");
        let poll = async {
            loop {
                match self
                    .cloud
                    .describe_service(&submission.region, &submission.service_id)
                    .await
                {
                    Ok(ServiceState::Ready { address }) => return Ok(address),
                    Ok(ServiceState::Pending) => {
                        tokio::time::sleep(self.config.readiness_poll_interval).await;
                    }
                    Ok(ServiceState::Failed { reason }) => {
                        return Err(eyre!("Service reported failure: {reason}"));
                    }
                    Err(e) if e.is_transient() => {
                        debug!(service_id = %submission.service_id, error = %e, "await_ready: transient poll error");
                        tokio::time::sleep(self.config.readiness_poll_interval).await;
                    }
                    Err(e) => return Err(e.into()),
                }
            }
        };

        let address = tokio::time::timeout(self.config.readiness_timeout, poll)
            .await
            .map_err(|_| {
                eyre!(
                    "Service {} in {} not ready within {:?}",
                    submission.service_id,
                    submission.region,
                    self.config.readiness_timeout
                )
            })??;

        let unit = ProxyUnit::new(
            submission.region,
            submission.service_id,
            address,
            self.config.proxy_port,
            submission.created_at,
        );
        info!(region = %unit.region, endpoint = %unit.endpoint, "Unit ready");

        self.units.write().await.push(unit.clone());
        self.persist().await?;
        Ok(unit)
    }

    /// Find-or-create the shared execution identity, cached for the process
    async fn ensure_identity(&self) -> Result<String, CloudError> {
        let mut cached = self.identity.lock().await;
        if let Some(id) = cached.as_ref() {
            return Ok(id.clone());
        }

        let name = self.names.execution_identity.clone();
        let existing = self
            .retry
            .execute("describe-identity", CloudError::is_transient, || {
                self.cloud.find_execution_identity(&name)
            })
            .await?;
        let id = match existing {
            Some(id) => {
                debug!(%id, "ensure_identity: reusing existing");
                id
            }
            None => {
                let id = self
                    .retry
                    .execute("create-identity", CloudError::is_transient, || {
                        self.cloud.create_execution_identity(&name)
                    })
                    .await?;
                info!(%id, "Created execution identity");
                id
            }
        };

        *cached = Some(id.clone());
        Ok(id)
    }

    /// Rewrite the persisted state file from the in-memory unit set
    async fn persist(&self) -> Result<()> {
        let records: Vec<_> = self.units.read().await.iter().map(|u| u.to_record()).collect();
        let store = self.store.lock().await;
        store.save(&records)?;
        Ok(())
    }
}
