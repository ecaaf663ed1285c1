//! Fleet lifecycle: proxy units, region resources, provisioning, teardown

mod manager;
mod resources;
mod unit;

pub use manager::{FleetManager, FleetManagerConfig};
pub use resources::{RegionResources, ResourceCache, ResourceNames};
pub use unit::ProxyUnit;

#[cfg(test)]
pub(crate) mod testing {
    //! Mock cloud client shared by fleet tests

    use std::collections::{HashMap, HashSet};
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;

    use crate::cloud::{CloudClient, CloudError, ServiceSpec, ServiceState};

    /// In-memory cloud with per-operation call counters
    #[derive(Default)]
    pub struct MockCloud {
        pub cluster_creates: AtomicUsize,
        pub rule_creates: AtomicUsize,
        pub template_creates: AtomicUsize,
        pub identity_creates: AtomicUsize,
        pub service_creates: AtomicUsize,
        pub service_deletes: AtomicUsize,
        pub rule_deletes: AtomicUsize,
        pub identity_deletes: AtomicUsize,

        /// Peak concurrent task-template creations observed
        pub template_inflight_peak: AtomicUsize,
        pub template_inflight: AtomicUsize,

        /// Regions where create_service fails permanently
        pub fail_create_in: Mutex<HashSet<String>>,

        /// Service ids that describe as Failed
        pub fail_describe: Mutex<HashSet<String>>,

        /// Pending responses before a service turns Ready
        pub pending_polls: usize,

        /// Pad template creation so overlap windows are observable
        pub template_delay_ms: u64,

        /// Pretend the execution identity already exists
        pub preexisting_identity: bool,

        pub service_seq: AtomicUsize,
        pub addresses: Mutex<HashMap<String, String>>,
        pub describe_counts: Mutex<HashMap<String, usize>>,
    }

    impl MockCloud {
        pub fn fail_services_in(self, region: &str) -> Self {
            self.fail_create_in.lock().unwrap().insert(region.to_string());
            self
        }

        pub fn address_of(&self, service_id: &str) -> Option<String> {
            self.addresses.lock().unwrap().get(service_id).cloned()
        }
    }

    #[async_trait]
    impl CloudClient for MockCloud {
        async fn find_cluster(&self, _region: &str, _name: &str) -> Result<Option<String>, CloudError> {
            Ok(None)
        }

        async fn create_cluster(&self, region: &str, _name: &str) -> Result<String, CloudError> {
            self.cluster_creates.fetch_add(1, Ordering::SeqCst);
            Ok(format!("cluster-{region}"))
        }

        async fn find_network_rule(&self, _region: &str, _name: &str) -> Result<Option<String>, CloudError> {
            Ok(None)
        }

        async fn create_network_rule(&self, region: &str, _name: &str) -> Result<String, CloudError> {
            self.rule_creates.fetch_add(1, Ordering::SeqCst);
            Ok(format!("rule-{region}"))
        }

        async fn delete_network_rule(&self, _region: &str, _rule_id: &str) -> Result<(), CloudError> {
            self.rule_deletes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn find_task_template(&self, _region: &str, _name: &str) -> Result<Option<String>, CloudError> {
            Ok(None)
        }

        async fn create_task_template(&self, region: &str, _name: &str) -> Result<String, CloudError> {
            let inflight = self.template_inflight.fetch_add(1, Ordering::SeqCst) + 1;
            self.template_inflight_peak.fetch_max(inflight, Ordering::SeqCst);
            if self.template_delay_ms > 0 {
                tokio::time::sleep(Duration::from_millis(self.template_delay_ms)).await;
            }
            self.template_inflight.fetch_sub(1, Ordering::SeqCst);
            self.template_creates.fetch_add(1, Ordering::SeqCst);
            Ok(format!("template-{region}"))
        }

        async fn find_execution_identity(&self, _name: &str) -> Result<Option<String>, CloudError> {
            if self.preexisting_identity {
                Ok(Some("identity-existing".to_string()))
            } else {
                Ok(None)
            }
        }

        async fn create_execution_identity(&self, _name: &str) -> Result<String, CloudError> {
            self.identity_creates.fetch_add(1, Ordering::SeqCst);
            Ok("identity-1".to_string())
        }

        async fn delete_execution_identity(&self, _identity_id: &str) -> Result<(), CloudError> {
            self.identity_deletes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn create_service(&self, region: &str, _spec: &ServiceSpec) -> Result<String, CloudError> {
            if self.fail_create_in.lock().unwrap().contains(region) {
                return Err(CloudError::MissingPrerequisite(format!("no usable subnet in {region}")));
            }
            self.service_creates.fetch_add(1, Ordering::SeqCst);
            let n = self.service_seq.fetch_add(1, Ordering::SeqCst) + 1;
            let id = format!("svc-{n}");
            self.addresses
                .lock()
                .unwrap()
                .insert(id.clone(), format!("198.51.100.{n}"));
            Ok(id)
        }

        async fn describe_service(&self, _region: &str, service_id: &str) -> Result<ServiceState, CloudError> {
            if self.fail_describe.lock().unwrap().contains(service_id) {
                return Ok(ServiceState::Failed {
                    reason: "task exited".to_string(),
                });
            }

            let polls = {
                let mut counts = self.describe_counts.lock().unwrap();
                let entry = counts.entry(service_id.to_string()).or_insert(0);
                *entry += 1;
                *entry
            };
            if polls <= self.pending_polls {
                return Ok(ServiceState::Pending);
            }

            let address = self
                .addresses
                .lock()
                .unwrap()
                .get(service_id)
                .cloned()
                .unwrap_or_else(|| "198.51.100.250".to_string());
            Ok(ServiceState::Ready { address })
        }

        async fn delete_service(&self, _region: &str, _service_id: &str) -> Result<(), CloudError> {
            self.service_deletes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }
}
