//! WorkerPool - one persistent worker per proxy unit
//!
//! There is no shared task queue with implicit backpressure: each worker
//! drives its own pull loop, so saturation is continuous by construction. A
//! worker that frees up immediately asks the queue for its next target; no
//! central dispatcher ever needs to re-trigger anything.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::Utc;
use eyre::{Result, eyre};
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use watchstore::{Observation, ObservationStore};

use crate::events::EventBus;
use crate::fleet::ProxyUnit;
use crate::queue::{PriorityQueue, Tier};

use super::executor::{PageData, PageExecutor, ProbeOutcome};

/// Configuration for the WorkerPool
#[derive(Debug, Clone)]
pub struct WorkerPoolConfig {
    /// Delay between items on one worker
    pub item_delay: Duration,

    /// Sleep when the queue is momentarily empty
    pub idle_delay: Duration,

    /// Page executor timeout; expiry means NoData, not an error
    pub executor_timeout: Duration,
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self {
            item_delay: Duration::from_millis(500),
            idle_delay: Duration::from_secs(1),
            executor_timeout: Duration::from_secs(30),
        }
    }
}

/// Read-only view of one worker's state
#[derive(Debug, Clone, serde::Serialize)]
pub struct WorkerSnapshot {
    pub worker_id: usize,
    pub unit_id: String,
    pub region: String,
    pub busy: bool,
    pub current: Option<String>,
}

/// Worker-owned state, snapshot-readable for status reporting
#[derive(Default)]
struct WorkerCell {
    busy: AtomicBool,
    current: Mutex<Option<String>>,
}

/// The pool of workers, one per usable proxy unit
pub struct WorkerPool {
    config: WorkerPoolConfig,
    queue: Arc<PriorityQueue>,
    executor: Arc<dyn PageExecutor>,
    observations: Arc<Mutex<ObservationStore>>,
    bus: Arc<EventBus>,
    workers: Vec<(usize, ProxyUnit, Arc<WorkerCell>)>,
    tasks: Vec<JoinHandle<()>>,
    stop_tx: watch::Sender<bool>,
}

impl WorkerPool {
    /// Create a pool over the given units
    ///
    /// Worker count is `min(targets, units)`: excess units idle
    /// rather than over-provisioning workers, excess targets just mean each
    /// unit gets revisited more often. Zero units or zero targets is fatal.
    pub fn new(
        config: WorkerPoolConfig,
        units: Vec<ProxyUnit>,
        queue: Arc<PriorityQueue>,
        executor: Arc<dyn PageExecutor>,
        observations: ObservationStore,
        bus: Arc<EventBus>,
    ) -> Result<Self> {
        if units.is_empty() {
            return Err(eyre!("No proxy units available; cannot start worker pool"));
        }
        if queue.is_empty() {
            return Err(eyre!("No targets to watch"));
        }

        let count = queue.len().min(units.len());
        debug!(
            units = units.len(),
            targets = queue.len(),
            workers = count,
            "WorkerPool::new: called"
        );
        let workers = units
            .into_iter()
            .take(count)
            .enumerate()
            .map(|(worker_id, unit)| (worker_id, unit, Arc::new(WorkerCell::default())))
            .collect();

        let (stop_tx, _) = watch::channel(false);
        Ok(Self {
            config,
            queue,
            executor,
            observations: Arc::new(Mutex::new(observations)),
            bus,
            workers,
            tasks: Vec::new(),
            stop_tx,
        })
    }

    /// Number of workers this pool runs
    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Spawn every worker
    pub fn start(&mut self) {
        for (worker_id, unit, cell) in &self.workers {
            let handle = tokio::spawn(run_worker(
                *worker_id,
                unit.clone(),
                cell.clone(),
                self.queue.clone(),
                self.executor.clone(),
                self.observations.clone(),
                self.bus.clone(),
                self.config.clone(),
                self.stop_tx.subscribe(),
            ));
            self.tasks.push(handle);
        }
        info!(workers = self.tasks.len(), "Worker pool started");
    }

    /// Stop all workers, letting each finish its current item
    ///
    /// Idempotent; a second call is a no-op.
    pub async fn stop(&mut self) {
        if self.tasks.is_empty() {
            debug!("stop: no running workers");
            return;
        }
        info!(workers = self.tasks.len(), "Stopping worker pool");
        let _ = self.stop_tx.send(true);

        for task in self.tasks.drain(..) {
            if let Err(e) = task.await {
                error!(error = %e, "Worker task panicked");
            }
        }
        info!("Worker pool stopped");
    }

    /// Snapshot of every worker's state
    pub async fn snapshot(&self) -> Vec<WorkerSnapshot> {
        let mut snapshots = Vec::with_capacity(self.workers.len());
        for (worker_id, unit, cell) in &self.workers {
            snapshots.push(WorkerSnapshot {
                worker_id: *worker_id,
                unit_id: unit.id(),
                region: unit.region.clone(),
                busy: cell.busy.load(Ordering::SeqCst),
                current: cell.current.lock().await.clone(),
            });
        }
        snapshots
    }
}

/// Derive a target's tier from extracted page data
fn classify(data: &PageData) -> (Option<Tier>, &'static str) {
    match (data.available, data.stocked()) {
        (true, true) => (Some(Tier::One), "available and stocked"),
        (true, false) => (Some(Tier::Two), "available"),
        (false, true) => (Some(Tier::Three), "stocked"),
        (false, false) => (None, "no signals"),
    }
}

/// One worker's pull loop, pinned to a single proxy unit for its lifetime
#[allow(clippy::too_many_arguments)]
async fn run_worker(
    worker_id: usize,
    unit: ProxyUnit,
    cell: Arc<WorkerCell>,
    queue: Arc<PriorityQueue>,
    executor: Arc<dyn PageExecutor>,
    observations: Arc<Mutex<ObservationStore>>,
    bus: Arc<EventBus>,
    config: WorkerPoolConfig,
    mut stop_rx: watch::Receiver<bool>,
) {
    // One session for the worker's whole lifetime, reused across targets
    let mut session = match executor.open_session(&unit).await {
        Ok(session) => session,
        Err(e) => {
            error!(worker_id, unit_id = %unit.id(), error = %e, "Failed to open session; worker exiting");
            return;
        }
    };
    info!(worker_id, unit_id = %unit.id(), region = %unit.region, "Worker started");

    while !*stop_rx.borrow() {
        let Some(target) = queue.next().await else {
            tokio::select! {
                _ = tokio::time::sleep(config.idle_delay) => {}
                _ = stop_rx.changed() => {}
            }
            continue;
        };

        cell.busy.store(true, Ordering::SeqCst);
        *cell.current.lock().await = Some(target.url.clone());
        bus.processing_started(&target, &unit.region);

        match session.execute(&target, config.executor_timeout).await {
            Ok(ProbeOutcome::Data(data)) => {
                let (tier, reason) = classify(&data);
                queue.set_priority(&target.url, tier, reason).await;

                let observation = Observation {
                    target: target.url.clone(),
                    slots: data.slots,
                    available: data.available,
                    checked_at: Utc::now(),
                };
                match observations.lock().await.record(&target.group, observation.clone()) {
                    Ok(true) => {
                        info!(worker_id, url = %target.url, group = %target.group, "Observation changed");
                        bus.observation_changed(&target.group, &observation);
                    }
                    Ok(false) => {
                        debug!(worker_id, url = %target.url, "run_worker: no state change");
                    }
                    Err(e) => {
                        error!(worker_id, url = %target.url, error = %e, "Failed to persist observation");
                    }
                }
            }
            Ok(ProbeOutcome::NoData) => {
                // Diagnostic capture only; priority state is untouched
                debug!(worker_id, url = %target.url, "run_worker: no data extracted");
            }
            Err(e) => {
                warn!(worker_id, url = %target.url, error = %e, "Target processing failed");
            }
        }

        bus.processing_cleared(&target);
        *cell.current.lock().await = None;
        cell.busy.store(false, Ordering::SeqCst);

        tokio::select! {
            _ = tokio::time::sleep(config.item_delay) => {}
            _ = stop_rx.changed() => {}
        }
    }

    info!(worker_id, "Worker stopped");
    // Dropping the session releases the persistent connection
    drop(session);
}
