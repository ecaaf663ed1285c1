//! FleetWatch - proxy fleet provisioner and continuous polling daemon
//!
//! FleetWatch provisions a fleet of ephemeral network-egress endpoints
//! ("proxy units") on a cloud compute platform, then keeps every unit
//! saturated with targets pulled from a fairly interleaved rotation with
//! bounded priority line-cutting.
//!
//! # Core Concepts
//!
//! - **Two-phase provisioning**: chunked service-creation requests smooth
//!   API load, then unbounded readiness polling gets workers started as
//!   early as possible
//! - **Bounded unfairness**: promoted targets may cut the rotation line, but
//!   only within a tier-scaled distance of the cursor, so hot targets never
//!   starve coverage
//! - **Saturation by construction**: every worker drives its own pull loop;
//!   there is no central dispatcher to re-trigger
//!
//! # Modules
//!
//! - [`cloud`] - provisioning API client trait and HTTP implementation
//! - [`fleet`] - proxy unit lifecycle: resources, provisioning, teardown
//! - [`queue`] - base rotation and priority overlay
//! - [`pool`] - workers, page executor seam
//! - [`events`] - fire-and-forget update notifications
//! - [`config`] - configuration types and loading
//! - [`cli`] - command-line interface

pub mod cli;
pub mod cloud;
pub mod config;
pub mod events;
pub mod fleet;
pub mod pool;
pub mod queue;
pub mod retry;

// Re-export commonly used types
pub use cloud::{CloudClient, CloudError, HttpCloudClient, ServiceState};
pub use config::{CloudConfig, Config, FleetConfig, PoolConfig, QueueConfig};
pub use events::{EventBus, WatchEvent, spawn_event_logger};
pub use fleet::{FleetManager, ProxyUnit, RegionResources, ResourceCache};
pub use pool::{HttpExecutor, PageData, PageExecutor, PageSession, ProbeOutcome, WorkerPool, WorkerSnapshot};
pub use queue::{PriorityQueue, QueueStatus, Target, Tier, interleave};
pub use retry::{RetryExecutor, RetryPolicy};
