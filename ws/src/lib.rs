//! WatchStore - persistent state for the fleetwatch daemon
//!
//! Two stores, both plain files under a data directory:
//!
//! - [`fleet`] - the fleet state file: the list of live proxy units,
//!   rewritten wholesale on every add/remove
//! - [`observations`] - one JSONL file per grouping key holding the latest
//!   observation for each target, rewritten only when an observation
//!   actually changed
//!
//! A missing file is an empty store, never an error. Concurrent writers are
//! expected to serialize above this crate; an `fs2` lock file guards against
//! a second process opening the same observation store.

pub mod error;
pub mod fleet;
pub mod observations;

pub use error::StoreError;
pub use fleet::{FleetRecord, FleetStateStore};
pub use observations::{Observation, ObservationStore};
