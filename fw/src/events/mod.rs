//! Update notifications for external collaborators
//!
//! Workers emit fire-and-forget events onto a broadcast bus; consumers (a
//! dashboard push transport, the JSONL activity logger) subscribe. An
//! unreachable or absent consumer never blocks a worker.

mod bus;
mod logger;
mod types;

pub use bus::{DEFAULT_CHANNEL_CAPACITY, EventBus, create_event_bus};
pub use logger::{EventLogger, read_events, spawn_event_logger};
pub use types::{EventLogEntry, WatchEvent};
