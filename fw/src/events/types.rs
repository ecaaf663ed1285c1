//! Event types for fleetwatch activity streaming

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The three event kinds collaborators receive
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum WatchEvent {
    /// A worker began processing a target
    ProcessingStarted {
        target: String,
        group: String,
        region: String,
    },

    /// A target's persisted observation actually changed
    ObservationChanged {
        group: String,
        target: String,
        slots: Vec<String>,
        available: bool,
        checked_at: DateTime<Utc>,
    },

    /// A worker finished with a target (data or not)
    ProcessingCleared { target: String },
}

impl WatchEvent {
    /// Get the target for this event
    pub fn target(&self) -> &str {
        match self {
            WatchEvent::ProcessingStarted { target, .. }
            | WatchEvent::ObservationChanged { target, .. }
            | WatchEvent::ProcessingCleared { target } => target,
        }
    }

    /// Get the event type name
    pub fn event_type(&self) -> &'static str {
        match self {
            WatchEvent::ProcessingStarted { .. } => "ProcessingStarted",
            WatchEvent::ObservationChanged { .. } => "ObservationChanged",
            WatchEvent::ProcessingCleared { .. } => "ProcessingCleared",
        }
    }
}

/// One line of the activity log
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EventLogEntry {
    pub timestamp: DateTime<Utc>,
    pub event: WatchEvent,
}

impl EventLogEntry {
    pub fn new(event: WatchEvent) -> Self {
        Self {
            timestamp: Utc::now(),
            event,
        }
    }
}
