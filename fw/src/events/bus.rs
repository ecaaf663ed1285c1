//! Event Bus - pub/sub for fleetwatch activity
//!
//! Built on a tokio broadcast channel: workers emit, consumers subscribe.
//! Emitting is fire-and-forget; with no subscribers the event is dropped,
//! and a full channel drops the oldest events.

use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::debug;

use super::types::WatchEvent;
use crate::queue::Target;
use watchstore::Observation;

/// Default channel capacity (events)
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// Central event bus for update notifications
pub struct EventBus {
    tx: broadcast::Sender<WatchEvent>,
}

impl EventBus {
    /// Create a new event bus with the given capacity
    pub fn new(capacity: usize) -> Self {
        debug!(capacity, "EventBus::new: creating event bus");
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Create a new event bus with default capacity
    pub fn with_default_capacity() -> Self {
        Self::new(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Emit an event to all subscribers
    pub fn emit(&self, event: WatchEvent) {
        debug!(event_type = event.event_type(), target = event.target(), "EventBus::emit");
        // Ignore send errors (no subscribers is OK)
        let _ = self.tx.send(event);
    }

    /// Subscribe to receive events emitted after this call
    pub fn subscribe(&self) -> broadcast::Receiver<WatchEvent> {
        debug!("EventBus::subscribe: new subscriber");
        self.tx.subscribe()
    }

    /// Get the number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    // === Convenience methods ===

    /// Emit a processing-started event
    pub fn processing_started(&self, target: &Target, region: &str) {
        self.emit(WatchEvent::ProcessingStarted {
            target: target.url.clone(),
            group: target.group.clone(),
            region: region.to_string(),
        });
    }

    /// Emit an observation-changed event
    pub fn observation_changed(&self, group: &str, observation: &Observation) {
        self.emit(WatchEvent::ObservationChanged {
            group: group.to_string(),
            target: observation.target.clone(),
            slots: observation.slots.clone(),
            available: observation.available,
            checked_at: observation.checked_at,
        });
    }

    /// Emit a processing-cleared event
    pub fn processing_cleared(&self, target: &Target) {
        self.emit(WatchEvent::ProcessingCleared {
            target: target.url.clone(),
        });
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::with_default_capacity()
    }
}

/// Create an event bus wrapped in an Arc for shared ownership
pub fn create_event_bus() -> Arc<EventBus> {
    Arc::new(EventBus::with_default_capacity())
}
