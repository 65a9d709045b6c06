//! Event types for the GMV live update stream
//!
//! Events are broadcast via [`EventBus`] and serialized for SSE transmission.
//! The page listens for them to know when to re-request a view.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// GMV event types
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum GmvEvent {
    /// Geocode cache gained or lost entries; movement views should re-derive
    GeocodeCacheUpdated {
        /// Monotonic cache version after the change
        version: u64,
        /// Normalized location keys that changed
        keys: Vec<String>,
        timestamp: DateTime<Utc>,
    },

    /// A manual geocode fix was accepted by the backend
    GeocodeFixApplied {
        raw: String,
        lat: f64,
        lng: f64,
        timestamp: DateTime<Utc>,
    },

    /// The active tree changed
    TreeSelected {
        tree_id: String,
        timestamp: DateTime<Utc>,
    },

    /// Stored filter state for a tree changed
    FiltersChanged {
        tree_id: String,
        /// Normalized query string
        query: String,
        timestamp: DateTime<Utc>,
    },
}

impl GmvEvent {
    /// SSE event name (matches the serde tag)
    pub fn event_type(&self) -> &'static str {
        match self {
            GmvEvent::GeocodeCacheUpdated { .. } => "GeocodeCacheUpdated",
            GmvEvent::GeocodeFixApplied { .. } => "GeocodeFixApplied",
            GmvEvent::TreeSelected { .. } => "TreeSelected",
            GmvEvent::FiltersChanged { .. } => "FiltersChanged",
        }
    }
}

/// Broadcast bus for [`GmvEvent`]s
///
/// # Examples
///
/// ```
/// use gmv_common::events::{EventBus, GmvEvent};
///
/// let bus = EventBus::new(100);
/// let mut rx = bus.subscribe();
/// bus.emit_lossy(GmvEvent::TreeSelected {
///     tree_id: "t1".to_string(),
///     timestamp: chrono::Utc::now(),
/// });
/// assert!(rx.try_recv().is_ok());
/// ```
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<GmvEvent>,
}

impl EventBus {
    /// Creates a new EventBus buffering `capacity` events per slow subscriber
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<GmvEvent> {
        self.tx.subscribe()
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: GmvEvent) {
        let _ = self.tx.send(event);
    }

    /// Get the current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serializes_with_type_tag() {
        let event = GmvEvent::FiltersChanged {
            tree_id: "t1".to_string(),
            query: "mode=person".to_string(),
            timestamp: Utc::now(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], event.event_type());
        assert_eq!(json["tree_id"], "t1");
    }

    #[tokio::test]
    async fn test_subscribers_receive_emitted_events() {
        let bus = EventBus::new(10);
        let mut rx = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 1);

        bus.emit_lossy(GmvEvent::TreeSelected {
            tree_id: "t2".to_string(),
            timestamp: Utc::now(),
        });

        match rx.recv().await.unwrap() {
            GmvEvent::TreeSelected { tree_id, .. } => assert_eq!(tree_id, "t2"),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_emit_without_subscribers_is_silent() {
        let bus = EventBus::new(4);
        bus.emit_lossy(GmvEvent::TreeSelected {
            tree_id: "t3".to_string(),
            timestamp: Utc::now(),
        });
        assert_eq!(bus.subscriber_count(), 0);
    }
}
