//! Push events and the broadcast channel.
//!
//! Observers (UI clients, mostly) subscribe once and receive every event;
//! delivery is fire-and-forget with no acknowledgement. The transport that
//! carries frames to the outside world implements [`PushTransport`] — the
//! core never probes for delivery capability at runtime.

use std::collections::HashMap;

use async_trait::async_trait;
use flexpreset_core::{OutputType, Panel};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::broadcast;
use uuid::Uuid;

/// Payload of an enum refresh: the full document/preset/key inventory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnumRefreshPayload {
    /// All document file names, sorted.
    pub yaml_files: Vec<String>,

    /// Preset titles per document, in document order.
    pub titles_by_yaml: HashMap<String, Vec<String>>,

    /// Field key order per `"<document>::<title>"`.
    pub values_by_yaml_title: HashMap<String, Vec<String>>,
}

/// Payload pushed after a value mutation so all observers converge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WidgetSyncPayload {
    /// The preset title.
    pub title: String,

    /// Current field panel, in on-disk order.
    pub values: Panel,

    /// Field key order, explicit so clients need not rely on map order.
    pub keys_order: Vec<String>,

    /// Resolved output slot types.
    pub outputs: Vec<OutputType>,

    /// Resolved output slot names.
    pub output_names: Vec<String>,

    /// Whether the consumer must rebuild its output slots.
    pub refresh_outputs: bool,

    /// Identifier of the requesting consumer, echoed back.
    pub node_id: Option<String>,
}

/// An event on the push channel.
#[derive(Debug, Clone)]
pub enum PushEvent {
    /// The document set or its titles changed.
    EnumRefresh(EnumRefreshPayload),

    /// A preset's values or schema changed.
    WidgetSync(WidgetSyncPayload),
}

impl PushEvent {
    /// The wire event name.
    pub fn event_name(&self) -> &'static str {
        match self {
            PushEvent::EnumRefresh(_) => "flexpreset_enum",
            PushEvent::WidgetSync(_) => "flexpreset_widgets",
        }
    }

    /// The `{event, payload}` frame sent to observers.
    pub fn to_frame(&self) -> serde_json::Value {
        let payload = match self {
            PushEvent::EnumRefresh(payload) => json!(payload),
            PushEvent::WidgetSync(payload) => json!(payload),
        };
        json!({ "event": self.event_name(), "payload": payload })
    }
}

/// The single well-typed publish interface for push delivery.
#[async_trait]
pub trait PushTransport: Send + Sync {
    /// Publish an event to all observers. Best-effort; never fails.
    async fn publish(&self, event: PushEvent);
}

/// A handle to the push channel for one observer.
pub struct EventSubscription {
    /// Unique ID for this subscription.
    pub id: Uuid,

    /// Receiver for events.
    pub receiver: broadcast::Receiver<PushEvent>,
}

/// In-process broadcaster over a tokio broadcast channel.
pub struct EventBroadcaster {
    sender: broadcast::Sender<PushEvent>,
}

impl EventBroadcaster {
    /// Create a new broadcaster.
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(256);
        Self { sender }
    }

    /// Subscribe to all future events.
    pub fn subscribe(&self) -> EventSubscription {
        EventSubscription {
            id: Uuid::new_v4(),
            receiver: self.sender.subscribe(),
        }
    }

    /// Number of currently connected observers.
    pub fn observer_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PushTransport for EventBroadcaster {
    async fn publish(&self, event: PushEvent) {
        // No observers is fine; the send result is intentionally ignored.
        let _ = self.sender.send(event);
    }
}
