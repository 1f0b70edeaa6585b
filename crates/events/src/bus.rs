//! In-process event bus backed by a `tokio::sync::broadcast` channel.
//!
//! [`EventBus`] is the publish/subscribe hub for [`OperationEvent`]s.
//! The orchestrator publishes one event per state transition
//! (`operation.started`, `operation.running`, `operation.completed`,
//! `operation.failed`, `operation.expired`, `operation.undo_initiated`)
//! so observers and tests can react to transitions instead of
//! scraping log text. Shared via `Arc<EventBus>`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use bulkpress_core::types::DbId;

/// A state-transition event for one operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationEvent {
    /// Dot-separated event name, e.g. `"operation.running"`.
    pub event_type: String,

    /// The tenant the operation belongs to.
    pub tenant: String,

    /// Database id of the operation.
    pub operation_id: DbId,

    /// Free-form JSON payload carrying event-specific data
    /// (remote job id, error message, result counts).
    pub payload: serde_json::Value,

    /// When the event was created (UTC).
    pub timestamp: DateTime<Utc>,
}

impl OperationEvent {
    /// Create a new event with an empty payload.
    pub fn new(event_type: impl Into<String>, tenant: impl Into<String>, operation_id: DbId) -> Self {
        Self {
            event_type: event_type.into(),
            tenant: tenant.into(),
            operation_id,
            payload: serde_json::Value::Object(Default::default()),
            timestamp: Utc::now(),
        }
    }

    /// Set the JSON payload for the event.
    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }
}

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 1024;

/// In-process fan-out event bus.
///
/// Wraps a [`broadcast::Sender`] so any number of subscribers can
/// independently receive every published [`OperationEvent`]. Publishing
/// with zero subscribers is a silent no-op.
pub struct EventBus {
    sender: broadcast::Sender<OperationEvent>,
}

impl EventBus {
    /// Create a bus with the default buffer capacity.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Create a bus with an explicit buffer capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all current subscribers.
    pub fn publish(&self, event: OperationEvent) {
        tracing::debug!(
            event_type = %event.event_type,
            tenant = %event.tenant,
            operation_id = event.operation_id,
            "Publishing operation event",
        );
        // Err means no live subscribers, which is fine.
        let _ = self.sender.send(event);
    }

    /// Subscribe to all events published after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<OperationEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
