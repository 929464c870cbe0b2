//! Change feed for real-time view refreshes
//!
//! The EventBus uses `tokio::sync::broadcast` to decouple mutations
//! (services) from subscribers (live views, push channels).
//!
//! # Architecture
//!
//! ```text
//! PickupService ──┐
//!                 ├──▶ EventBus::publish() ──▶ broadcast channel ──▶ QueryView::follow
//! PaymentService ─┘                                             ──▶ other subscribers
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! let event_bus = EventBus::new(1024);
//! let mut rx = event_bus.subscribe();
//!
//! event_bus.publish(EntityEvent::Created {
//!     table: "payments".to_string(),
//!     id: payment.id,
//! });
//!
//! if let Ok(envelope) = rx.recv().await {
//!     println!("{} {}", envelope.event.action(), envelope.event.table());
//! }
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// A mutation applied to a row in the store
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum EntityEvent {
    /// A row was inserted
    Created { table: String, id: Uuid },
    /// A row was updated
    Updated { table: String, id: Uuid },
    /// A row was deleted
    Deleted { table: String, id: Uuid },
    /// Several rows were patched by one filtered update
    BulkUpdated { table: String, count: usize },
    /// Rows were removed by a maintenance sweep
    Purged { table: String, count: usize },
}

impl EntityEvent {
    /// Get the table this event relates to
    pub fn table(&self) -> &str {
        match self {
            EntityEvent::Created { table, .. }
            | EntityEvent::Updated { table, .. }
            | EntityEvent::Deleted { table, .. }
            | EntityEvent::BulkUpdated { table, .. }
            | EntityEvent::Purged { table, .. } => table,
        }
    }

    /// Get the row id this event relates to (if applicable)
    pub fn id(&self) -> Option<Uuid> {
        match self {
            EntityEvent::Created { id, .. }
            | EntityEvent::Updated { id, .. }
            | EntityEvent::Deleted { id, .. } => Some(*id),
            EntityEvent::BulkUpdated { .. } | EntityEvent::Purged { .. } => None,
        }
    }

    /// Get the action name
    pub fn action(&self) -> &str {
        match self {
            EntityEvent::Created { .. } => "created",
            EntityEvent::Updated { .. } => "updated",
            EntityEvent::Deleted { .. } => "deleted",
            EntityEvent::BulkUpdated { .. } => "bulk_updated",
            EntityEvent::Purged { .. } => "purged",
        }
    }
}

/// Envelope wrapping an event with metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    /// Unique event ID
    pub id: Uuid,
    /// When the event occurred
    pub timestamp: DateTime<Utc>,
    /// The actual event
    pub event: EntityEvent,
}

impl EventEnvelope {
    pub fn new(event: EntityEvent) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            event,
        }
    }
}

/// Broadcast-based event bus
///
/// The bus is cheap to clone (Arc internally) and can be shared across threads.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<EventEnvelope>,
}

impl EventBus {
    /// Create a new EventBus with the given channel capacity
    ///
    /// The capacity determines how many events can be buffered before
    /// slow receivers start losing events (lagged).
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publish an event to all subscribers
    ///
    /// Never fails. If there are no subscribers the event is dropped.
    /// Returns the number of receivers that will receive the event.
    pub fn publish(&self, event: EntityEvent) -> usize {
        tracing::trace!(table = event.table(), action = event.action(), "publishing change");
        // send() returns Err only if there are no receivers, which is fine
        self.sender.send(EventEnvelope::new(event)).unwrap_or(0)
    }

    /// Subscribe to events published after this call
    pub fn subscribe(&self) -> broadcast::Receiver<EventEnvelope> {
        self.sender.subscribe()
    }

    /// Get the current number of active subscribers
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1024)
    }
}
