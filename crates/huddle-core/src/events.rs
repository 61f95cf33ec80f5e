//! Bus event types and the in-memory event bus for real-time notifications.
//!
//! Every mutation produces a typed [`BusEvent`] delivered to all SSE
//! subscribers through a single broadcast channel. Events are ephemeral
//! notifications: they are never persisted, and a subscriber that falls
//! behind drops the oldest events and reconciles by re-reading state through
//! the log. Parked `msg_wait` callers are signalled on a separate
//! never-dropping path by the core API after commit.
//!
//! ## Wire Format (SSE)
//!
//! ```text
//! data: {"type":"msg.new","payload":{"thread_id":"…","seq":7,…}}
//! ```

use schemars::JsonSchema;
use serde::Serialize;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::defaults;

/// Closed set of bus events, serialized as `{"type": …, "payload": …}`.
#[derive(Debug, Clone, Serialize, JsonSchema)]
#[serde(tag = "type", content = "payload")]
pub enum BusEvent {
    /// A message was committed to a thread. `content` is a preview truncated
    /// to [`defaults::EVENT_CONTENT_PREVIEW_CHARS`] characters.
    #[serde(rename = "msg.new")]
    MessageNew {
        msg_id: Uuid,
        thread_id: Uuid,
        author: String,
        role: String,
        seq: i64,
        content: String,
    },
    /// A thread was created.
    #[serde(rename = "thread.new")]
    ThreadNew { thread_id: Uuid, topic: String },
    /// A thread's status changed via `set-state`.
    #[serde(rename = "thread.state")]
    ThreadState { thread_id: Uuid, state: String },
    /// A thread was closed.
    #[serde(rename = "thread.closed")]
    ThreadClosed {
        thread_id: Uuid,
        #[serde(skip_serializing_if = "Option::is_none")]
        summary: Option<String>,
    },
    /// A thread was archived.
    #[serde(rename = "thread.archived")]
    ThreadArchived { thread_id: Uuid },
    /// A thread was unarchived; `state` is the restored status.
    #[serde(rename = "thread.unarchived")]
    ThreadUnarchived { thread_id: Uuid, state: String },
    /// A thread and its messages were hard-deleted.
    #[serde(rename = "thread.deleted")]
    ThreadDeleted { thread_id: Uuid },
    /// An agent registered or came back online.
    #[serde(rename = "agent.online")]
    AgentOnline {
        agent_id: Uuid,
        name: String,
        ide: String,
        model: String,
    },
    /// An agent unregistered or missed its heartbeat window.
    #[serde(rename = "agent.offline")]
    AgentOffline { agent_id: Uuid },
    /// Ephemeral typing signal; never persisted.
    #[serde(rename = "agent.typing")]
    AgentTyping {
        thread_id: Uuid,
        agent_id: Uuid,
        name: String,
        is_typing: bool,
    },
}

impl BusEvent {
    /// Returns the dot-namespaced event type name.
    pub fn event_type(&self) -> &'static str {
        match self {
            BusEvent::MessageNew { .. } => "msg.new",
            BusEvent::ThreadNew { .. } => "thread.new",
            BusEvent::ThreadState { .. } => "thread.state",
            BusEvent::ThreadClosed { .. } => "thread.closed",
            BusEvent::ThreadArchived { .. } => "thread.archived",
            BusEvent::ThreadUnarchived { .. } => "thread.unarchived",
            BusEvent::ThreadDeleted { .. } => "thread.deleted",
            BusEvent::AgentOnline { .. } => "agent.online",
            BusEvent::AgentOffline { .. } => "agent.offline",
            BusEvent::AgentTyping { .. } => "agent.typing",
        }
    }

    /// Returns the thread this event relates to, where applicable.
    pub fn thread_id(&self) -> Option<Uuid> {
        match self {
            BusEvent::MessageNew { thread_id, .. }
            | BusEvent::ThreadNew { thread_id, .. }
            | BusEvent::ThreadState { thread_id, .. }
            | BusEvent::ThreadClosed { thread_id, .. }
            | BusEvent::ThreadArchived { thread_id }
            | BusEvent::ThreadUnarchived { thread_id, .. }
            | BusEvent::ThreadDeleted { thread_id }
            | BusEvent::AgentTyping { thread_id, .. } => Some(*thread_id),
            BusEvent::AgentOnline { .. } | BusEvent::AgentOffline { .. } => None,
        }
    }
}

/// Truncate message content for event payloads.
pub fn content_preview(content: &str) -> String {
    content
        .chars()
        .take(defaults::EVENT_CONTENT_PREVIEW_CHARS)
        .collect()
}

// =============================================================================
// Event Bus
// =============================================================================

/// Broadcast-based event bus distributing [`BusEvent`]s to all subscribers.
///
/// Uses `tokio::sync::broadcast` with a bounded buffer. Slow receivers that
/// fall behind receive a `Lagged` error and miss events; they are expected to
/// reconcile by re-reading state via the log, never to rely on receiving
/// every event.
pub struct EventBus {
    tx: broadcast::Sender<BusEvent>,
}

impl EventBus {
    /// Create a new event bus with the given broadcast capacity.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Emit an event to all subscribers. If there are no active subscribers
    /// the event is silently dropped.
    pub fn emit(&self, event: BusEvent) {
        tracing::debug!(
            event_type = %event.event_type(),
            subscriber_count = self.tx.receiver_count(),
            "EventBus emit"
        );
        let _ = self.tx.send(event);
    }

    /// Subscribe to receive events. Each subscriber gets its own independent
    /// stream.
    pub fn subscribe(&self) -> broadcast::Receiver<BusEvent> {
        self.tx.subscribe()
    }

    /// Returns the number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(defaults::EVENT_BUS_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_event_bus_emit_subscribe() {
        let bus = EventBus::new(32);
        let mut rx = bus.subscribe();

        bus.emit(BusEvent::ThreadNew {
            thread_id: Uuid::nil(),
            topic: "hello".to_string(),
        });

        let event = rx.recv().await.unwrap();
        assert!(matches!(event, BusEvent::ThreadNew { .. }));
        assert_eq!(event.event_type(), "thread.new");
    }

    #[tokio::test]
    async fn test_event_bus_multiple_subscribers() {
        let bus = EventBus::new(32);
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        bus.emit(BusEvent::AgentOffline {
            agent_id: Uuid::nil(),
        });

        assert!(matches!(
            rx1.recv().await.unwrap(),
            BusEvent::AgentOffline { .. }
        ));
        assert!(matches!(
            rx2.recv().await.unwrap(),
            BusEvent::AgentOffline { .. }
        ));
    }

    #[tokio::test]
    async fn test_event_bus_no_subscribers_ok() {
        let bus = EventBus::new(32);
        // Must not panic with no subscribers
        bus.emit(BusEvent::ThreadDeleted {
            thread_id: Uuid::nil(),
        });
    }

    #[tokio::test]
    async fn test_event_bus_subscriber_count() {
        let bus = EventBus::new(32);
        assert_eq!(bus.subscriber_count(), 0);
        let rx1 = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 1);
        let _rx2 = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);
        drop(rx1);
        assert_eq!(bus.subscriber_count(), 1);
    }

    #[tokio::test]
    async fn test_event_bus_lagged_receiver() {
        let bus = EventBus::new(2);
        let mut rx = bus.subscribe();

        for i in 0..5 {
            bus.emit(BusEvent::ThreadState {
                thread_id: Uuid::nil(),
                state: format!("s{}", i),
            });
        }

        // Oldest events were dropped for this subscriber
        let result = rx.recv().await;
        assert!(result.is_ok() || matches!(result, Err(broadcast::error::RecvError::Lagged(_))));
    }

    #[test]
    fn test_wire_format_type_and_payload() {
        let event = BusEvent::MessageNew {
            msg_id: Uuid::nil(),
            thread_id: Uuid::nil(),
            author: "Cursor (GPT-4)".to_string(),
            role: "assistant".to_string(),
            seq: 7,
            content: "hello".to_string(),
        };
        let json: serde_json::Value = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "msg.new");
        assert_eq!(json["payload"]["seq"], 7);
        assert_eq!(json["payload"]["author"], "Cursor (GPT-4)");
    }

    #[test]
    fn test_thread_closed_skips_missing_summary() {
        let event = BusEvent::ThreadClosed {
            thread_id: Uuid::nil(),
            summary: None,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(!json.contains("summary"));
    }

    #[test]
    fn test_content_preview_truncates() {
        let long = "x".repeat(500);
        let preview = content_preview(&long);
        assert_eq!(preview.chars().count(), defaults::EVENT_CONTENT_PREVIEW_CHARS);
        assert_eq!(content_preview("short"), "short");
    }

    #[test]
    fn test_event_thread_id() {
        let tid = Uuid::new_v4();
        assert_eq!(
            BusEvent::ThreadArchived { thread_id: tid }.thread_id(),
            Some(tid)
        );
        assert_eq!(
            BusEvent::AgentOffline {
                agent_id: Uuid::nil()
            }
            .thread_id(),
            None
        );
    }
}
