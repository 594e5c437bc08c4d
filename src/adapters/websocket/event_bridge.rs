//! Event bridge connecting the notification bus to dashboard sockets.
//!
//! Subscribes to the events an operator cares about and fans them out over
//! a broadcast channel. Each connected socket holds its own receiver.
//!
//! ```text
//! DialogueEngine / EscalationManager
//!          │ publish
//!          ▼
//!   InMemoryEventBus ──► DashboardBridge ──► broadcast ──► /api/live sockets
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::domain::foundation::{DomainError, EventEnvelope};
use crate::ports::{EventHandler, EventSubscriber};

use super::messages::DashboardUpdate;

/// Events pushed to the dashboard.
pub const DASHBOARD_EVENT_TYPES: &[&str] = &[
    "conversation.message_received.v1",
    "conversation.message_sent.v1",
    "conversation.step_advanced.v1",
    "conversation.conversion_recorded.v1",
    "conversation.order_confirmed.v1",
    "conversation.pause_toggled.v1",
    "conversation.session_reset.v1",
    "escalation.alert_raised.v1",
    "escalation.alert_resolved.v1",
    "variant.script_activated.v1",
];

/// Buffered updates per client before it starts lagging.
pub const DEFAULT_CAPACITY: usize = 256;

pub struct DashboardBridge {
    sender: broadcast::Sender<DashboardUpdate>,
}

impl DashboardBridge {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn new_shared(capacity: usize) -> Arc<Self> {
        Arc::new(Self::new(capacity))
    }

    /// Registers the bridge for every dashboard event type.
    pub fn register(self: &Arc<Self>, subscriber: &dyn EventSubscriber) {
        subscriber.subscribe_all(DASHBOARD_EVENT_TYPES, self.clone());
    }

    /// A receiver for one newly connected client.
    pub fn subscribe(&self) -> broadcast::Receiver<DashboardUpdate> {
        self.sender.subscribe()
    }

    pub fn client_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

#[async_trait]
impl EventHandler for DashboardBridge {
    async fn handle(&self, event: EventEnvelope) -> Result<(), DomainError> {
        // No connected clients is not an error
        if self.sender.send(DashboardUpdate::from(&event)).is_err() {
            tracing::trace!(event_type = %event.event_type, "no dashboard clients connected");
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "DashboardBridge"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::events::InMemoryEventBus;
    use crate::ports::EventPublisher;
    use serde_json::json;

    fn event(event_type: &str) -> EventEnvelope {
        EventEnvelope::new(event_type, "c1", "Conversation", json!({ "content": "hola" }))
    }

    #[tokio::test]
    async fn relays_dashboard_events_to_every_client() {
        let bus = InMemoryEventBus::new();
        let bridge = DashboardBridge::new_shared(16);
        bridge.register(&bus);
        let mut first = bridge.subscribe();
        let mut second = bridge.subscribe();

        bus.publish(event("conversation.message_received.v1"))
            .await
            .unwrap();

        let a = first.recv().await.unwrap();
        let b = second.recv().await.unwrap();
        assert_eq!(a.event_type, "conversation.message_received.v1");
        assert_eq!(a, b);
        assert_eq!(a.chat_id.as_deref(), Some("c1"));
    }

    #[tokio::test]
    async fn ignores_unrelated_events() {
        let bus = InMemoryEventBus::new();
        let bridge = DashboardBridge::new_shared(16);
        bridge.register(&bus);
        let mut rx = bridge.subscribe();

        bus.publish(event("internal.heartbeat.v1")).await.unwrap();
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn publishing_without_clients_succeeds() {
        let bridge = DashboardBridge::new(4);
        assert_eq!(bridge.client_count(), 0);
        assert!(bridge
            .handle(event("conversation.message_sent.v1"))
            .await
            .is_ok());
    }
}
