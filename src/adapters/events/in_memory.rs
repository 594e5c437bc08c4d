//! In-process notification bus.
//!
//! Delivery is synchronous with the publisher: handlers run in subscription
//! order before `publish` returns, which keeps the event stream of a chat in
//! the order its worker produced it. A bounded tail of published events is
//! retained for the dashboard and for test assertions.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, RwLock};

use crate::domain::foundation::{DomainError, ErrorCode, EventEnvelope};
use crate::ports::{EventHandler, EventPublisher, EventSubscriber};

/// Subscribing to this type receives every event.
pub const ALL_EVENTS: &str = "*";

const DEFAULT_RETAINED: usize = 1_000;

/// In-memory event bus.
///
/// # Example
///
/// ```ignore
/// let bus = Arc::new(InMemoryEventBus::new());
/// bus.subscribe(ALL_EVENTS, bridge);
///
/// bus.publish(envelope).await?;
/// assert!(bus.has_event("escalation.alert_raised.v1"));
/// ```
pub struct InMemoryEventBus {
    handlers: RwLock<HashMap<String, Vec<Arc<dyn EventHandler>>>>,
    published: RwLock<VecDeque<EventEnvelope>>,
    retained: usize,
}

impl InMemoryEventBus {
    pub fn new() -> Self {
        Self::with_retention(DEFAULT_RETAINED)
    }

    /// Keeps at most `retained` published events; older ones are dropped.
    pub fn with_retention(retained: usize) -> Self {
        Self {
            handlers: RwLock::new(HashMap::new()),
            published: RwLock::new(VecDeque::new()),
            retained: retained.max(1),
        }
    }

    /// Retained events, oldest first.
    pub fn published_events(&self) -> Vec<EventEnvelope> {
        self.published
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .iter()
            .cloned()
            .collect()
    }

    pub fn events_of_type(&self, event_type: &str) -> Vec<EventEnvelope> {
        self.published_events()
            .into_iter()
            .filter(|e| e.event_type == event_type)
            .collect()
    }

    pub fn event_count(&self) -> usize {
        self.published
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn has_event(&self, event_type: &str) -> bool {
        self.published
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .iter()
            .any(|e| e.event_type == event_type)
    }

    fn handlers_for(&self, event_type: &str) -> Vec<Arc<dyn EventHandler>> {
        let handlers = self
            .handlers
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        handlers
            .get(event_type)
            .into_iter()
            .chain(handlers.get(ALL_EVENTS))
            .flatten()
            .cloned()
            .collect()
    }
}

impl Default for InMemoryEventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventPublisher for InMemoryEventBus {
    async fn publish(&self, event: EventEnvelope) -> Result<(), DomainError> {
        {
            let mut published = self
                .published
                .write()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            if published.len() == self.retained {
                published.pop_front();
            }
            published.push_back(event.clone());
        }

        // Lock released before awaiting handlers
        let handlers = self.handlers_for(&event.event_type);

        let mut errors = Vec::new();
        for handler in handlers {
            if let Err(e) = handler.handle(event.clone()).await {
                tracing::warn!(
                    handler = handler.name(),
                    event_type = %event.event_type,
                    error = %e,
                    "event handler failed"
                );
                errors.push(format!("{}: {}", handler.name(), e));
            }
        }

        if !errors.is_empty() {
            return Err(DomainError::new(
                ErrorCode::EventDeliveryFailed,
                format!("Handler errors: {}", errors.join(", ")),
            ));
        }

        Ok(())
    }

    async fn publish_all(&self, events: Vec<EventEnvelope>) -> Result<(), DomainError> {
        for event in events {
            self.publish(event).await?;
        }
        Ok(())
    }
}

impl EventSubscriber for InMemoryEventBus {
    fn subscribe(&self, event_type: &str, handler: Arc<dyn EventHandler>) {
        self.subscribe_all(&[event_type], handler);
    }

    fn subscribe_all(&self, event_types: &[&str], handler: Arc<dyn EventHandler>) {
        let mut handlers = self
            .handlers
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        for event_type in event_types {
            handlers
                .entry(event_type.to_string())
                .or_default()
                .push(Arc::clone(&handler));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    fn envelope(event_type: &str, chat: &str) -> EventEnvelope {
        EventEnvelope::new(event_type, chat, "Conversation", json!({}))
    }

    struct CountingHandler(Arc<AtomicUsize>);

    #[async_trait]
    impl EventHandler for CountingHandler {
        async fn handle(&self, _: EventEnvelope) -> Result<(), DomainError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
        fn name(&self) -> &'static str {
            "CountingHandler"
        }
    }

    struct FailingHandler;

    #[async_trait]
    impl EventHandler for FailingHandler {
        async fn handle(&self, _: EventEnvelope) -> Result<(), DomainError> {
            Err(DomainError::new(ErrorCode::InternalError, "socket closed"))
        }
        fn name(&self) -> &'static str {
            "FailingHandler"
        }
    }

    #[tokio::test]
    async fn publish_stores_event() {
        let bus = InMemoryEventBus::new();
        bus.publish(envelope("conversation.message_received.v1", "a@c.us"))
            .await
            .unwrap();

        assert_eq!(bus.event_count(), 1);
        assert!(bus.has_event("conversation.message_received.v1"));
        assert!(!bus.has_event("conversation.message_sent.v1"));
    }

    #[tokio::test]
    async fn filters_by_type() {
        let bus = InMemoryEventBus::new();
        bus.publish(envelope("type.a", "chat-1")).await.unwrap();
        bus.publish(envelope("type.b", "chat-2")).await.unwrap();
        bus.publish(envelope("type.a", "chat-2")).await.unwrap();

        assert_eq!(bus.events_of_type("type.a").len(), 2);
        assert_eq!(bus.events_of_type("type.b").len(), 1);
    }

    #[tokio::test]
    async fn retention_drops_oldest() {
        let bus = InMemoryEventBus::with_retention(2);
        bus.publish(envelope("first", "c")).await.unwrap();
        bus.publish(envelope("second", "c")).await.unwrap();
        bus.publish(envelope("third", "c")).await.unwrap();

        let types: Vec<_> = bus
            .published_events()
            .into_iter()
            .map(|e| e.event_type)
            .collect();
        assert_eq!(types, vec!["second", "third"]);
    }

    #[tokio::test]
    async fn typed_and_wildcard_handlers_are_invoked() {
        let bus = InMemoryEventBus::new();
        let typed = Arc::new(AtomicUsize::new(0));
        let all = Arc::new(AtomicUsize::new(0));

        bus.subscribe("type.a", Arc::new(CountingHandler(typed.clone())));
        bus.subscribe(ALL_EVENTS, Arc::new(CountingHandler(all.clone())));

        bus.publish(envelope("type.a", "c")).await.unwrap();
        bus.publish(envelope("type.b", "c")).await.unwrap();

        assert_eq!(typed.load(Ordering::SeqCst), 1);
        assert_eq!(all.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn subscribe_all_registers_for_each_type() {
        let bus = InMemoryEventBus::new();
        let count = Arc::new(AtomicUsize::new(0));
        bus.subscribe_all(&["type.a", "type.b"], Arc::new(CountingHandler(count.clone())));

        bus.publish_all(vec![
            envelope("type.a", "1"),
            envelope("type.b", "2"),
            envelope("type.c", "3"),
        ])
        .await
        .unwrap();

        assert_eq!(count.load(Ordering::SeqCst), 2);
        assert_eq!(bus.event_count(), 3);
    }

    #[tokio::test]
    async fn failing_handler_does_not_starve_others() {
        let bus = InMemoryEventBus::new();
        let count = Arc::new(AtomicUsize::new(0));
        bus.subscribe("type.a", Arc::new(FailingHandler));
        bus.subscribe("type.a", Arc::new(CountingHandler(count.clone())));

        let err = bus.publish(envelope("type.a", "c")).await.unwrap_err();

        assert_eq!(err.code, ErrorCode::EventDeliveryFailed);
        assert!(err.message.contains("FailingHandler"));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn handlers_see_events_in_publish_order() {
        struct Recorder(Mutex<Vec<String>>);

        #[async_trait]
        impl EventHandler for Recorder {
            async fn handle(&self, event: EventEnvelope) -> Result<(), DomainError> {
                self.0.lock().unwrap().push(event.event_type);
                Ok(())
            }
            fn name(&self) -> &'static str {
                "Recorder"
            }
        }

        let bus = InMemoryEventBus::new();
        let recorder = Arc::new(Recorder(Mutex::new(Vec::new())));
        bus.subscribe(ALL_EVENTS, recorder.clone());

        for t in ["in", "advanced", "out"] {
            bus.publish(envelope(t, "c")).await.unwrap();
        }

        assert_eq!(*recorder.0.lock().unwrap(), vec!["in", "advanced", "out"]);
    }
}
