//! EventSubscriber port - observers of conversation and alert events.

use async_trait::async_trait;
use std::sync::Arc;

use crate::domain::foundation::{DomainError, EventEnvelope};

/// Handler for published events.
///
/// Handlers run inline with the publisher, so they should hand long work
/// off to their own task.
///
/// # Example
///
/// ```ignore
/// #[async_trait]
/// impl EventHandler for DashboardBridge {
///     async fn handle(&self, event: EventEnvelope) -> Result<(), DomainError> {
///         self.sender.send(DashboardMessage::from(&event)).ok();
///         Ok(())
///     }
///
///     fn name(&self) -> &'static str {
///         "DashboardBridge"
///     }
/// }
/// ```
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, event: EventEnvelope) -> Result<(), DomainError>;

    /// Handler name for logs.
    fn name(&self) -> &'static str;
}

/// Registration side of the bus.
///
/// ```ignore
/// subscriber.subscribe("escalation.alert_raised.v1", forwarder);
/// subscriber.subscribe_all(&DASHBOARD_EVENTS, bridge);
/// ```
pub trait EventSubscriber: Send + Sync {
    fn subscribe(&self, event_type: &str, handler: Arc<dyn EventHandler>);

    fn subscribe_all(&self, event_types: &[&str], handler: Arc<dyn EventHandler>);
}

/// Publisher and subscriber in one; the notification bus.
pub trait EventBus: super::EventPublisher + EventSubscriber {}

impl<T: super::EventPublisher + EventSubscriber> EventBus for T {}
