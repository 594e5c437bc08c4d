//! EventPublisher port - how the engine announces state changes.
//!
//! The dialogue engine and escalation manager publish envelopes here; the
//! dashboard bridge and tests observe them through an `EventSubscriber`.

use async_trait::async_trait;

use crate::domain::foundation::{DomainError, EventEnvelope};

/// Port for publishing domain events.
///
/// Implementations must ensure:
/// - Events of one chat reach subscribers in publish order
/// - Every subscriber runs even when an earlier one fails; the failures
///   are reported together afterwards
///
/// # Example
///
/// ```ignore
/// let event = step_advanced.to_envelope()?;
/// publisher.publish(event).await?;
/// ```
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, event: EventEnvelope) -> Result<(), DomainError>;

    /// Publishes in order; stops at the first error.
    async fn publish_all(&self, events: Vec<EventEnvelope>) -> Result<(), DomainError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[allow(dead_code)]
    fn assert_object_safe(_: &dyn EventPublisher) {}

    #[test]
    fn event_publisher_is_send_sync() {
        fn assert_send_sync<T: Send + Sync + ?Sized>() {}
        assert_send_sync::<dyn EventPublisher>();
    }
}
