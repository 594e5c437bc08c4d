//! Application layer - the dialogue engine and the services around it.
//!
//! - [`ScriptLibrary`] / [`PriceBook`] - read-mostly documents swapped atomically
//! - [`VariantAllocator`] - A/B counters owned by one task
//! - [`EscalationManager`] - alerts and admin-number forwarding
//! - [`DialogueEngine`] - one turn of one chat
//! - [`runtime`] - per-chat workers and the write-behind flusher

mod allocator;
mod engine;
mod escalation;
mod generation;
mod library;
pub mod runtime;

pub use allocator::{AllocatorError, VariantAllocator};
pub use engine::{
    DialogueEngine, EngineDeps, EngineError, EngineSettings, OutboundMessage, TurnOutcome,
};
pub use escalation::{EscalationError, EscalationManager, EscalationSettings};
pub use generation::GenerationToken;
pub use library::{LibraryError, PriceBook, ScriptLibrary};

use crate::domain::foundation::SerializableDomainEvent;
use crate::ports::EventPublisher;

/// Publishes one event. Delivery problems are logged; state already changed.
pub(crate) async fn publish<E: SerializableDomainEvent>(publisher: &dyn EventPublisher, event: &E) {
    let envelope = match event.to_envelope() {
        Ok(envelope) => envelope,
        Err(error) => {
            tracing::error!(event_type = event.event_type(), %error, "failed to serialize event");
            return;
        }
    };
    if let Err(error) = publisher.publish(envelope).await {
        tracing::warn!(event_type = event.event_type(), %error, "event delivery failed");
    }
}
