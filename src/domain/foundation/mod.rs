//! Foundation module - Shared domain primitives.
//!
//! Contains identifiers, timestamps, error types, the event envelope
//! and the text helpers used by the sales dialogue domain.

mod errors;
mod events;
mod ids;
pub mod text;
mod timestamp;

pub use errors::{DomainError, ErrorCode, ValidationError};
pub use events::{DomainEvent, EventEnvelope, EventId, SerializableDomainEvent};
pub use ids::{AlertId, ChatId, OrderId};
pub use timestamp::Timestamp;
