//! Event bus adapters.
//!
//! - `InMemoryEventBus` - in-process notification bus with a retained tail

mod in_memory;

pub use in_memory::{InMemoryEventBus, ALL_EVENTS};
