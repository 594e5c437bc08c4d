//! Adapters - Implementations of port interfaces.
//!
//! Adapters connect the engine to external systems:
//! - `ai` - reply generators (OpenAI-compatible HTTP, mock, disabled)
//! - `storage` - JSON files and in-memory stores, write-behind sessions
//! - `transport` - outbound chat gateway (webhook, logging, recording)
//! - `events` - in-process event bus
//! - `http` - admin API and inbound webhook
//! - `websocket` - live dashboard push

pub mod ai;
pub mod events;
pub mod http;
pub mod storage;
pub mod transport;
pub mod websocket;

pub use events::InMemoryEventBus;
