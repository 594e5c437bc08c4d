//! Ports - contracts between the dialogue domain and the outside world.
//!
//! ## Storage
//!
//! - `SessionStore` - per-chat conversation state with compare-and-set writes
//! - `SessionArchive` - durable backend behind the write-behind session store
//! - `ScriptStore`, `PriceStore`, `StatsStore`, `OrderStore` - whole-document JSON stores
//!
//! ## Collaborators
//!
//! - `ReplyGenerator` - AI reply drafting, unreliable by contract
//! - `MessageTransport` - outbound text and media to a chat
//!
//! ## Events
//!
//! - `EventPublisher`, `EventSubscriber`, `EventHandler`, `EventBus`

mod document_store;
mod event_publisher;
mod event_subscriber;
mod reply_generator;
mod session_store;
mod transport;

pub use document_store::{OrderStore, PriceStore, ScriptStore, StatsStore, StoreError};
pub use event_publisher::EventPublisher;
pub use event_subscriber::{EventBus, EventHandler, EventSubscriber};
pub use reply_generator::{PromptMessage, PromptRole, ReplyError, ReplyGenerator, ReplyRequest};
pub use session_store::{SessionArchive, SessionStore, SessionStoreError};
pub use transport::{MessageTransport, TransportError};
