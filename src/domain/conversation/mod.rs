//! Conversation domain module.
//!
//! One [`ConversationState`] per chat: funnel position, sticky script
//! version, append-only history, pause flag and the order being built.
//! Confirmed orders move on to the ledger as [`OrderRecord`]s.
//!
//! # Events
//!
//! - `MessageReceived` / `MessageSent` - history grew
//! - `StepAdvanced` - funnel step changed
//! - `ConversionRecorded` - first arrival at `completed`
//! - `OrderConfirmed` - operator accepted the order
//! - `PauseToggled` - bot disabled or re-enabled
//! - `SessionReset` - session cleared

mod changes;
mod events;
mod ledger;
mod message;
mod order;
mod state;

pub use changes::{SessionChange, SessionTransaction};
pub use events::{
    ConversionRecorded, MessageReceived, MessageSent, OrderConfirmed, PauseToggled, SessionReset,
    StepAdvanced,
};
pub use ledger::{FulfillmentStatus, OrderRecord, OrderUpdate};
pub use message::{HistoryEntry, Role};
pub use order::{OrderData, OrderStatus, PostalCode};
pub use state::ConversationState;
