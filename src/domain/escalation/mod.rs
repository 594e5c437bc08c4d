//! Escalation domain module.
//!
//! Alerts flag chats that need an operator; admin commands are what
//! operators send back.
//!
//! # Events
//!
//! - `AlertRaised` - Alert opened or refreshed
//! - `AlertResolved` - Alert closed by a command or a reset

mod alert;
mod command;
mod events;

pub use alert::{Alert, AlertBook, AlertReason, AlertStatus, RaiseOutcome};
pub use command::{confirmation_message, AdminCommand, MAX_INSTRUCTION_LEN};
pub use events::{AlertRaised, AlertResolved};
