//! Domain layer containing business logic and domain types.
//!
//! # Module Organization
//!
//! - `foundation` - Shared primitives (IDs, timestamps, errors, events, text matching)
//! - `script` - Script versions, flow steps, FAQ entries and the version registry
//! - `pricing` - Price catalog and template rendering
//! - `conversation` - Per-chat state, history, orders and their events
//! - `dialogue` - Classification of inbound messages against the funnel
//! - `escalation` - Alerts and operator commands
//! - `variant` - A/B allocation counters and sticky assignments

pub mod conversation;
pub mod dialogue;
pub mod escalation;
pub mod foundation;
pub mod pricing;
pub mod script;
pub mod variant;
