//! WebSocket push for the operator dashboard.
//!
//! - [`event_bridge`] - bus subscriber that fans events out to clients
//! - [`handler`] - axum upgrade handler for `/api/live`
//! - [`messages`] - wire protocol

pub mod event_bridge;
pub mod handler;
pub mod messages;

pub use event_bridge::{DashboardBridge, DASHBOARD_EVENT_TYPES, DEFAULT_CAPACITY};
pub use handler::live_handler;
pub use messages::{ClientMessage, DashboardUpdate, ServerMessage};
