//! Dashboard push protocol.
//!
//! - Server → Client: connection status, bus events, pongs, lag notices
//! - Client → Server: pings

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{EventEnvelope, Timestamp};

/// All message types that can be sent from server to client.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Connected(ConnectedMessage),

    /// A domain event relayed from the bus.
    Event(DashboardUpdate),

    Pong(PongMessage),

    /// The client fell behind and missed `skipped` events.
    Lagged(LaggedMessage),
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectedMessage {
    pub client_id: String,
    pub timestamp: String,
}

/// One bus event as the dashboard sees it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardUpdate {
    pub event_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chat_id: Option<String>,
    pub data: serde_json::Value,
    pub timestamp: String,
}

impl From<&EventEnvelope> for DashboardUpdate {
    fn from(event: &EventEnvelope) -> Self {
        Self {
            event_type: event.event_type.clone(),
            chat_id: chat_of(event),
            data: event.payload.clone(),
            timestamp: event.occurred_at.as_datetime().to_rfc3339(),
        }
    }
}

/// Conversation events are keyed by chat; others carry it in the payload.
fn chat_of(event: &EventEnvelope) -> Option<String> {
    if event.aggregate_type == "Conversation" {
        return Some(event.aggregate_id.clone());
    }
    event
        .payload
        .get("chat_id")
        .and_then(|v| v.as_str())
        .map(str::to_string)
}

#[derive(Debug, Clone, Serialize)]
pub struct PongMessage {
    pub timestamp: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct LaggedMessage {
    pub skipped: u64,
}

impl PongMessage {
    pub fn now() -> Self {
        Self {
            timestamp: Timestamp::now().as_datetime().to_rfc3339(),
        }
    }
}

/// All message types that can be received from client.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Ping,
}
