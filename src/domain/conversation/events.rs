//! Conversation domain events.
//!
//! - `MessageReceived` - Inbound customer message recorded
//! - `MessageSent` - Outbound message delivered (bot or operator)
//! - `StepAdvanced` - Session moved to another funnel step
//! - `ConversionRecorded` - Session reached `completed` for the first time
//! - `OrderConfirmed` - Operator confirmed the pending order
//! - `PauseToggled` - Bot disabled or re-enabled for a chat
//! - `SessionReset` - Session cleared by an operator

use serde::{Deserialize, Serialize};

use super::message::Role;
use super::order::OrderData;
use crate::domain::foundation::{ChatId, EventId, Timestamp};
use crate::domain::script::{ScriptVersionName, StepRef};
use crate::domain_event;

// ════════════════════════════════════════════════════════════════════════════
// Messages
// ════════════════════════════════════════════════════════════════════════════

/// Published when an inbound message has been appended to history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageReceived {
    pub event_id: EventId,
    pub chat_id: ChatId,
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<String>,
    /// True when the bot stayed silent because the chat is paused.
    pub while_paused: bool,
    pub received_at: Timestamp,
}

domain_event!(
    MessageReceived,
    event_type = "conversation.message_received.v1",
    aggregate_id = chat_id,
    aggregate_type = "Conversation",
    occurred_at = received_at,
    event_id = event_id
);

/// Published after an outbound message was handed to the transport.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageSent {
    pub event_id: EventId,
    pub chat_id: ChatId,
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media: Option<String>,
    pub sent_at: Timestamp,
}

domain_event!(
    MessageSent,
    event_type = "conversation.message_sent.v1",
    aggregate_id = chat_id,
    aggregate_type = "Conversation",
    occurred_at = sent_at,
    event_id = event_id
);

// ════════════════════════════════════════════════════════════════════════════
// Funnel progress
// ════════════════════════════════════════════════════════════════════════════

/// Published when a session changes step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepAdvanced {
    pub event_id: EventId,
    pub chat_id: ChatId,
    pub script_version: ScriptVersionName,
    pub from: StepRef,
    pub to: StepRef,
    pub advanced_at: Timestamp,
}

domain_event!(
    StepAdvanced,
    event_type = "conversation.step_advanced.v1",
    aggregate_id = chat_id,
    aggregate_type = "Conversation",
    occurred_at = advanced_at,
    event_id = event_id
);

/// Published once per session, when it first reaches `completed`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionRecorded {
    pub event_id: EventId,
    pub chat_id: ChatId,
    pub script_version: ScriptVersionName,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<OrderData>,
    pub converted_at: Timestamp,
}

domain_event!(
    ConversionRecorded,
    event_type = "conversation.conversion_recorded.v1",
    aggregate_id = chat_id,
    aggregate_type = "Conversation",
    occurred_at = converted_at,
    event_id = event_id
);

/// Published when an operator confirms the chat's pending order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderConfirmed {
    pub event_id: EventId,
    pub chat_id: ChatId,
    pub order: OrderData,
    pub confirmed_at: Timestamp,
}

domain_event!(
    OrderConfirmed,
    event_type = "conversation.order_confirmed.v1",
    aggregate_id = chat_id,
    aggregate_type = "Conversation",
    occurred_at = confirmed_at,
    event_id = event_id
);

// ════════════════════════════════════════════════════════════════════════════
// Operator control
// ════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PauseToggled {
    pub event_id: EventId,
    pub chat_id: ChatId,
    pub paused: bool,
    pub toggled_at: Timestamp,
}

domain_event!(
    PauseToggled,
    event_type = "conversation.pause_toggled.v1",
    aggregate_id = chat_id,
    aggregate_type = "Conversation",
    occurred_at = toggled_at,
    event_id = event_id
);

/// Published when a session is cleared. In-flight work of the previous
/// generation is discarded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionReset {
    pub event_id: EventId,
    pub chat_id: ChatId,
    pub generation: u64,
    pub reset_at: Timestamp,
}

domain_event!(
    SessionReset,
    event_type = "conversation.session_reset.v1",
    aggregate_id = chat_id,
    aggregate_type = "Conversation",
    occurred_at = reset_at,
    event_id = event_id
);
