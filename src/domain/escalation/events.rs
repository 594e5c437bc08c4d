//! Escalation domain events.

use serde::{Deserialize, Serialize};

use super::alert::AlertReason;
use crate::domain::conversation::OrderData;
use crate::domain::foundation::{AlertId, ChatId, EventId, Timestamp};
use crate::domain_event;

/// Published when an alert opens, and again each time an open alert is
/// refreshed (`refreshed = true`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertRaised {
    pub event_id: EventId,
    pub alert_id: AlertId,
    pub chat_id: ChatId,
    pub reason: AlertReason,
    pub details: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<OrderData>,
    pub refreshed: bool,
    pub raised_at: Timestamp,
}

domain_event!(
    AlertRaised,
    event_type = "escalation.alert_raised.v1",
    aggregate_id = alert_id,
    aggregate_type = "Alert",
    occurred_at = raised_at,
    event_id = event_id
);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertResolved {
    pub event_id: EventId,
    pub alert_id: AlertId,
    pub chat_id: ChatId,
    pub resolution: String,
    pub resolved_at: Timestamp,
}

domain_event!(
    AlertResolved,
    event_type = "escalation.alert_resolved.v1",
    aggregate_id = alert_id,
    aggregate_type = "Alert",
    occurred_at = resolved_at,
    event_id = event_id
);
