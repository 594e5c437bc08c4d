//! HTTP DTOs for the operator dashboard.
//!
//! These types decouple the HTTP API from domain types, allowing independent evolution.

use serde::{Deserialize, Serialize};

use crate::application::{OutboundMessage, TurnOutcome};
use crate::domain::conversation::{ConversationState, HistoryEntry, OrderData, Role};
use crate::domain::escalation::{Alert, AlertReason, AlertStatus};
use crate::domain::script::AllocationMode;
use crate::domain::variant::VariantStats;

// ════════════════════════════════════════════════════════════════════════════
// Request DTOs
// ════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Deserialize)]
pub struct CommandRequest {
    pub command: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PauseRequest {
    pub paused: bool,
}

// ════════════════════════════════════════════════════════════════════════════
// Response DTOs
// ════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub workers: usize,
    pub dashboard_clients: usize,
}

/// One row of the session list.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSummaryResponse {
    pub chat_id: String,
    pub script_version: String,
    pub step: String,
    pub is_paused: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_status: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pending_alert_id: Option<String>,
    pub message_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_message: Option<HistoryEntry>,
    pub conversion_counted: bool,
    pub last_activity_at: String,
}

impl From<&ConversationState> for SessionSummaryResponse {
    fn from(state: &ConversationState) -> Self {
        Self {
            chat_id: state.chat_id().to_string(),
            script_version: state.script_version().to_string(),
            step: state.current_step().to_string(),
            is_paused: state.is_paused(),
            order_status: state.order().map(|o| o.status.label()),
            pending_alert_id: state.pending_alert_id().map(|id| id.to_string()),
            message_count: state.history().len(),
            last_message: state.history().last().cloned(),
            conversion_counted: state.conversion_counted(),
            last_activity_at: state.last_activity_at().as_datetime().to_rfc3339(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionListResponse {
    pub items: Vec<SessionSummaryResponse>,
    pub total: usize,
}

/// Full session with history.
#[derive(Debug, Clone, Serialize)]
pub struct SessionResponse {
    #[serde(flatten)]
    pub summary: SessionSummaryResponse,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<OrderData>,
    pub history: Vec<HistoryEntry>,
    pub created_at: String,
}

impl From<&ConversationState> for SessionResponse {
    fn from(state: &ConversationState) -> Self {
        Self {
            summary: state.into(),
            order: state.order().cloned(),
            history: state.history().to_vec(),
            created_at: state.created_at().as_datetime().to_rfc3339(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct OutboundResponse {
    pub role: Role,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media: Option<String>,
}

impl From<OutboundMessage> for OutboundResponse {
    fn from(message: OutboundMessage) -> Self {
        Self {
            role: message.role,
            text: message.text,
            media: message.media,
        }
    }
}

/// Result of an admin command.
#[derive(Debug, Clone, Serialize)]
pub struct CommandResponse {
    pub chat_id: String,
    pub command: &'static str,
    pub outbound: Vec<OutboundResponse>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step: Option<String>,
    pub discarded: bool,
}

impl CommandResponse {
    pub fn new(chat_id: String, command: &'static str, outcome: TurnOutcome) -> Self {
        Self {
            chat_id,
            command,
            step: outcome.step.map(|s| s.to_string()),
            discarded: outcome.discarded,
            outbound: outcome.outbound.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PauseResponse {
    pub chat_id: String,
    pub paused: bool,
    pub changed: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResetResponse {
    pub chat_id: String,
    pub existed: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct AlertResponse {
    pub id: String,
    pub chat_id: String,
    pub reason: AlertReason,
    pub description: &'static str,
    pub details: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<OrderData>,
    pub status: AlertStatus,
    pub created_at: String,
    pub updated_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolution: Option<String>,
}

impl From<Alert> for AlertResponse {
    fn from(alert: Alert) -> Self {
        Self {
            id: alert.id().to_string(),
            chat_id: alert.chat_id().to_string(),
            reason: alert.reason(),
            description: alert.reason().description(),
            details: alert.details().to_string(),
            order: alert.order().cloned(),
            status: alert.status(),
            created_at: alert.created_at().as_datetime().to_rfc3339(),
            updated_at: alert.updated_at().as_datetime().to_rfc3339(),
            resolution: alert.resolution().map(str::to_string),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AlertsResponse {
    pub open: Vec<AlertResponse>,
    pub resolved: Vec<AlertResponse>,
}

#[derive(Debug, Clone, Serialize)]
pub struct VersionStatsResponse {
    pub version: String,
    pub started: u64,
    pub completed: u64,
    pub conversion_rate: f64,
}

impl VersionStatsResponse {
    pub fn new(version: String, stats: VariantStats) -> Self {
        Self {
            version,
            started: stats.started,
            completed: stats.completed,
            conversion_rate: stats.conversion_rate(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    pub mode: AllocationMode,
    pub versions: Vec<VersionStatsResponse>,
}
