//! HTTP handlers for sessions, alerts and statistics.
//!
//! Writes that touch a chat (commands, pause, reset) go through the chat's
//! worker queue, so they are ordered with its inbound messages.

use axum::{
    extract::{Path, State},
    Json,
};

use crate::adapters::http::{ApiError, AppState};
use crate::domain::escalation::AdminCommand;
use crate::domain::foundation::ChatId;
use crate::ports::SessionStoreError;

use super::dto::{
    AlertsResponse, CommandRequest, CommandResponse, HealthResponse, PauseRequest,
    PauseResponse, ResetResponse, SessionListResponse, SessionResponse,
    SessionSummaryResponse, StatsResponse, VersionStatsResponse,
};

/// GET /health
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        workers: state.dispatcher.active_workers(),
        dashboard_clients: state.bridge.client_count(),
    })
}

/// GET /api/sessions - Session summaries, most recently active first
pub async fn list_sessions(
    State(state): State<AppState>,
) -> Result<Json<SessionListResponse>, ApiError> {
    let sessions = state.engine().sessions().list().await?;
    let items: Vec<SessionSummaryResponse> = sessions.iter().map(Into::into).collect();
    Ok(Json(SessionListResponse {
        total: items.len(),
        items,
    }))
}

/// GET /api/sessions/:chat_id - Full session with history
pub async fn get_session(
    State(state): State<AppState>,
    Path(chat_id): Path<String>,
) -> Result<Json<SessionResponse>, ApiError> {
    let chat_id = ChatId::new(chat_id)?;
    let session = state
        .engine()
        .sessions()
        .get(&chat_id)
        .await?
        .ok_or(SessionStoreError::NotFound(chat_id))?;
    Ok(Json((&session).into()))
}

/// POST /api/sessions/:chat_id/command
pub async fn post_command(
    State(state): State<AppState>,
    Path(chat_id): Path<String>,
    Json(req): Json<CommandRequest>,
) -> Result<Json<CommandResponse>, ApiError> {
    let chat_id = ChatId::new(chat_id)?;
    let command = AdminCommand::parse(&req.command)?;
    let label = command.label();
    let outcome = state.dispatcher.admin_command(&chat_id, command).await?;
    Ok(Json(CommandResponse::new(chat_id.to_string(), label, outcome)))
}

/// POST /api/sessions/:chat_id/pause
pub async fn post_pause(
    State(state): State<AppState>,
    Path(chat_id): Path<String>,
    Json(req): Json<PauseRequest>,
) -> Result<Json<PauseResponse>, ApiError> {
    let chat_id = ChatId::new(chat_id)?;
    let changed = state.dispatcher.set_paused(&chat_id, req.paused).await?;
    Ok(Json(PauseResponse {
        chat_id: chat_id.to_string(),
        paused: req.paused,
        changed,
    }))
}

/// POST /api/sessions/:chat_id/reset
pub async fn post_reset(
    State(state): State<AppState>,
    Path(chat_id): Path<String>,
) -> Result<Json<ResetResponse>, ApiError> {
    let chat_id = ChatId::new(chat_id)?;
    let existed = state.dispatcher.reset(&chat_id).await?;
    Ok(Json(ResetResponse {
        chat_id: chat_id.to_string(),
        existed,
    }))
}

/// GET /api/alerts - Open alerts and recently resolved ones
pub async fn list_alerts(State(state): State<AppState>) -> Json<AlertsResponse> {
    let escalation = state.engine().escalation();
    Json(AlertsResponse {
        open: escalation.open_alerts().into_iter().map(Into::into).collect(),
        resolved: escalation
            .resolved_alerts()
            .into_iter()
            .map(Into::into)
            .collect(),
    })
}

/// GET /api/stats - Per-version counters and the allocation mode
///
/// Every loaded version is listed, including ones nobody was assigned yet.
pub async fn get_stats(State(state): State<AppState>) -> Result<Json<StatsResponse>, ApiError> {
    let engine = state.engine();
    let registry = engine.scripts().snapshot();
    let document = engine.allocator().snapshot().await?;

    let mut names = registry.names();
    for name in document.versions.keys() {
        if !names.contains(name) {
            names.push(name.clone());
        }
    }
    names.sort();

    let versions = names
        .into_iter()
        .map(|name| {
            let stats = document.stats(&name);
            VersionStatsResponse::new(name.to_string(), stats)
        })
        .collect();
    Ok(Json(StatsResponse {
        mode: registry.mode().clone(),
        versions,
    }))
}
