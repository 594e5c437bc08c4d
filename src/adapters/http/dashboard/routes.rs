//! HTTP routes for the operator dashboard.

use axum::{
    routing::{get, post},
    Router,
};

use crate::adapters::http::AppState;

use super::handlers::{
    get_session, get_stats, health, list_alerts, list_sessions, post_command, post_pause,
    post_reset,
};

pub fn dashboard_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/api/sessions", get(list_sessions))
        .route("/api/sessions/:chat_id", get(get_session))
        .route("/api/sessions/:chat_id/command", post(post_command))
        .route("/api/sessions/:chat_id/pause", post(post_pause))
        .route("/api/sessions/:chat_id/reset", post(post_reset))
        .route("/api/alerts", get(list_alerts))
        .route("/api/stats", get(get_stats))
}
