//! HTTP adapters - the admin API and the inbound webhook.
//!
//! - `dashboard` - sessions, operator commands, alerts, statistics
//! - `scripts` - script authoring, allocation mode, prices
//! - `orders` - the order ledger and fulfillment status
//! - `inbound` - signed messages pushed by the chat gateway
//!
//! `/api/live` streams dashboard updates over a WebSocket.

pub mod dashboard;
mod error;
pub mod inbound;
pub mod orders;
pub mod scripts;

pub use error::{status_for, ApiError, ErrorResponse};

use std::sync::Arc;

use axum::{extract::FromRef, http::HeaderValue, http::Method, routing::get, Router};
use secrecy::Secret;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::adapters::websocket::{live_handler, DashboardBridge};
use crate::application::runtime::ChatDispatcher;
use crate::application::DialogueEngine;
use crate::config::ServerConfig;

/// Shared state for every route.
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<ChatDispatcher>,
    pub bridge: Arc<DashboardBridge>,
    /// Unset disables signature checks on `/api/inbound`.
    pub inbound_secret: Option<Secret<String>>,
}

impl AppState {
    pub fn engine(&self) -> &Arc<DialogueEngine> {
        self.dispatcher.engine()
    }
}

impl FromRef<AppState> for Arc<DashboardBridge> {
    fn from_ref(state: &AppState) -> Self {
        state.bridge.clone()
    }
}

/// Builds the complete router. Every request gets an `x-request-id`, echoed
/// on the response.
pub fn api_router(state: AppState, server: &ServerConfig) -> Router {
    Router::new()
        .merge(dashboard::dashboard_routes())
        .merge(scripts::script_routes())
        .merge(orders::order_routes())
        .merge(inbound::inbound_routes())
        .route("/api/live", get(live_handler))
        .with_state(state)
        .layer(CompressionLayer::new())
        .layer(TimeoutLayer::new(server.request_timeout()))
        .layer(cors_layer(&server.cors_origins_list()))
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
        .allow_headers(Any);
    if origins.is_empty() {
        return layer.allow_origin(Any);
    }
    let origins: Vec<HeaderValue> = origins.iter().filter_map(|o| o.parse().ok()).collect();
    layer.allow_origin(origins)
}
