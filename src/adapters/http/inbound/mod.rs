//! HTTP adapter for messages pushed by the chat gateway.

mod dto;
mod handlers;
pub mod signature;

pub use dto::{InboundDisposition, InboundRequest, InboundResponse};

use axum::{routing::post, Router};

use crate::adapters::http::AppState;

pub fn inbound_routes() -> Router<AppState> {
    Router::new().route("/api/inbound", post(handlers::receive_message))
}
