//! HTTP routes for the order ledger.

use axum::{
    routing::{get, post},
    Router,
};

use crate::adapters::http::AppState;

use super::handlers::{list_orders, post_order_status};

pub fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/api/orders", get(list_orders))
        .route("/api/orders/:id/status", post(post_order_status))
}
