use axum::{
    routing::{get, post},
    Router,
};

use crate::adapters::http::AppState;

use super::handlers::{get_prices, get_script, list_scripts, post_mode, put_prices, put_script};

/// Script versions, allocation mode and the price catalog.
pub fn script_routes() -> Router<AppState> {
    Router::new()
        .route("/api/scripts", get(list_scripts))
        .route("/api/scripts/mode", post(post_mode))
        .route("/api/scripts/:version", get(get_script).put(put_script))
        .route("/api/prices", get(get_prices).put(put_prices))
}
