//! HTTP handlers for the order ledger.

use axum::{
    extract::{Path, State},
    Json,
};

use crate::adapters::http::{ApiError, AppState};
use crate::domain::foundation::{DomainError, ErrorCode, OrderId};

use super::dto::{OrderResponse, OrdersResponse, UpdateOrderRequest, UpdateOrderResponse};

/// GET /api/orders - Ledger entries, newest first
pub async fn list_orders(State(state): State<AppState>) -> Result<Json<OrdersResponse>, ApiError> {
    let mut records = state.engine().list_orders().await?;
    records.sort_by(|a, b| b.created_at().cmp(a.created_at()));
    let items: Vec<OrderResponse> = records.iter().map(Into::into).collect();
    Ok(Json(OrdersResponse {
        total: items.len(),
        items,
    }))
}

/// POST /api/orders/:id/status
///
/// An id that does not parse cannot name an entry and answers 404.
pub async fn post_order_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<UpdateOrderRequest>,
) -> Result<Json<UpdateOrderResponse>, ApiError> {
    let id: OrderId = id.parse().map_err(|_| {
        DomainError::new(ErrorCode::OrderNotFound, format!("order {id} not found"))
    })?;
    let record = state
        .engine()
        .update_order(&id, req.status, req.tracking)
        .await?;
    Ok(Json(UpdateOrderResponse {
        success: true,
        order: (&record).into(),
    }))
}
