//! HTTP DTOs for the order ledger.

use serde::{Deserialize, Serialize};

use crate::domain::conversation::{FulfillmentStatus, OrderData, OrderRecord};

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateOrderRequest {
    /// Operator label, e.g. "Enviado".
    pub status: FulfillmentStatus,
    /// Empty clears the stored code; absent keeps it.
    #[serde(default)]
    pub tracking: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct OrderResponse {
    pub id: String,
    pub chat_id: String,
    pub order: OrderData,
    pub status: FulfillmentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tracking: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<&OrderRecord> for OrderResponse {
    fn from(record: &OrderRecord) -> Self {
        Self {
            id: record.id().to_string(),
            chat_id: record.chat_id().to_string(),
            order: record.order().clone(),
            status: record.status(),
            tracking: record.tracking().map(str::to_string),
            created_at: record.created_at().as_datetime().to_rfc3339(),
            updated_at: record.updated_at().as_datetime().to_rfc3339(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct OrdersResponse {
    pub items: Vec<OrderResponse>,
    pub total: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct UpdateOrderResponse {
    pub success: bool,
    pub order: OrderResponse,
}
