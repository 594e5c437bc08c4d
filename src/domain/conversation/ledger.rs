//! Order ledger: confirmed orders as fulfillment tracks them.

use serde::{Deserialize, Serialize};

use super::order::OrderData;
use crate::domain::foundation::{ChatId, OrderId, Timestamp};

/// Fulfillment stage of a ledger entry, with the labels operators see.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FulfillmentStatus {
    #[serde(rename = "Pendiente")]
    Pending,
    /// Confirmed by the scheduler because nobody reviewed it in time.
    #[serde(rename = "Auto-aprobado (sin revisión manual)")]
    AutoApproved,
    #[serde(rename = "Enviado")]
    Shipped,
    #[serde(rename = "Entregado")]
    Delivered,
    #[serde(rename = "Cancelado")]
    Cancelled,
}

impl FulfillmentStatus {
    pub fn label(&self) -> &'static str {
        match self {
            FulfillmentStatus::Pending => "Pendiente",
            FulfillmentStatus::AutoApproved => "Auto-aprobado (sin revisión manual)",
            FulfillmentStatus::Shipped => "Enviado",
            FulfillmentStatus::Delivered => "Entregado",
            FulfillmentStatus::Cancelled => "Cancelado",
        }
    }
}

/// A status change requested from the dashboard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderUpdate {
    pub status: FulfillmentStatus,
    /// Replaces the tracking code when present.
    pub tracking: Option<String>,
    pub at: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRecord {
    id: OrderId,
    chat_id: ChatId,
    order: OrderData,
    status: FulfillmentStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tracking: Option<String>,
    created_at: Timestamp,
    updated_at: Timestamp,
}

impl OrderRecord {
    pub fn new(chat_id: ChatId, order: OrderData, status: FulfillmentStatus) -> Self {
        let now = Timestamp::now();
        Self {
            id: OrderId::new(),
            chat_id,
            order,
            status,
            tracking: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn id(&self) -> OrderId {
        self.id
    }

    pub fn chat_id(&self) -> &ChatId {
        &self.chat_id
    }

    pub fn order(&self) -> &OrderData {
        &self.order
    }

    pub fn status(&self) -> FulfillmentStatus {
        self.status
    }

    pub fn tracking(&self) -> Option<&str> {
        self.tracking.as_deref()
    }

    pub fn created_at(&self) -> &Timestamp {
        &self.created_at
    }

    pub fn updated_at(&self) -> &Timestamp {
        &self.updated_at
    }

    pub fn apply(&mut self, update: &OrderUpdate) {
        self.status = update.status;
        if let Some(tracking) = update.tracking.as_deref().map(str::trim) {
            self.tracking = (!tracking.is_empty()).then(|| tracking.to_string());
        }
        self.updated_at = update.at;
    }
}
