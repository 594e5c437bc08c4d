//! Order-in-progress captured during the funnel.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{text, Timestamp};

/// Lifecycle of an order. Serialized with the labels operators see.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum OrderStatus {
    #[default]
    #[serde(rename = "Borrador")]
    Draft,
    #[serde(rename = "Pendiente")]
    Pending,
    #[serde(rename = "Confirmado")]
    Confirmed,
    #[serde(rename = "Cancelado")]
    Cancelled,
}

impl OrderStatus {
    pub fn label(&self) -> &'static str {
        match self {
            OrderStatus::Draft => "Borrador",
            OrderStatus::Pending => "Pendiente",
            OrderStatus::Confirmed => "Confirmado",
            OrderStatus::Cancelled => "Cancelado",
        }
    }

    /// Whether an operator still has to confirm or discard it.
    pub fn awaits_confirmation(&self) -> bool {
        matches!(self, OrderStatus::Pending)
    }
}

/// Postal code ranges and the provinces they cover.
const PROVINCES: [(u16, u16, &str); 11] = [
    (1000, 1999, "Buenos Aires / CABA"),
    (2000, 2999, "Santa Fe"),
    (3000, 3699, "Entre Ríos / Corrientes / Misiones"),
    (3700, 3899, "Chaco / Formosa"),
    (4000, 4699, "Tucumán / Salta / Jujuy / Catamarca / Santiago del Estero"),
    (4700, 4999, "Catamarca / La Rioja"),
    (5000, 5999, "Córdoba / San Luis / Mendoza"),
    (6000, 6999, "Buenos Aires (Interior)"),
    (7000, 7999, "Buenos Aires (Costa / Sur)"),
    (8000, 8999, "Buenos Aires (Sur) / La Pampa / Neuquén / Río Negro"),
    (9000, 9999, "Chubut / Santa Cruz / Tierra del Fuego"),
];

/// A 4-digit postal code and the province it maps to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostalCode {
    pub code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub province: Option<String>,
}

impl PostalCode {
    /// Validates a 4-digit code in the national range.
    pub fn parse(raw: &str) -> Option<Self> {
        let code: String = raw.chars().filter(char::is_ascii_digit).collect();
        if code.len() != 4 {
            return None;
        }
        let number: u16 = code.parse().ok()?;
        let province = PROVINCES
            .iter()
            .find(|(min, max, _)| (*min..=*max).contains(&number))
            .map(|(_, _, name)| name.to_string())?;
        Some(Self {
            code,
            province: Some(province),
        })
    }

    /// Finds the postal code inside a free-text address.
    ///
    /// A code written after "cp" or "codigo postal" wins; otherwise the last
    /// valid 4-digit run is taken (street numbers usually come first).
    pub fn extract(address: &str) -> Option<Self> {
        let normalized = text::normalize(address);
        for marker in ["codigo postal", "cp"] {
            if let Some(pos) = normalized.rfind(marker) {
                let tail = &normalized[pos + marker.len()..];
                if let Some(run) = text::digit_runs(tail).first() {
                    if let Some(code) = Self::parse(run) {
                        return Some(code);
                    }
                }
            }
        }
        text::digit_runs(&normalized)
            .into_iter()
            .rev()
            .filter(|run| run.len() == 4)
            .find_map(Self::parse)
    }
}

/// Order data accumulated while the customer moves through the funnel.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub postal_code: Option<PostalCode>,
    #[serde(default)]
    pub status: OrderStatus,
    /// When the order last became pending.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submitted_at: Option<Timestamp>,
}

impl OrderData {
    pub fn for_product(product: impl Into<String>) -> Self {
        Self {
            product: Some(product.into()),
            ..Self::default()
        }
    }

    /// One-line summary used in alerts and confirmation messages.
    pub fn summary(&self) -> String {
        let mut parts = Vec::new();
        if let Some(product) = &self.product {
            parts.push(product.clone());
        }
        if let Some(plan) = &self.plan {
            parts.push(format!("{} días", plan));
        }
        if let Some(price) = &self.price {
            parts.push(format!("${}", price));
        }
        if let Some(address) = &self.address {
            parts.push(address.clone());
        }
        if let Some(PostalCode {
            province: Some(province),
            ..
        }) = &self.postal_code
        {
            parts.push(province.clone());
        }
        if parts.is_empty() {
            format!("sin datos ({})", self.status.label())
        } else {
            format!("{} ({})", parts.join(" | "), self.status.label())
        }
    }
}
