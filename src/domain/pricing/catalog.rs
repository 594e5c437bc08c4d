//! Current prices and flat fees used when rendering replies.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::domain::foundation::{text, ValidationError};

/// Prices per product per plan, plus flat fees. Values are display strings
/// in local format ("46.900").
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceCatalog {
    #[serde(default)]
    pub products: BTreeMap<String, BTreeMap<String, String>>,

    /// Surcharge for the larger presentation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_max: Option<String>,

    /// Fee charged when a delivery is rejected or not collected.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logistics_fee: Option<String>,
}

impl PriceCatalog {
    /// The catalog shipped with a fresh installation.
    pub fn with_defaults() -> Self {
        let mut catalog = Self {
            products: BTreeMap::new(),
            additional_max: Some(super::DEFAULT_ADDITIONAL_MAX.to_string()),
            logistics_fee: Some(super::DEFAULT_LOGISTICS_FEE.to_string()),
        };
        for (product, plan, price) in super::DEFAULT_PRICES {
            catalog
                .products
                .entry(product.to_string())
                .or_default()
                .insert(plan.to_string(), price.to_string());
        }
        catalog
    }

    /// Finds the catalog's spelling of a product, ignoring case and accents.
    pub fn product_name(&self, product: &str) -> Option<&str> {
        let wanted = product_token(product);
        self.products
            .keys()
            .find(|name| product_token(name) == wanted)
            .map(String::as_str)
    }

    pub fn price(&self, product: &str, plan: &str) -> Option<&str> {
        let name = self.product_name(product)?;
        self.products
            .get(name)
            .and_then(|plans| plans.get(plan))
            .map(String::as_str)
    }

    /// Plan keys offered for a product ("60", "120").
    pub fn plans(&self, product: &str) -> Vec<&str> {
        self.product_name(product)
            .and_then(|name| self.products.get(name))
            .map(|plans| plans.keys().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// Sets one price after checking it looks like an amount.
    pub fn set_price(
        &mut self,
        product: impl Into<String>,
        plan: impl Into<String>,
        price: impl Into<String>,
    ) -> Result<(), ValidationError> {
        let (product, plan, price) = (product.into(), plan.into(), price.into());
        if product.trim().is_empty() {
            return Err(ValidationError::empty_field("product"));
        }
        if plan.trim().is_empty() {
            return Err(ValidationError::empty_field("plan"));
        }
        validate_amount("price", &price)?;
        let name = self
            .product_name(&product)
            .map(str::to_string)
            .unwrap_or(product);
        self.products.entry(name).or_default().insert(plan, price);
        Ok(())
    }

    /// Checks every value in the catalog.
    pub fn validate(&self) -> Result<(), ValidationError> {
        for plans in self.products.values() {
            for price in plans.values() {
                validate_amount("price", price)?;
            }
        }
        if let Some(fee) = &self.additional_max {
            validate_amount("additional_max", fee)?;
        }
        if let Some(fee) = &self.logistics_fee {
            validate_amount("logistics_fee", fee)?;
        }
        Ok(())
    }
}

fn validate_amount(field: &str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::empty_field(field));
    }
    let ok = value.chars().any(|c| c.is_ascii_digit())
        && value.chars().all(|c| c.is_ascii_digit() || c == '.' || c == ',');
    if ok {
        Ok(())
    } else {
        Err(ValidationError::invalid_format(
            field,
            format!("'{}' is not an amount", value),
        ))
    }
}

/// Placeholder spelling of a product name: "Cápsulas" → "CAPSULAS".
pub fn product_token(product: &str) -> String {
    text::normalize(product.trim())
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_cover_the_three_products() {
        let catalog = PriceCatalog::with_defaults();
        assert_eq!(catalog.price("Cápsulas", "60"), Some("46.900"));
        assert_eq!(catalog.price("Semillas", "120"), Some("49.900"));
        assert_eq!(catalog.price("Gotas", "60"), Some("48.900"));
        assert_eq!(catalog.logistics_fee.as_deref(), Some("18.000"));
    }

    #[test]
    fn product_lookup_ignores_case_and_accents() {
        let catalog = PriceCatalog::with_defaults();
        assert_eq!(catalog.price("capsulas", "120"), Some("66.900"));
        assert_eq!(catalog.plans("CÁPSULAS"), vec!["120", "60"]);
    }

    #[test]
    fn set_price_updates_existing_spelling() {
        let mut catalog = PriceCatalog::with_defaults();
        catalog.set_price("capsulas", "60", "50.000").unwrap();
        assert_eq!(catalog.price("Cápsulas", "60"), Some("50.000"));
        assert!(!catalog.products.contains_key("capsulas"));
    }

    #[test]
    fn set_price_rejects_non_amounts() {
        let mut catalog = PriceCatalog::default();
        assert!(catalog.set_price("Gotas", "60", "gratis").is_err());
        assert!(catalog.set_price("Gotas", "", "1.000").is_err());
    }

    #[test]
    fn product_token_folds_to_placeholder_spelling() {
        assert_eq!(product_token("Cápsulas"), "CAPSULAS");
        assert_eq!(product_token("Nuez de la India"), "NUEZ_DE_LA_INDIA");
    }
}
