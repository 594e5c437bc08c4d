//! Placeholder substitution for step responses and FAQ answers.
//!
//! Recognised tokens:
//!
//! | Token | Value |
//! |---|---|
//! | `{{PRICE_<PRODUCT>_<PLAN>}}` | catalog price, e.g. `{{PRICE_CAPSULAS_60}}` |
//! | `{{ADICIONAL_MAX}}` | `additional_max` fee |
//! | `{{COSTO_LOGISTICO}}` | `logistics_fee` |
//! | `{{PRODUCT}}`, `{{PLAN}}`, `{{PRICE}}`, `{{ADDRESS}}` | order fields |
//!
//! Order fields are only substituted by [`TemplateRenderer::render_for_order`].
//!
//! A catalog token the catalog does not define falls back to its default
//! literal from [`DEFAULT_PRICES`](super::DEFAULT_PRICES). A `PRICE_` token
//! with neither renders as the empty string, so no raw placeholder reaches a
//! customer. Any other `{{...}}` text is left as written.

use std::collections::HashMap;

use super::catalog::{product_token, PriceCatalog};
use super::{DEFAULT_ADDITIONAL_MAX, DEFAULT_LOGISTICS_FEE, DEFAULT_PRICES};
use crate::domain::conversation::OrderData;

pub const TOKEN_ADDITIONAL_MAX: &str = "ADICIONAL_MAX";
pub const TOKEN_LOGISTICS_FEE: &str = "COSTO_LOGISTICO";
const PRICE_PREFIX: &str = "PRICE_";

/// Stateless renderer; every call is a pure function of its inputs.
#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateRenderer;

impl TemplateRenderer {
    /// Replaces catalog tokens in `template`.
    pub fn render(&self, template: &str, catalog: &PriceCatalog) -> String {
        substitute(template, &catalog_values(catalog))
    }

    /// Replaces catalog tokens and the order tokens.
    pub fn render_for_order(
        &self,
        template: &str,
        catalog: &PriceCatalog,
        order: Option<&OrderData>,
    ) -> String {
        let mut values = catalog_values(catalog);
        let field = |get: fn(&OrderData) -> Option<&String>| {
            order.and_then(get).cloned().unwrap_or_default()
        };
        values.insert("PRODUCT".to_string(), field(|o| o.product.as_ref()));
        values.insert("PLAN".to_string(), field(|o| o.plan.as_ref()));
        values.insert("PRICE".to_string(), field(|o| o.price.as_ref()));
        values.insert("ADDRESS".to_string(), field(|o| o.address.as_ref()));
        substitute(template, &values)
    }
}

pub fn price_token(product: &str, plan: &str) -> String {
    format!("{PRICE_PREFIX}{}_{}", product_token(product), product_token(plan))
}

fn catalog_values(catalog: &PriceCatalog) -> HashMap<String, String> {
    let mut values: HashMap<String, String> = DEFAULT_PRICES
        .iter()
        .map(|(product, plan, price)| (price_token(product, plan), price.to_string()))
        .collect();
    values.insert(
        TOKEN_ADDITIONAL_MAX.to_string(),
        DEFAULT_ADDITIONAL_MAX.to_string(),
    );
    values.insert(
        TOKEN_LOGISTICS_FEE.to_string(),
        DEFAULT_LOGISTICS_FEE.to_string(),
    );

    for (product, plans) in &catalog.products {
        for (plan, price) in plans {
            values.insert(price_token(product, plan), price.clone());
        }
    }
    if let Some(fee) = &catalog.additional_max {
        values.insert(TOKEN_ADDITIONAL_MAX.to_string(), fee.clone());
    }
    if let Some(fee) = &catalog.logistics_fee {
        values.insert(TOKEN_LOGISTICS_FEE.to_string(), fee.clone());
    }
    values
}

fn substitute(template: &str, values: &HashMap<String, String>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find("}}") {
            Some(end) => {
                let token = after[..end].trim();
                match values.get(token) {
                    Some(value) => out.push_str(value),
                    None if token.starts_with(PRICE_PREFIX) => {}
                    None => out.push_str(&rest[start..start + 2 + end + 2]),
                }
                rest = &after[end + 2..];
            }
            None => {
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::conversation::OrderStatus;

    #[test]
    fn renders_catalog_prices_and_fees() {
        let catalog = PriceCatalog::with_defaults();
        let out = TemplateRenderer.render(
            "60 días: ${{PRICE_CAPSULAS_60}} / rechazo: ${{COSTO_LOGISTICO}}",
            &catalog,
        );
        assert_eq!(out, "60 días: $46.900 / rechazo: $18.000");
    }

    #[test]
    fn missing_catalog_entry_uses_default_literal() {
        let catalog = PriceCatalog::default();
        let out = TemplateRenderer.render("{{PRICE_SEMILLAS_120}} + {{ADICIONAL_MAX}}", &catalog);
        assert_eq!(out, "49.900 + 6.000");
    }

    #[test]
    fn catalog_overrides_default_literal() {
        let mut catalog = PriceCatalog::default();
        catalog.set_price("Semillas", "120", "55.000").unwrap();
        assert_eq!(
            TemplateRenderer.render("{{PRICE_SEMILLAS_120}}", &catalog),
            "55.000"
        );
    }

    #[test]
    fn products_added_to_the_catalog_get_tokens() {
        let mut catalog = PriceCatalog::default();
        catalog.set_price("Té Verde", "30", "9.900").unwrap();
        assert_eq!(
            TemplateRenderer.render("{{PRICE_TE_VERDE_30}}", &catalog),
            "9.900"
        );
    }

    #[test]
    fn unknown_and_unterminated_tokens_are_left_alone() {
        let catalog = PriceCatalog::with_defaults();
        assert_eq!(
            TemplateRenderer.render("Hola {{NOMBRE}} {{PRICE", &catalog),
            "Hola {{NOMBRE}} {{PRICE"
        );
    }

    #[test]
    fn unpriced_product_token_renders_empty() {
        let catalog = PriceCatalog::with_defaults();
        assert_eq!(
            TemplateRenderer.render("Gotas 90 días: ${{PRICE_GOTAS_90}}.", &catalog),
            "Gotas 90 días: $."
        );
    }

    #[test]
    fn order_tokens_render_from_order_data() {
        let order = OrderData {
            product: Some("Cápsulas".into()),
            plan: Some("120".into()),
            price: Some("66.900".into()),
            address: None,
            postal_code: None,
            status: OrderStatus::Draft,
            submitted_at: None,
        };
        let out = TemplateRenderer.render_for_order(
            "{{PRODUCT}} {{PLAN}} días ${{PRICE}} a [{{ADDRESS}}]",
            &PriceCatalog::with_defaults(),
            Some(&order),
        );
        assert_eq!(out, "Cápsulas 120 días $66.900 a []");
    }

    #[test]
    fn order_tokens_are_untouched_by_plain_render() {
        let out = TemplateRenderer.render("{{PRODUCT}}", &PriceCatalog::default());
        assert_eq!(out, "{{PRODUCT}}");
    }
}
