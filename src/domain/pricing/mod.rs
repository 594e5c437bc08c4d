//! Pricing - the price catalog and template rendering.

mod catalog;
mod renderer;

pub use catalog::{product_token, PriceCatalog};
pub use renderer::{price_token, TemplateRenderer, TOKEN_ADDITIONAL_MAX, TOKEN_LOGISTICS_FEE};

/// Default `(product, plan, price)` literals, used when the catalog lacks a value.
pub const DEFAULT_PRICES: [(&str, &str, &str); 6] = [
    ("Cápsulas", "60", "46.900"),
    ("Cápsulas", "120", "66.900"),
    ("Semillas", "60", "36.900"),
    ("Semillas", "120", "49.900"),
    ("Gotas", "60", "48.900"),
    ("Gotas", "120", "68.900"),
];

pub const DEFAULT_ADDITIONAL_MAX: &str = "6.000";
pub const DEFAULT_LOGISTICS_FEE: &str = "18.000";
