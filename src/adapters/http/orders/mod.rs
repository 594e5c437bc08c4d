//! HTTP adapter for the order ledger.

mod dto;
mod handlers;
mod routes;

pub use dto::{OrderResponse, OrdersResponse, UpdateOrderRequest, UpdateOrderResponse};
pub use routes::order_routes;
