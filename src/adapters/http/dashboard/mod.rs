//! HTTP adapter for the operator dashboard: sessions, alerts, statistics.

mod dto;
mod handlers;
mod routes;

pub use dto::{
    AlertResponse, AlertsResponse, CommandRequest, CommandResponse, PauseRequest, PauseResponse,
    ResetResponse, SessionListResponse, SessionResponse, SessionSummaryResponse, StatsResponse,
};
pub use routes::dashboard_routes;
