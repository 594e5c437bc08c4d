//! HTTP adapter for script authoring and price administration.

mod dto;
mod handlers;
mod routes;

pub use dto::{ModeResponse, ScriptSummaryResponse, ScriptsResponse};
pub use routes::script_routes;
