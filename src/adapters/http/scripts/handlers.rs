//! HTTP handlers for script versions, allocation mode and prices.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use crate::adapters::http::{ApiError, AppState};
use crate::domain::pricing::PriceCatalog;
use crate::domain::script::{
    AllocationMode, ScriptConfigError, ScriptDocument, ScriptVersionName,
};

use super::dto::{ModeResponse, ScriptSummaryResponse, ScriptsResponse};

/// GET /api/scripts
pub async fn list_scripts(State(state): State<AppState>) -> Json<ScriptsResponse> {
    let registry = state.engine().scripts().snapshot();
    let mut versions: Vec<ScriptSummaryResponse> =
        registry.versions().map(|v| v.as_ref().into()).collect();
    versions.sort_by(|a, b| a.name.cmp(&b.name));
    Json(ScriptsResponse {
        mode: registry.mode().clone(),
        versions,
    })
}

/// GET /api/scripts/:version - The stored document of one version
pub async fn get_script(
    State(state): State<AppState>,
    Path(version): Path<String>,
) -> Result<Json<ScriptDocument>, ApiError> {
    let name = ScriptVersionName::new(version)?;
    let script = state
        .engine()
        .scripts()
        .snapshot()
        .version(&name)
        .ok_or_else(|| ScriptConfigError::VersionNotFound {
            version: name.to_string(),
        })?;
    Ok(Json(script.document().clone()))
}

/// PUT /api/scripts/:version - Author or replace a version
///
/// Rejected with 422 when a step points at a missing step.
pub async fn put_script(
    State(state): State<AppState>,
    Path(version): Path<String>,
    Json(document): Json<ScriptDocument>,
) -> Result<(StatusCode, Json<ScriptSummaryResponse>), ApiError> {
    let name = ScriptVersionName::new(version)?;
    let script = state.engine().author_script(name, document).await?;
    Ok((StatusCode::OK, Json(script.as_ref().into())))
}

/// POST /api/scripts/mode - `{"active":"v1"}` or `{"rotation":["v1","v2"]}`
pub async fn post_mode(
    State(state): State<AppState>,
    Json(mode): Json<AllocationMode>,
) -> Result<Json<ModeResponse>, ApiError> {
    state.engine().set_allocation_mode(mode.clone()).await?;
    Ok(Json(ModeResponse { mode }))
}

/// GET /api/prices
pub async fn get_prices(State(state): State<AppState>) -> Json<PriceCatalog> {
    Json(state.engine().prices().snapshot().as_ref().clone())
}

/// PUT /api/prices - Replace the catalog; new renders pick it up at once
pub async fn put_prices(
    State(state): State<AppState>,
    Json(catalog): Json<PriceCatalog>,
) -> Result<Json<PriceCatalog>, ApiError> {
    state.engine().update_prices(catalog.clone()).await?;
    Ok(Json(catalog))
}
