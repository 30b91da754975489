//! Core handlers mounted by the router itself.

use axum::{extract::State, http::Uri, Json};
use common::{CorsTestResponse, HealthResponse};

use super::error::{ApiError, ApiResult};
use super::middleware::RequestContext;
use super::state::AppState;

const NO_ORIGIN: &str = "No origin header";

/// `GET /api/health`
pub async fn health(
    State(state): State<AppState>,
    ctx: RequestContext,
) -> ApiResult<Json<HealthResponse>> {
    Ok(Json(HealthResponse {
        status: "ok".into(),
        message: "Server is running".into(),
        environment: state.config.environment.clone(),
        version: env!("CARGO_PKG_VERSION").into(),
        timestamp: state.clock.timestamp(),
        origin: ctx.origin,
        allowed_origins: state.config.allowed_origins.clone(),
    }))
}

/// `GET /api/cors-test`
pub async fn cors_test(
    State(state): State<AppState>,
    ctx: RequestContext,
) -> ApiResult<Json<CorsTestResponse>> {
    Ok(Json(CorsTestResponse {
        status: "ok".into(),
        message: "CORS is working".into(),
        origin: ctx.origin.unwrap_or_else(|| NO_ORIGIN.into()),
        timestamp: state.clock.timestamp(),
    }))
}

/// Fallback for unmatched paths.
pub async fn not_found(uri: Uri) -> ApiError {
    ApiError::not_found(format!("route {} not found", uri.path()))
}
