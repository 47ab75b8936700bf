//! Health check endpoint.

use axum::extract::State;
use axum::Json;

use crate::api::error::ApiError;
use crate::api::types::{ApiContext, HealthResponse};

/// `GET /api/health`: liveness plus the current session phase.
pub async fn check(State(ctx): State<ApiContext>) -> Result<Json<HealthResponse>, ApiError> {
    let session = ctx.session.snapshot()?.name();

    Ok(Json(HealthResponse {
        status: "ok",
        app: crate::config::APP_NAME,
        version: crate::config::APP_VERSION,
        session,
    }))
}
