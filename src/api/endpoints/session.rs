//! Session snapshot and reset.

use axum::extract::State;
use axum::Json;

use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::session::{SessionEvent, SessionState};

/// `GET /api/session`: current state, including the table once extracted.
pub async fn snapshot(State(ctx): State<ApiContext>) -> Result<Json<SessionState>, ApiError> {
    Ok(Json(ctx.session.snapshot()?))
}

/// `POST /api/reset`: discard the table or error and return to idle.
///
/// Rejected with 409 while an extraction is running.
pub async fn reset(State(ctx): State<ApiContext>) -> Result<Json<SessionState>, ApiError> {
    Ok(Json(ctx.session.apply(SessionEvent::Reset)?))
}
