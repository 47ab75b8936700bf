//! Cell editing.

use axum::extract::State;
use axum::Json;

use crate::api::error::ApiError;
use crate::api::types::{ApiContext, CellEdit};
use crate::session::{SessionEvent, SessionState};

/// `PUT /api/cells`: replace one cell of the extracted table.
///
/// Returns the new snapshot. 409 when there is no table, 400 when the
/// coordinates do not address an existing cell.
pub async fn edit(
    State(ctx): State<ApiContext>,
    Json(edit): Json<CellEdit>,
) -> Result<Json<SessionState>, ApiError> {
    let next = ctx.session.apply(SessionEvent::CellEdited {
        row: edit.row,
        col: edit.col,
        value: edit.value,
    })?;
    tracing::debug!(row = edit.row, col = edit.col, "Cell edited");
    Ok(Json(next))
}
