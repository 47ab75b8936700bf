//! CSV and XLSX downloads of the current table.

use axum::extract::State;
use axum::http::header;
use axum::response::{IntoResponse, Response};

use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::export::{self, CSV_CONTENT_TYPE, CSV_FILENAME, XLSX_CONTENT_TYPE, XLSX_FILENAME};
use crate::grid::TableData;
use crate::session::TransitionError;

/// `GET /api/export/csv`
pub async fn csv(State(ctx): State<ApiContext>) -> Result<Response, ApiError> {
    let table = current_table(&ctx)?;
    let body = export::to_csv(&table)?;
    Ok(attachment(CSV_CONTENT_TYPE, CSV_FILENAME, body.into_bytes()))
}

/// `GET /api/export/xlsx`
pub async fn xlsx(State(ctx): State<ApiContext>) -> Result<Response, ApiError> {
    let table = current_table(&ctx)?;
    let body = export::to_spreadsheet(&table)?;
    Ok(attachment(XLSX_CONTENT_TYPE, XLSX_FILENAME, body))
}

fn current_table(ctx: &ApiContext) -> Result<TableData, ApiError> {
    ctx.session
        .snapshot()?
        .table()
        .map(|t| t.table().clone())
        .ok_or(ApiError::Conflict(TransitionError::NoTable))
}

fn attachment(content_type: &'static str, file_name: &str, body: Vec<u8>) -> Response {
    let disposition = format!("attachment; filename=\"{file_name}\"");
    (
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body,
    )
        .into_response()
}
