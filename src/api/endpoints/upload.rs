//! Image upload endpoint.
//!
//! `POST /api/upload`: multipart form with one `file` field. Validation
//! happens inline; extraction runs on a background task that reports
//! progress into the session.

use axum::extract::multipart::MultipartError;
use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::Json;

use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::pipeline::{validate_upload, Image};
use crate::session::{SessionEvent, SessionState, TransitionError};

/// Multipart field carrying the image.
pub const FILE_FIELD: &str = "file";

struct UploadedFile {
    bytes: Vec<u8>,
    content_type: Option<String>,
    file_name: Option<String>,
}

/// Accept an image and start extraction.
///
/// 202 with the processing snapshot on success. Invalid uploads are
/// rejected before the session changes.
pub async fn upload(
    State(ctx): State<ApiContext>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<SessionState>), ApiError> {
    // Fail fast before reading a large body
    if ctx.session.snapshot()?.is_processing() {
        return Err(ApiError::Conflict(TransitionError::Busy));
    }

    let file = read_file_field(&ctx, &mut multipart)
        .await?
        .ok_or_else(|| ApiError::BadRequest(format!("Missing '{FILE_FIELD}' field")))?;

    let image = validate_upload(
        file.bytes,
        file.content_type.as_deref(),
        file.file_name.as_deref(),
        &ctx.limits,
    )?;

    let snapshot = ctx.session.apply(SessionEvent::UploadStarted)?;
    tracing::info!(media_type = %image.media_type(), size = image.len(), "Upload accepted, extraction started");

    spawn_extraction(ctx, image);
    Ok((StatusCode::ACCEPTED, Json(snapshot)))
}

async fn read_file_field(
    ctx: &ApiContext,
    multipart: &mut Multipart,
) -> Result<Option<UploadedFile>, ApiError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(ctx, e))?
    {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }
        let content_type = field.content_type().map(str::to_string);
        let file_name = field.file_name().map(str::to_string);
        let bytes = field.bytes().await.map_err(|e| multipart_error(ctx, e))?;
        return Ok(Some(UploadedFile {
            bytes: bytes.to_vec(),
            content_type,
            file_name,
        }));
    }
    Ok(None)
}

fn multipart_error(ctx: &ApiContext, err: MultipartError) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::BodyTooLarge {
            limit_mb: ctx.max_file_mb(),
        }
    } else {
        tracing::warn!("Failed to read upload: {err}");
        ApiError::BadRequest(err.body_text())
    }
}

/// Run the pipeline in the background and record the outcome.
fn spawn_extraction(ctx: ApiContext, image: Image) {
    tokio::spawn(async move {
        let session = ctx.session.clone();
        let result = ctx
            .pipeline
            .process(image, |message| {
                if let Err(e) = session.apply(SessionEvent::Progress(message.to_string())) {
                    tracing::warn!(error = %e, "Progress update dropped");
                }
            })
            .await;

        let event = match result {
            Ok(table) => SessionEvent::Extracted(table),
            Err(e) => {
                tracing::warn!(code = e.code(), error = %e, "Extraction failed");
                SessionEvent::Failed(e.to_string())
            }
        };

        if let Err(e) = ctx.session.apply(event) {
            tracing::error!(error = %e, "Could not record extraction outcome");
        }
    });
}
