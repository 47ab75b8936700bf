//! Session API router.
//!
//! Returns a composable `Router` with every route nested under `/api/`.

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post, put};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::api::endpoints;
use crate::api::types::ApiContext;

/// Build the session API router.
///
/// Endpoint handlers use `State<ApiContext>` (provided via `with_state`).
/// The body limit covers the largest accepted image plus multipart framing.
pub fn session_api_router(ctx: ApiContext) -> Router {
    let body_limit = ctx.body_limit();

    let api = Router::new()
        .route("/health", get(endpoints::health::check))
        .route("/session", get(endpoints::session::snapshot))
        .route("/upload", post(endpoints::upload::upload))
        .route("/cells", put(endpoints::cells::edit))
        .route("/export/csv", get(endpoints::export::csv))
        .route("/export/xlsx", get(endpoints::export::xlsx))
        .route("/reset", post(endpoints::session::reset))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(ctx);

    Router::new()
        .nest("/api", api)
        .layer(TraceLayer::new_for_http())
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::sync::Arc;
    use std::time::Duration;

    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use http_body_util::BodyExt;
    use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
    use tower::ServiceExt;

    use super::*;
    use crate::pipeline::extraction::{MockFragment, MockInference};
    use crate::pipeline::{ExtractionClient, PayloadFitter, UploadLimits, UploadPipeline};

    const BOUNDARY: &str = "scribetable-test-boundary";

    fn test_ctx(mock: MockInference) -> ApiContext {
        let client = ExtractionClient::new(Arc::new(mock));
        ApiContext::new(
            UploadPipeline::new(PayloadFitter::default(), client),
            UploadLimits::default(),
        )
    }

    fn table_ctx() -> ApiContext {
        test_ctx(MockInference::new(&[r#"[["Item","Qty"],"#, r#"["pen","2"]]"#]))
    }

    fn png_bytes() -> Vec<u8> {
        let img = RgbImage::from_pixel(8, 8, Rgb([200, 200, 200]));
        let mut cursor = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(img)
            .write_to(&mut cursor, ImageFormat::Png)
            .unwrap();
        cursor.into_inner()
    }

    fn multipart_body(field: &str, file_name: &str, content_type: &str, bytes: &[u8]) -> Vec<u8> {
        let mut body = Vec::new();
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{file_name}\"\r\nContent-Type: {content_type}\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
        body
    }

    fn upload_request(body: Vec<u8>) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/upload")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    fn png_upload() -> Request<Body> {
        upload_request(multipart_body("file", "receipt.png", "image/png", &png_bytes()))
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn json_request(method: &str, uri: &str, json: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .unwrap()
    }

    async fn send(ctx: &ApiContext, req: Request<Body>) -> (StatusCode, Vec<u8>) {
        let response = session_api_router(ctx.clone()).oneshot(req).await.unwrap();
        let status = response.status();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        (status, body.to_vec())
    }

    async fn send_json(ctx: &ApiContext, req: Request<Body>) -> (StatusCode, serde_json::Value) {
        let (status, body) = send(ctx, req).await;
        (status, serde_json::from_slice(&body).unwrap())
    }

    /// Poll the session until the background extraction settles.
    async fn settled(ctx: &ApiContext) -> serde_json::Value {
        for _ in 0..200 {
            let (_, json) = send_json(ctx, get("/api/session")).await;
            if json["status"] != "processing" {
                return json;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("extraction did not finish");
    }

    async fn extracted_ctx() -> ApiContext {
        let ctx = table_ctx();
        let (status, _) = send_json(&ctx, png_upload()).await;
        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(settled(&ctx).await["status"], "success");
        ctx
    }

    #[tokio::test]
    async fn health_reports_version_and_phase() {
        let ctx = table_ctx();
        let (status, json) = send_json(&ctx, get("/api/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "ok");
        assert_eq!(json["app"], "ScribeTable");
        assert_eq!(json["version"], crate::config::APP_VERSION);
        assert_eq!(json["session"], "idle");
    }

    #[tokio::test]
    async fn new_session_is_idle() {
        let (status, json) = send_json(&table_ctx(), get("/api/session")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json, serde_json::json!({ "status": "idle" }));
    }

    #[tokio::test]
    async fn upload_extracts_table() {
        let ctx = table_ctx();
        let (status, json) = send_json(&ctx, png_upload()).await;
        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(json["status"], "processing");
        assert_eq!(json["progress"], "Optimizing image...");

        let done = settled(&ctx).await;
        assert_eq!(done["status"], "success");
        assert_eq!(done["table"], serde_json::json!([["Item", "Qty"], ["pen", "2"]]));
    }

    #[tokio::test]
    async fn upload_uses_file_name_when_type_is_generic() {
        let ctx = table_ctx();
        let body = multipart_body("file", "scan.PNG", "application/octet-stream", &png_bytes());
        let (status, _) = send_json(&ctx, upload_request(body)).await;
        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(settled(&ctx).await["status"], "success");
    }

    #[tokio::test]
    async fn unsupported_format_leaves_session_idle() {
        let ctx = table_ctx();
        let body = multipart_body("file", "doc.gif", "image/gif", b"GIF89a");
        let (status, json) = send_json(&ctx, upload_request(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            json["error"]["message"],
            "Unsupported file format. Please upload PNG, JPEG, or WebP."
        );
        let (_, session) = send_json(&ctx, get("/api/session")).await;
        assert_eq!(session["status"], "idle");
    }

    #[tokio::test]
    async fn oversized_upload_returns_413() {
        let client = ExtractionClient::new(Arc::new(MockInference::new(&["[[\"a\"]]"])));
        let limits = UploadLimits {
            max_file_bytes: 1024,
            ..UploadLimits::default()
        };
        let ctx = ApiContext::new(UploadPipeline::new(PayloadFitter::default(), client), limits);

        let body = multipart_body("file", "big.png", "image/png", &vec![0u8; 4096]);
        let (status, json) = send_json(&ctx, upload_request(body)).await;
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(json["error"]["code"], "FILE_TOO_LARGE");
        assert_eq!(settled(&ctx).await["status"], "idle");
    }

    #[tokio::test]
    async fn missing_file_field_returns_400() {
        let ctx = table_ctx();
        let body = multipart_body("attachment", "x.png", "image/png", &png_bytes());
        let (status, json) = send_json(&ctx, upload_request(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"]["code"], "BAD_REQUEST");
    }

    #[tokio::test]
    async fn upload_while_processing_returns_409() {
        let ctx = table_ctx();
        ctx.session
            .apply(crate::session::SessionEvent::UploadStarted)
            .unwrap();
        let (status, json) = send_json(&ctx, png_upload()).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(json["error"]["code"], "BUSY");
    }

    #[tokio::test]
    async fn empty_table_fails_session() {
        let ctx = test_ctx(MockInference::new(&["[]"]));
        send_json(&ctx, png_upload()).await;
        let done = settled(&ctx).await;
        assert_eq!(done["status"], "failed");
        assert_eq!(done["message"], "The AI could not detect any tabular data.");
    }

    #[tokio::test]
    async fn stream_failure_fails_session_with_cause() {
        let ctx = test_ctx(MockInference::scripted(vec![vec![
            MockFragment::Text("[[".into()),
            MockFragment::Fail("connection reset".into()),
        ]]));
        send_json(&ctx, png_upload()).await;
        let done = settled(&ctx).await;
        assert_eq!(done["status"], "failed");
        assert!(done["message"].as_str().unwrap().contains("connection reset"));
    }

    #[tokio::test]
    async fn reset_after_failure_allows_retry() {
        let ctx = test_ctx(MockInference::scripted(vec![
            vec![MockFragment::Text("not json".into())],
            vec![MockFragment::Text(r#"[["ok"]]"#.into())],
        ]));
        send_json(&ctx, png_upload()).await;
        assert_eq!(settled(&ctx).await["status"], "failed");

        let (status, json) = send_json(&ctx, json_request("POST", "/api/reset", serde_json::json!({}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "idle");

        send_json(&ctx, png_upload()).await;
        let done = settled(&ctx).await;
        assert_eq!(done["table"], serde_json::json!([["ok"]]));
    }

    #[tokio::test]
    async fn reset_while_processing_returns_409() {
        let ctx = table_ctx();
        ctx.session
            .apply(crate::session::SessionEvent::UploadStarted)
            .unwrap();
        let req = Request::builder()
            .method("POST")
            .uri("/api/reset")
            .body(Body::empty())
            .unwrap();
        let (status, _) = send_json(&ctx, req).await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn cell_edit_updates_table() {
        let ctx = extracted_ctx().await;
        let edit = serde_json::json!({ "row": 1, "col": 1, "value": "5" });
        let (status, json) = send_json(&ctx, json_request("PUT", "/api/cells", edit)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["table"][1][1], "5");
        assert_eq!(json["table"][0][0], "Item");
    }

    #[tokio::test]
    async fn cell_edit_out_of_bounds_returns_400() {
        let ctx = extracted_ctx().await;
        let edit = serde_json::json!({ "row": 7, "col": 0, "value": "x" });
        let (status, json) = send_json(&ctx, json_request("PUT", "/api/cells", edit)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"]["code"], "OUT_OF_BOUNDS");
    }

    #[tokio::test]
    async fn cell_edit_without_table_returns_409() {
        let edit = serde_json::json!({ "row": 0, "col": 0, "value": "x" });
        let (status, json) = send_json(&table_ctx(), json_request("PUT", "/api/cells", edit)).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(json["error"]["code"], "NO_TABLE");
    }

    #[tokio::test]
    async fn csv_export_is_attachment() {
        let ctx = extracted_ctx().await;
        let response = session_api_router(ctx.clone())
            .oneshot(get("/api/export/csv"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_DISPOSITION],
            "attachment; filename=\"extracted_data.csv\""
        );
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"\"Item\",\"Qty\"\n\"pen\",\"2\"");
    }

    #[tokio::test]
    async fn csv_export_reflects_edits() {
        let ctx = extracted_ctx().await;
        let edit = serde_json::json!({ "row": 1, "col": 0, "value": "say \"hi\"" });
        send_json(&ctx, json_request("PUT", "/api/cells", edit)).await;
        let (_, body) = send(&ctx, get("/api/export/csv")).await;
        assert_eq!(
            String::from_utf8(body).unwrap(),
            "\"Item\",\"Qty\"\n\"say \"\"hi\"\"\",\"2\""
        );
    }

    #[tokio::test]
    async fn xlsx_export_is_workbook() {
        let ctx = extracted_ctx().await;
        let response = session_api_router(ctx.clone())
            .oneshot(get("/api/export/xlsx"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            crate::export::XLSX_CONTENT_TYPE
        );
        assert_eq!(
            response.headers()[header::CONTENT_DISPOSITION],
            "attachment; filename=\"extracted_data.xlsx\""
        );
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..2], b"PK");
    }

    #[tokio::test]
    async fn export_without_table_returns_409() {
        let ctx = table_ctx();
        for uri in ["/api/export/csv", "/api/export/xlsx"] {
            let (status, json) = send_json(&ctx, get(uri)).await;
            assert_eq!(status, StatusCode::CONFLICT, "{uri}");
            assert_eq!(json["error"]["code"], "NO_TABLE");
        }
    }

    #[tokio::test]
    async fn unknown_route_returns_404() {
        let (status, _) = send(&table_ctx(), get("/api/nope")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
