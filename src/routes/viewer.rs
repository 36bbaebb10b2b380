//! Viewer endpoints
//!
//! The viewer surface posts `ViewerIntent` messages and renders whatever
//! snapshot comes back. Page rasters and the download payload are served
//! as binary responses.

use axum::{
    body::Body,
    extract::{Path, State},
    http::header,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;

use crate::error::AppError;
use crate::state::AppState;
use crate::viewer::{Download, IntentOutcome, ViewerIntent, ViewerSnapshot};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(get_snapshot))
        .route("/intent", post(post_intent))
        .route("/download", get(download))
        .route("/pages/:page", get(render_page))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IntentResponse {
    /// Whether the intent changed anything
    pub applied: bool,
    pub viewer: ViewerSnapshot,
}

async fn get_snapshot(State(state): State<AppState>) -> Json<ViewerSnapshot> {
    Json(state.viewer().snapshot())
}

async fn post_intent(
    State(state): State<AppState>,
    Json(intent): Json<ViewerIntent>,
) -> Result<Response, AppError> {
    let viewer = state.viewer();

    let applied = match viewer.handle(intent).await? {
        IntentOutcome::Download(file) => return file_response(file),
        IntentOutcome::Updated => true,
        IntentOutcome::Ignored => false,
    };

    Ok(Json(IntentResponse {
        applied,
        viewer: viewer.snapshot(),
    })
    .into_response())
}

async fn download(State(state): State<AppState>) -> Result<Response, AppError> {
    file_response(state.viewer().download()?)
}

/// Rasterize a page of the open document (1-indexed) as PNG
async fn render_page(
    State(state): State<AppState>,
    Path(page): Path<usize>,
) -> Result<Response, AppError> {
    let raster = state.viewer().page_raster(page).await?;

    Ok(Response::builder()
        .header(header::CONTENT_TYPE, "image/png")
        .header(header::CACHE_CONTROL, "no-store")
        .header("X-Raster-Scale", raster.scale.to_string())
        .body(Body::from(raster.png))?)
}

/// Payload response; the digest doubles as a strong entity tag
fn file_response(file: Download) -> Result<Response, AppError> {
    let disposition = format!(
        "attachment; filename*=UTF-8''{}",
        urlencoding::encode(&file.filename)
    );

    Ok(Response::builder()
        .header(header::CONTENT_TYPE, file.mime.as_str())
        .header(header::CONTENT_DISPOSITION, disposition)
        .header(header::ETAG, format!("\"{}\"", file.digest))
        .header(
            header::LAST_MODIFIED,
            file.cached_at.format("%a, %d %b %Y %H:%M:%S GMT").to_string(),
        )
        .body(Body::from(file.bytes.as_ref().clone()))?)
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::{json, Value};

    use crate::routes::testing::{markup, server};

    async fn opened(n: usize) -> axum_test::TestServer {
        let (server, _, _) = server(n);
        server.post("/api/v1/host/snapshot").text(markup(n)).await;
        server.post("/api/v1/rescan").await.assert_status_ok();

        let response = server
            .post("/api/v1/viewer/intent")
            .json(&json!({ "type": "thumbnailClick", "hash": "hash0001" }))
            .await;
        response.assert_status_ok();
        server
    }

    #[tokio::test]
    async fn test_snapshot_starts_closed() {
        let (server, _, _) = server(0);

        let viewer: Value = server.get("/api/v1/viewer").await.json();
        assert_eq!(viewer["phase"], "closed");
        assert_eq!(viewer["content"]["kind"], "empty");
        assert_eq!(viewer["count"], 0);
    }

    #[tokio::test]
    async fn test_thumbnail_click_opens_document() {
        let server = opened(3).await;

        let viewer: Value = server.get("/api/v1/viewer").await.json();
        assert_eq!(viewer["phase"], "open");
        assert_eq!(viewer["current"], 1);
        assert_eq!(viewer["count"], 3);
        assert_eq!(viewer["content"]["kind"], "document");
        assert_eq!(viewer["content"]["filename"], "file1.pdf");
        assert_eq!(viewer["content"]["pageCount"], 1);
    }

    #[tokio::test]
    async fn test_intents_report_whether_applied() {
        let server = opened(3).await;

        let body: Value = server
            .post("/api/v1/viewer/intent")
            .json(&json!({ "type": "zoomIn" }))
            .await
            .json();
        assert_eq!(body["applied"], true);
        assert_eq!(body["viewer"]["zoom"], 1.25);

        let body: Value = server
            .post("/api/v1/viewer/intent")
            .json(&json!({ "type": "next" }))
            .await
            .json();
        assert_eq!(body["viewer"]["current"], 2);
        // Zoom resets on navigation
        assert_eq!(body["viewer"]["zoom"], 1.0);

        // No wraparound past the last item
        let body: Value = server
            .post("/api/v1/viewer/intent")
            .json(&json!({ "type": "key", "key": "ArrowRight" }))
            .await
            .json();
        assert_eq!(body["applied"], false);
        assert_eq!(body["viewer"]["current"], 2);
    }

    #[tokio::test]
    async fn test_unknown_hash_is_not_found() {
        let (server, _, _) = server(1);
        server.post("/api/v1/host/snapshot").text(markup(1)).await;
        server.post("/api/v1/rescan").await;

        let response = server
            .post("/api/v1/viewer/intent")
            .json(&json!({ "type": "thumbnailClick", "hash": "nope" }))
            .await;
        response.assert_status(StatusCode::NOT_FOUND);
        let body: Value = response.json();
        assert_eq!(body["error"], "UNKNOWN_ATTACHMENT");
    }

    #[tokio::test]
    async fn test_download_serves_payload() {
        let server = opened(2).await;

        let response = server.get("/api/v1/viewer/download").await;
        response.assert_status_ok();
        assert_eq!(response.header("content-type"), "application/pdf");
        assert_eq!(
            response.header("content-disposition"),
            "attachment; filename*=UTF-8''file1.pdf"
        );
        assert_eq!(response.as_bytes().as_ref(), b"%PDF-1.7 1");
        assert_eq!(
            response.header("etag"),
            format!("\"{}\"", crate::cache::payload_digest(b"%PDF-1.7 1")).as_str()
        );
        let last_modified = response.header("last-modified");
        let last_modified = last_modified.to_str().unwrap();
        assert!(chrono::DateTime::parse_from_rfc2822(&last_modified.replace("GMT", "+0000")).is_ok());

        let response = server
            .post("/api/v1/viewer/intent")
            .json(&json!({ "type": "download" }))
            .await;
        response.assert_status_ok();
        assert_eq!(response.as_bytes().as_ref(), b"%PDF-1.7 1");
    }

    #[tokio::test]
    async fn test_download_requires_open_viewer() {
        let (server, _, _) = server(0);

        let response = server.get("/api/v1/viewer/download").await;
        response.assert_status(StatusCode::CONFLICT);
        let body: Value = response.json();
        assert_eq!(body["error"], "VIEWER_NOT_OPEN");
    }

    #[tokio::test]
    async fn test_page_raster_is_png() {
        let server = opened(2).await;

        let response = server.get("/api/v1/viewer/pages/1").await;
        response.assert_status_ok();
        assert_eq!(response.header("content-type"), "image/png");
        assert_eq!(&response.as_bytes()[1..4], b"PNG");

        let response = server.get("/api/v1/viewer/pages/9").await;
        response.assert_status(StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_close_returns_to_closed() {
        let server = opened(2).await;

        let body: Value = server
            .post("/api/v1/viewer/intent")
            .json(&json!({ "type": "key", "key": "Escape" }))
            .await
            .json();
        assert_eq!(body["applied"], true);
        assert_eq!(body["viewer"]["phase"], "closed");
    }
}
