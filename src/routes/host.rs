//! Host document endpoints
//!
//! The companion extension posts host-page markup here whenever the page
//! mutates, and reports a torn-down page context.

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;

use crate::cache::{CacheStats, CachedPayload};
use crate::error::AppError;
use crate::registry::{AttachmentMarker, AttachmentRecord, RescanReport};
use crate::scheduler::ThrottleOutcome;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/host/snapshot", post(post_snapshot))
        .route("/host/markers", post(post_markers))
        .route("/host/invalidate", post(invalidate))
        .route("/rescan", post(rescan))
        .route("/attachments", get(list_attachments))
        .route("/notice/dismiss", post(dismiss_notice))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotResponse {
    /// Markers found in the posted markup
    pub markers: usize,
    pub rescan: ThrottleOutcome,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentListResponse {
    pub attachments: Vec<AttachmentRecord>,
    pub total: usize,
    pub cache: CacheStats,
    pub cached: Vec<CachedPayload>,
    /// Ordinals still waiting in the background preload queue
    pub pending_preloads: Vec<usize>,
}

#[derive(Serialize)]
pub struct DismissResponse {
    pub dismissed: bool,
}

/// Replace the host snapshot with posted HTML and schedule a rescan
async fn post_snapshot(
    State(state): State<AppState>,
    body: String,
) -> Result<Json<SnapshotResponse>, AppError> {
    if body.trim().is_empty() {
        return Err(AppError::BadRequest("Empty markup snapshot".to_string()));
    }

    let markers = state.host().update_markup(&body)?;
    let rescan = state.viewer().schedule_rescan();
    tracing::debug!(markers, ?rescan, "Host snapshot updated");

    Ok(Json(SnapshotResponse { markers, rescan }))
}

/// Replace the host snapshot with markers the extension extracted itself
async fn post_markers(
    State(state): State<AppState>,
    Json(markers): Json<Vec<AttachmentMarker>>,
) -> Json<SnapshotResponse> {
    let count = markers.len();
    state.host().replace_markers(markers);
    let rescan = state.viewer().schedule_rescan();

    Json(SnapshotResponse {
        markers: count,
        rescan,
    })
}

/// The host page context was torn down; the next rescan raises the banner
async fn invalidate(State(state): State<AppState>) -> StatusCode {
    tracing::info!("Host reported context invalidation");
    state.host().invalidate();
    StatusCode::NO_CONTENT
}

async fn rescan(State(state): State<AppState>) -> Result<Json<RescanReport>, AppError> {
    Ok(Json(state.viewer().rescan().await?))
}

async fn list_attachments(State(state): State<AppState>) -> Json<AttachmentListResponse> {
    let attachments = state.viewer().records();
    let total = attachments.len();
    let cache = state.viewer().loader().cache().stats().await;
    let cached = state.viewer().loader().cache().summaries().await;
    let pending_preloads = state.viewer().preloader().pending();

    Json(AttachmentListResponse {
        attachments,
        total,
        cache,
        cached,
        pending_preloads,
    })
}

async fn dismiss_notice(State(state): State<AppState>) -> Json<DismissResponse> {
    Json(DismissResponse {
        dismissed: state.viewer().dismiss_notice(),
    })
}
