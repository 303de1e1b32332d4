//! Scan screen endpoints
//!
//! Camera decodes are asynchronous: `POST /scan/decode` only hands the text
//! to the running decoder, and the outcome arrives on `GET /scan/events`.
//! Manual submits and deletions answer directly.

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    routing::{delete, get, post, put},
    Json, Router,
};
use fieldguide_common::events::CameraState;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::session::SessionView;
use crate::intake::{CaptureMode, CapturePhoto, DeleteOutcome, DeviceError, ManualEntry, SubmitOutcome};
use crate::models::TicketScan;
use crate::{ApiError, ApiResult, AppState, IntakeError};

/// Largest accepted ticket photo
pub const MAX_PHOTO_BYTES: usize = 16 * 1024 * 1024;

#[derive(Debug, Deserialize)]
pub struct ModeRequest {
    pub mode: CaptureMode,
}

#[derive(Debug, Serialize)]
pub struct CameraResponse {
    pub camera: CameraState,
}

#[derive(Debug, Deserialize)]
pub struct DecodeRequest {
    /// Raw decoded QR text
    pub text: String,
}

#[derive(Debug, Serialize)]
pub struct PhotoResponse {
    pub has_photo: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bytes: Option<usize>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum SubmitResponse {
    Recorded { scan: TicketScan },
    /// Another submit was in flight; nothing was recorded
    Dropped,
}

#[derive(Debug, Deserialize)]
pub struct DeleteParams {
    #[serde(default)]
    pub confirm: bool,
}

#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub deleted: String,
}

/// POST /scan/mode
///
/// **Request:** `{"mode": "scan" | "manual"}`; manual turns the camera off.
pub async fn set_mode(
    State(state): State<AppState>,
    Json(request): Json<ModeRequest>,
) -> ApiResult<Json<SessionView>> {
    let session = state.active_session().await?;
    session.set_mode(request.mode).await;
    Ok(Json(SessionView::of(&session).await))
}

/// POST /scan/camera/on
///
/// **Errors:** 503 when the camera can't be acquired (state moves to `error`)
pub async fn camera_on(State(state): State<AppState>) -> ApiResult<Json<CameraResponse>> {
    let session = state.active_session().await?;
    let camera = session.enable_camera().await?;
    Ok(Json(CameraResponse { camera }))
}

/// POST /scan/camera/off
pub async fn camera_off(State(state): State<AppState>) -> ApiResult<Json<CameraResponse>> {
    let session = state.active_session().await?;
    let camera = session.disable_camera().await;
    Ok(Json(CameraResponse { camera }))
}

/// POST /scan/decode
///
/// Feed one decoded text into the live decode stream. Accepted (202) means
/// the camera is streaming; the debounced outcome is published as events.
pub async fn decode(
    State(state): State<AppState>,
    Json(request): Json<DecodeRequest>,
) -> ApiResult<StatusCode> {
    state.active_session().await?;

    let text = request.text.trim();
    if text.is_empty() {
        return Ok(StatusCode::NO_CONTENT);
    }
    if !state.feed.feed(text) {
        return Err(IntakeError::Device(DeviceError("Camera is not ready.".to_string())).into());
    }
    Ok(StatusCode::ACCEPTED)
}

/// PUT /scan/photo
///
/// Raw body is the photo; `content-type` is kept for the stored object.
/// Replaces any previously attached photo.
pub async fn put_photo(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<PhotoResponse>> {
    let session = state.active_session().await?;
    if body.is_empty() {
        return Err(ApiError::BadRequest("Photo is empty".to_string()));
    }

    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("application/octet-stream")
        .to_string();
    let size = body.len();
    session
        .attach_photo(CapturePhoto::new(body.to_vec(), content_type))
        .await;

    Ok(Json(PhotoResponse {
        has_photo: true,
        bytes: Some(size),
    }))
}

/// DELETE /scan/photo
pub async fn delete_photo(State(state): State<AppState>) -> ApiResult<Json<PhotoResponse>> {
    let session = state.active_session().await?;
    session.clear_photo().await;
    Ok(Json(PhotoResponse {
        has_photo: false,
        bytes: None,
    }))
}

/// POST /scan/manual
///
/// **Request:** `{"ticket_code": "AB123", "kind": "paper", "persons": 2}`
///
/// **Errors:**
/// - 400 Validation (no photo attached, blank reference, bad person count)
/// - 409 Ticket already scanned
/// - 502 Upload or store failure (nothing recorded)
pub async fn submit_manual(
    State(state): State<AppState>,
    Json(entry): Json<ManualEntry>,
) -> ApiResult<(StatusCode, Json<SubmitResponse>)> {
    let session = state.active_session().await?;

    match session.submit_manual(entry).await? {
        SubmitOutcome::Recorded(scan) => {
            Ok((StatusCode::CREATED, Json(SubmitResponse::Recorded { scan })))
        }
        SubmitOutcome::Dropped => Ok((StatusCode::ACCEPTED, Json(SubmitResponse::Dropped))),
    }
}

/// DELETE /scan/scans/:id?confirm=true
pub async fn delete_scan(
    State(state): State<AppState>,
    Path(scan_id): Path<String>,
    Query(params): Query<DeleteParams>,
) -> ApiResult<Json<DeleteResponse>> {
    let session = state.active_session().await?;

    match session.delete_scan(&scan_id, params.confirm).await? {
        DeleteOutcome::Deleted => Ok(Json(DeleteResponse { deleted: scan_id })),
        DeleteOutcome::NotConfirmed => {
            debug!(scan_id = %scan_id, "Delete not confirmed");
            Err(ApiError::BadRequest(
                "Delete this ticket scan? Repeat with confirm=true.".to_string(),
            ))
        }
    }
}

/// Build scan routes
pub fn scan_routes() -> Router<AppState> {
    Router::new()
        .route("/scan/mode", post(set_mode))
        .route("/scan/camera/on", post(camera_on))
        .route("/scan/camera/off", post(camera_off))
        .route("/scan/decode", post(decode))
        .route(
            "/scan/photo",
            put(put_photo)
                .delete(delete_photo)
                .layer(DefaultBodyLimit::max(MAX_PHOTO_BYTES)),
        )
        .route("/scan/manual", post(submit_manual))
        .route("/scan/scans/:id", delete(delete_scan))
        .route("/scan/events", get(super::sse::event_stream))
}
