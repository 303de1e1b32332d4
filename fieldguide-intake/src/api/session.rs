//! Intake session endpoints
//!
//! - `POST /session/start`: sign in (optional) and bind to the active tour
//! - `GET /session`: active tour, capture state and visible scan list
//! - `POST /session/sign-out`: tear the session down and forget the guide

use axum::{extract::State, routing::{get, post}, Json, Router};
use fieldguide_common::events::CameraState;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::intake::{CaptureMode, IntakeSession};
use crate::models::{total_persons, TicketScan};
use crate::store::SessionProvider;
use crate::{ApiError, ApiResult, AppState};

/// Optional sign-in carried by `POST /session/start`
#[derive(Debug, Default, Deserialize)]
pub struct StartSessionRequest {
    #[serde(default)]
    pub user_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TourView {
    pub id: String,
    pub slot_date: String,
    pub slot_time: String,
    /// `2026-10-16 · 14:30`
    pub label: String,
}

#[derive(Debug, Serialize)]
pub struct SessionView {
    pub tour: TourView,
    pub mode: CaptureMode,
    pub camera: CameraState,
    pub has_photo: bool,
    pub total_persons: u64,
    /// Newest first
    pub scans: Vec<TicketScan>,
}

impl SessionView {
    pub async fn of(session: &IntakeSession) -> Self {
        let tour = session.tour();
        let scans = session.scans();
        Self {
            tour: TourView {
                id: tour.id.clone(),
                slot_date: tour.slot_date.clone(),
                slot_time: tour.slot_time.clone(),
                label: tour.label(),
            },
            mode: session.mode(),
            camera: session.camera_state().await,
            has_photo: session.has_photo().await,
            total_persons: total_persons(scans.iter().map(|scan| scan.persons)),
            scans,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SignOutResponse {
    pub success: bool,
    pub message: String,
}

/// POST /session/start
///
/// **Request:** `{"user_id": "..."}` (optional; signs the guide in first)
///
/// **Errors:**
/// - 401 Not logged in
/// - 403 No guide profile linked to this user
/// - 409 No tour starting within the next hour
/// - 502 Store failure
///
/// A previously running session is closed (camera and photo released)
/// before the new one starts.
pub async fn start_session(
    State(state): State<AppState>,
    payload: Option<Json<StartSessionRequest>>,
) -> ApiResult<Json<SessionView>> {
    if let Some(user_id) = payload.and_then(|Json(p)| p.user_id) {
        if !crate::config::is_valid_user_id(&user_id) {
            return Err(ApiError::BadRequest("user_id cannot be empty".to_string()));
        }
        crate::db::settings::set_guide_user_id(&state.db, user_id.clone()).await?;
        state.auth.sign_in(user_id.clone()).await;
        info!(user = %user_id, "Guide signed in");
    }

    let previous = state.intake.write().await.take();
    if let Some(previous) = previous {
        previous.shutdown().await;
    }

    let session = match IntakeSession::start(&state.services, &state.settings).await {
        Ok(session) => session,
        Err(e) => {
            warn!(error = %e, "Intake session not started");
            state.record_error(e.to_string()).await;
            return Err(e.into());
        }
    };

    *state.intake.write().await = Some(session.clone());
    Ok(Json(SessionView::of(&session).await))
}

/// GET /session
pub async fn get_session(State(state): State<AppState>) -> ApiResult<Json<SessionView>> {
    let session = state.active_session().await?;
    Ok(Json(SessionView::of(&session).await))
}

/// POST /session/sign-out
pub async fn sign_out(State(state): State<AppState>) -> ApiResult<Json<SignOutResponse>> {
    let session = state.intake.write().await.take();
    if let Some(session) = session {
        session.shutdown().await;
    }

    state.auth.sign_out().await;
    crate::db::settings::clear_guide_user_id(&state.db).await?;

    Ok(Json(SignOutResponse {
        success: true,
        message: "Signed out".to_string(),
    }))
}

/// Build session routes
pub fn session_routes() -> Router<AppState> {
    Router::new()
        .route("/session", get(get_session))
        .route("/session/start", post(start_session))
        .route("/session/sign-out", post(sign_out))
}
