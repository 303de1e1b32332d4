//! Tour history: read-only scan list with public photo URLs

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use serde::Serialize;

use crate::intake::coordinator::load_scans;
use crate::models::{total_persons, SourceKind};
use crate::{ApiResult, AppState};

#[derive(Debug, Serialize)]
pub struct HistoryEntry {
    pub id: String,
    pub ticket_code: String,
    pub kind: SourceKind,
    pub persons: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tourist_name: Option<String>,
    pub scanned_at: Option<String>,
    pub photo_url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub slot_id: String,
    pub total_persons: u64,
    pub scans: Vec<HistoryEntry>,
}

/// GET /history/:slot_id/scans
pub async fn tour_scans(
    State(state): State<AppState>,
    Path(slot_id): Path<String>,
) -> ApiResult<Json<HistoryResponse>> {
    let scans = load_scans(state.services.store.as_ref(), &slot_id).await?;

    let bucket = &state.settings.photo_bucket;
    let entries: Vec<HistoryEntry> = scans
        .into_iter()
        .map(|scan| HistoryEntry {
            photo_url: scan
                .photo_path
                .as_deref()
                .map(|path| state.services.blobs.public_url(bucket, path)),
            id: scan.id,
            ticket_code: scan.ticket_code,
            kind: scan.kind,
            persons: scan.persons,
            tourist_name: scan.tourist_name,
            scanned_at: scan.scanned_at,
        })
        .collect();

    Ok(Json(HistoryResponse {
        total_persons: total_persons(entries.iter().map(|e| e.persons)),
        slot_id,
        scans: entries,
    }))
}

/// Build history routes
pub fn history_routes() -> Router<AppState> {
    Router::new().route("/history/:slot_id/scans", get(tour_scans))
}
