//! fieldguide-intake library interface
//!
//! Ticket intake and deduplication for guide-led walking tours, plus the
//! HTTP surface the guide's device talks to. Exposed as a library for
//! integration testing.

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod intake;
pub mod models;
pub mod store;

pub use crate::error::{ApiError, ApiResult, IntakeError};

use axum::Router;
use chrono::{DateTime, Utc};
use fieldguide_common::config::IntakeSettings;
use fieldguide_common::events::EventBus;
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::services::ServeDir;

use crate::intake::{FeedDevice, IntakeServices, IntakeSession};
use crate::store::{LocalBlobStorage, SqliteStore, StaticSession};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
    /// Event bus for SSE broadcasting
    pub event_bus: EventBus,
    /// Collaborators handed to each intake session
    pub services: IntakeServices,
    /// Signed-in guide identity
    pub auth: Arc<StaticSession>,
    /// Decoder fed by `POST /scan/decode`
    pub feed: Arc<FeedDevice>,
    /// Current intake session, if started
    pub intake: Arc<RwLock<Option<Arc<IntakeSession>>>>,
    pub settings: IntakeSettings,
    /// Directory served under `/blobs`
    pub blob_root: PathBuf,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
    /// Last error for diagnostic purposes
    pub last_error: Arc<RwLock<Option<String>>>,
}

impl AppState {
    pub fn new(
        db: SqlitePool,
        event_bus: EventBus,
        blob_root: PathBuf,
        public_base_url: &str,
        settings: IntakeSettings,
        guide_user: Option<String>,
    ) -> Self {
        let auth = Arc::new(StaticSession::new(guide_user));
        let feed = Arc::new(FeedDevice::new());
        let services = IntakeServices {
            store: Arc::new(SqliteStore::new(db.clone())),
            blobs: Arc::new(LocalBlobStorage::new(blob_root.clone(), public_base_url)),
            session: auth.clone(),
            device: feed.clone(),
            events: event_bus.clone(),
        };

        Self {
            db,
            event_bus,
            services,
            auth,
            feed,
            intake: Arc::new(RwLock::new(None)),
            settings,
            blob_root,
            startup_time: Utc::now(),
            last_error: Arc::new(RwLock::new(None)),
        }
    }

    /// The running intake session
    pub async fn active_session(&self) -> Result<Arc<IntakeSession>, IntakeError> {
        self.intake
            .read()
            .await
            .clone()
            .ok_or(IntakeError::NoSession)
    }

    pub async fn record_error(&self, message: impl Into<String>) {
        *self.last_error.write().await = Some(message.into());
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    let blobs = ServeDir::new(&state.blob_root);

    Router::new()
        .merge(api::session_routes())
        .merge(api::scan_routes())
        .merge(api::history_routes())
        .merge(api::health_routes())
        .nest_service("/blobs", blobs)
        .with_state(state)
}
