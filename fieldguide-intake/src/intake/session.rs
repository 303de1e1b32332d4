//! Intake session: one guide, one active tour, one camera
//!
//! Bootstraps the session (user → guide → active tour → existing scans) and
//! wires the capture sources into the coordinator. Camera decodes run
//! through a pump task: parse → debounce → spawn a scanner submit, so decode
//! callbacks keep flowing while a submit is in flight.

use chrono::{Duration as ChronoDuration, NaiveDateTime};
use fieldguide_common::config::IntakeSettings;
use fieldguide_common::events::{CameraState, EventBus, IntakeEvent};
use serde::Deserialize;
use serde_json::Value;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Instant;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::capture::{
    CameraCapture, CaptureMode, CapturePhoto, DecodeEvent, DecoderDevice, PhotoSlot,
};
use super::coordinator::{load_scans, DeleteOutcome, IntakeCoordinator, SubmitOptions, SubmitOutcome};
use super::debouncer::{Advisory, ScanDebouncer};
use super::parser::parse_payload;
use crate::error::IntakeError;
use crate::models::{SourceKind, TicketScan, TourInstance};
use crate::store::{BlobStorage, Query, RemoteStore, SessionProvider, GUIDES, SCHEDULE_SLOTS};

/// Collaborators an intake session is built from
#[derive(Clone)]
pub struct IntakeServices {
    pub store: Arc<dyn RemoteStore>,
    pub blobs: Arc<dyn BlobStorage>,
    pub session: Arc<dyn SessionProvider>,
    pub device: Arc<dyn DecoderDevice>,
    pub events: EventBus,
}

/// Operator-entered ticket
#[derive(Debug, Clone, Deserialize)]
pub struct ManualEntry {
    /// May be blank for photographed paper/online tickets
    #[serde(default)]
    pub ticket_code: Option<String>,
    #[serde(default = "default_kind")]
    pub kind: SourceKind,
    #[serde(default = "default_persons")]
    pub persons: i64,
}

fn default_kind() -> SourceKind {
    SourceKind::Scanned
}

fn default_persons() -> i64 {
    1
}

/// First slot starting within `[now, now + window]`; `slots` must be in start order
pub fn select_active_tour(
    slots: &[TourInstance],
    now: NaiveDateTime,
    window: ChronoDuration,
) -> Option<&TourInstance> {
    slots.iter().find(|slot| {
        slot.starts_at().is_some_and(|start| {
            let until = start - now;
            until >= ChronoDuration::zero() && until <= window
        })
    })
}

/// Resolve the tour the signed-in guide is about to run
pub async fn resolve_active_tour(
    store: &dyn RemoteStore,
    session: &dyn SessionProvider,
    now: NaiveDateTime,
    window: ChronoDuration,
) -> Result<TourInstance, IntakeError> {
    let user_id = session.current_user().await.ok_or(IntakeError::NotLoggedIn)?;

    let guides = store
        .find(GUIDES, &Query::new().eq("user_id", user_id.as_str()).limit(1))
        .await?;
    let guide_id = guides
        .first()
        .and_then(|guide| guide.get("id"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or(IntakeError::NoGuideProfile)?;

    let rows = store
        .find(
            SCHEDULE_SLOTS,
            &Query::new()
                .eq("guide_id", guide_id.as_str())
                .order_by("slot_date", true)
                .order_by("slot_time", true),
        )
        .await?;
    let slots: Vec<TourInstance> = rows
        .into_iter()
        .filter_map(|row| serde_json::from_value(Value::Object(row)).ok())
        .collect();

    debug!(guide_id = %guide_id, slots = slots.len(), "Loaded schedule");

    select_active_tour(&slots, now, window)
        .cloned()
        .ok_or(IntakeError::NoActiveTour)
}

struct DecodePump {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl DecodePump {
    fn stop(self) {
        self.cancel.cancel();
        drop(self.task);
    }
}

pub struct IntakeSession {
    coordinator: Arc<IntakeCoordinator>,
    camera: tokio::sync::Mutex<CameraCapture>,
    debouncer: Mutex<ScanDebouncer>,
    photo: tokio::sync::Mutex<PhotoSlot>,
    mode: Mutex<CaptureMode>,
    pump: Mutex<Option<DecodePump>>,
    events: EventBus,
}

impl IntakeSession {
    /// Bootstrap a session for the signed-in guide at the current local time
    pub async fn start(
        services: &IntakeServices,
        settings: &IntakeSettings,
    ) -> Result<Arc<Self>, IntakeError> {
        Self::start_at(services, settings, fieldguide_common::time::local_now()).await
    }

    pub async fn start_at(
        services: &IntakeServices,
        settings: &IntakeSettings,
        now: NaiveDateTime,
    ) -> Result<Arc<Self>, IntakeError> {
        let window = ChronoDuration::minutes(settings.active_window_minutes);
        let tour = resolve_active_tour(
            services.store.as_ref(),
            services.session.as_ref(),
            now,
            window,
        )
        .await?;
        let existing = load_scans(services.store.as_ref(), &tour.id).await?;

        info!(
            slot_id = %tour.id,
            tour = %tour.label(),
            existing_scans = existing.len(),
            "Intake session started"
        );
        services.events.emit_lossy(IntakeEvent::SessionStarted {
            slot_id: tour.id.clone(),
            slot_date: tour.slot_date.clone(),
            slot_time: tour.slot_time.clone(),
            existing_scans: existing.len(),
            timestamp: fieldguide_common::time::now(),
        });

        let coordinator = IntakeCoordinator::new(
            tour,
            Arc::clone(&services.store),
            Arc::clone(&services.blobs),
            services.events.clone(),
            settings.photo_bucket.clone(),
            existing,
        );
        let camera = CameraCapture::new(Arc::clone(&services.device), services.events.clone());
        let cooldown = fieldguide_common::time::millis_to_duration(settings.cooldown_ms);

        Ok(Arc::new(Self {
            coordinator: Arc::new(coordinator),
            camera: tokio::sync::Mutex::new(camera),
            debouncer: Mutex::new(ScanDebouncer::new(cooldown)),
            photo: tokio::sync::Mutex::new(PhotoSlot::new()),
            mode: Mutex::new(CaptureMode::Scan),
            pump: Mutex::new(None),
            events: services.events.clone(),
        }))
    }

    pub fn coordinator(&self) -> &Arc<IntakeCoordinator> {
        &self.coordinator
    }

    pub fn tour(&self) -> &TourInstance {
        self.coordinator.tour()
    }

    pub fn scans(&self) -> Vec<TicketScan> {
        self.coordinator.scans()
    }

    pub fn mode(&self) -> CaptureMode {
        *lock(&self.mode)
    }

    pub async fn camera_state(&self) -> CameraState {
        self.camera.lock().await.state()
    }

    pub async fn has_photo(&self) -> bool {
        self.photo.lock().await.current().is_some()
    }

    /// Switch input mode; manual mode forces the camera off
    pub async fn set_mode(&self, mode: CaptureMode) {
        *lock(&self.mode) = mode;
        debug!(?mode, "Capture mode set");
        if mode == CaptureMode::Manual {
            self.disable_camera().await;
        }
    }

    /// Turn the camera on and start feeding decodes into the debouncer
    pub async fn enable_camera(self: &Arc<Self>) -> Result<CameraState, IntakeError> {
        if self.mode() == CaptureMode::Manual {
            return Err(IntakeError::Validation(
                "Switch to scan mode to use the camera.".to_string(),
            ));
        }

        let mut camera = self.camera.lock().await;
        match camera.enable().await {
            Ok(Some(rx)) => {
                let pump = self.spawn_pump(rx);
                let previous = lock(&self.pump).replace(pump);
                if let Some(previous) = previous {
                    previous.stop();
                }
            }
            Ok(None) => {}
            Err(e) => {
                self.events.emit_lossy(IntakeEvent::IntakeFailed {
                    message: e.to_string(),
                    from_scanner: false,
                    timestamp: fieldguide_common::time::now(),
                });
                return Err(e.into());
            }
        }
        Ok(camera.state())
    }

    /// Release the camera (from any state) and return to `Idle`
    pub async fn disable_camera(&self) -> CameraState {
        self.stop_pump();
        let mut camera = self.camera.lock().await;
        camera.disable();
        camera.state()
    }

    /// Feed one decoded text observed at `at`
    ///
    /// Returns the spawned scanner submit when the debouncer triggered one.
    pub fn handle_decoded(
        &self,
        text: &str,
        at: Instant,
    ) -> Option<JoinHandle<Result<SubmitOutcome, IntakeError>>> {
        let decision = lock(&self.debouncer).observe(parse_payload(text), at);

        if let Some(advisory) = decision.advisory {
            let message = match advisory {
                Advisory::Show(text) => Some(text.to_string()),
                Advisory::Clear => None,
            };
            self.events.emit_lossy(IntakeEvent::ScanAdvisory {
                message,
                timestamp: fieldguide_common::time::now(),
            });
        }

        let ticket = decision.trigger?;
        debug!(reference = %ticket.reference, persons = ticket.person_count, "Scanner trigger");
        let coordinator = Arc::clone(&self.coordinator);
        Some(tokio::spawn(async move {
            coordinator
                .submit_scan(&ticket.reference, SubmitOptions::scanner(ticket.person_count))
                .await
        }))
    }

    /// Hold `photo` for the next manual submit, releasing any previous one
    pub async fn attach_photo(&self, photo: CapturePhoto) {
        debug!(bytes = photo.bytes.len(), content_type = %photo.content_type, "Photo attached");
        self.photo.lock().await.acquire(photo);
    }

    pub async fn clear_photo(&self) {
        self.photo.lock().await.release();
    }

    /// Submit an operator-entered ticket with the attached photo
    ///
    /// The photo is released once the scan is recorded.
    pub async fn submit_manual(&self, entry: ManualEntry) -> Result<SubmitOutcome, IntakeError> {
        let photo = self.photo.lock().await.current().cloned();
        let reference = entry.ticket_code.unwrap_or_default();

        let outcome = self
            .coordinator
            .submit_scan(
                &reference,
                SubmitOptions::manual(entry.kind, entry.persons, photo.as_ref()),
            )
            .await?;

        if matches!(outcome, SubmitOutcome::Recorded(_)) {
            let mut slot = self.photo.lock().await;
            if slot.current() == photo.as_ref() {
                slot.release();
            }
        }
        Ok(outcome)
    }

    pub async fn delete_scan(&self, scan_id: &str, confirmed: bool) -> Result<DeleteOutcome, IntakeError> {
        self.coordinator.delete_scan(scan_id, confirmed).await
    }

    /// Release the camera and the held photo
    pub async fn shutdown(&self) {
        self.disable_camera().await;
        self.photo.lock().await.release();
        info!(slot_id = %self.tour().id, "Intake session closed");
    }

    fn spawn_pump(self: &Arc<Self>, mut rx: mpsc::UnboundedReceiver<DecodeEvent>) -> DecodePump {
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let session: Weak<Self> = Arc::downgrade(self);

        let task = tokio::spawn(async move {
            debug!("Decode pump started");
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    event = rx.recv() => {
                        let Some(event) = event else { break };
                        let Some(session) = session.upgrade() else { break };
                        match event {
                            DecodeEvent::Decoded(text) => {
                                session.handle_decoded(&text, Instant::now());
                            }
                            DecodeEvent::Failed(message) => {
                                session.device_failed(&message, &token).await;
                                break;
                            }
                        }
                    }
                }
            }
            debug!("Decode pump stopped");
        });

        DecodePump { cancel, task }
    }

    /// Failure reported through the pump owning `stream`
    ///
    /// Ignored once that pump was stopped or replaced. Pumps are only replaced
    /// under the camera lock.
    async fn device_failed(&self, message: &str, stream: &CancellationToken) {
        let mut camera = self.camera.lock().await;
        if stream.is_cancelled() {
            debug!(error = message, "Ignoring failure of a released camera stream");
            return;
        }
        self.stop_pump();
        camera.fail(message);
        drop(camera);

        self.events.emit_lossy(IntakeEvent::IntakeFailed {
            message: message.to_string(),
            from_scanner: true,
            timestamp: fieldguide_common::time::now(),
        });
    }

    fn stop_pump(&self) {
        let pump = lock(&self.pump).take();
        if let Some(pump) = pump {
            pump.stop();
        }
    }
}

impl Drop for IntakeSession {
    fn drop(&mut self) {
        // Camera stream and photo are released by their own drops
        self.stop_pump();
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intake::capture::FeedDevice;
    use crate::store::{LocalBlobStorage, SqliteStore, StaticSession};
    use chrono::NaiveDate;

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 10, 16)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    fn slot(id: &str, time: &str) -> TourInstance {
        TourInstance {
            id: id.to_string(),
            slot_date: "2026-10-16".to_string(),
            slot_time: time.to_string(),
        }
    }

    #[test]
    fn test_selects_first_slot_within_window() {
        let slots = vec![
            slot("past", "09:00:00"),
            slot("soon", "14:30:00"),
            slot("later", "14:45:00"),
        ];
        let active = select_active_tour(&slots, at(14, 0), ChronoDuration::minutes(60));
        assert_eq!(active.map(|s| s.id.as_str()), Some("soon"));
    }

    #[test]
    fn test_window_bounds_are_inclusive() {
        let slots = vec![slot("edge", "15:00")];
        assert!(select_active_tour(&slots, at(14, 0), ChronoDuration::minutes(60)).is_some());
        assert!(select_active_tour(&slots, at(15, 0), ChronoDuration::minutes(60)).is_some());
        assert!(select_active_tour(&slots, at(13, 59), ChronoDuration::minutes(60)).is_none());
        assert!(select_active_tour(&slots, at(15, 1), ChronoDuration::minutes(60)).is_none());
    }

    #[test]
    fn test_malformed_slots_are_skipped() {
        let slots = vec![slot("broken", ""), slot("ok", "14:10")];
        let active = select_active_tour(&slots, at(14, 0), ChronoDuration::minutes(60));
        assert_eq!(active.map(|s| s.id.as_str()), Some("ok"));
    }

    async fn streaming_session() -> (Arc<IntakeSession>, Arc<FeedDevice>, tempfile::TempDir) {
        let pool = crate::db::init_memory_pool().await.unwrap();
        sqlx::query("INSERT INTO guides (id, user_id, name) VALUES ('guide-1', 'user-1', 'Guide')")
            .execute(&pool)
            .await
            .unwrap();
        let start = fieldguide_common::time::local_now() + ChronoDuration::minutes(30);
        sqlx::query("INSERT INTO schedule_slots (id, guide_id, slot_date, slot_time) VALUES ('slot-1', 'guide-1', ?, ?)")
            .bind(start.format("%Y-%m-%d").to_string())
            .bind(start.format("%H:%M:%S").to_string())
            .execute(&pool)
            .await
            .unwrap();

        let dir = tempfile::tempdir().unwrap();
        let feed = Arc::new(FeedDevice::new());
        let services = IntakeServices {
            store: Arc::new(SqliteStore::new(pool)),
            blobs: Arc::new(LocalBlobStorage::new(dir.path().to_path_buf(), "")),
            session: Arc::new(StaticSession::new(Some("user-1".to_string()))),
            device: feed.clone(),
            events: EventBus::new(32),
        };
        let session = IntakeSession::start(&services, &IntakeSettings::default())
            .await
            .unwrap();
        session.enable_camera().await.unwrap();
        (session, feed, dir)
    }

    fn current_pump_token(session: &IntakeSession) -> CancellationToken {
        lock(&session.pump).as_ref().unwrap().cancel.clone()
    }

    #[tokio::test]
    async fn test_failure_of_replaced_stream_is_ignored() {
        let (session, feed, _dir) = streaming_session().await;
        let first = current_pump_token(&session);

        session.disable_camera().await;
        session.enable_camera().await.unwrap();
        session.device_failed("Camera disconnected", &first).await;

        assert_eq!(session.camera_state().await, CameraState::Streaming);
        assert!(feed.is_streaming());
        assert!(lock(&session.pump).is_some());
    }

    #[tokio::test]
    async fn test_failure_of_current_stream_releases_camera() {
        let (session, feed, _dir) = streaming_session().await;
        let current = current_pump_token(&session);

        session.device_failed("Camera disconnected", &current).await;

        assert_eq!(session.camera_state().await, CameraState::Error);
        assert!(!feed.is_streaming());
        assert!(lock(&session.pump).is_none());
    }

    #[test]
    fn test_manual_entry_defaults() {
        let entry: ManualEntry = serde_json::from_str("{}").unwrap();
        assert_eq!(entry.kind, SourceKind::Scanned);
        assert_eq!(entry.persons, 1);
        assert!(entry.ticket_code.is_none());
    }
}
