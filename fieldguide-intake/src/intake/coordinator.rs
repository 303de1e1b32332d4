//! Intake coordinator
//!
//! Orchestrates one intake attempt: validate, check the dedup ledger,
//! re-check the remote store, upload the photo, insert the scan, then reload
//! the visible list. At most one attempt runs at a time; attempts arriving
//! while one is pending are dropped, not queued.
//!
//! After every successful mutation the visible list and the ledger are
//! reloaded in full from the store rather than patched, so writes made by
//! other devices on the same tour show up.

use fieldguide_common::events::{EventBus, IntakeEvent};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::capture::CapturePhoto;
use super::ledger::DedupLedger;
use super::parser::normalize;
use crate::error::IntakeError;
use crate::models::{NewTicketScan, SourceKind, TicketScan, TourInstance};
use crate::store::{BlobStorage, Query, RemoteStore, Row, TICKET_SCANS};

/// How a submit was triggered and what it carries
#[derive(Debug, Clone, Copy)]
pub struct SubmitOptions<'a> {
    pub source_kind: SourceKind,
    /// Triggered by the live decode stream rather than the operator
    pub from_scanner: bool,
    /// Person count; 1 when absent
    pub persons_override: Option<i64>,
    pub photo: Option<&'a CapturePhoto>,
    /// Publish the recorded scan as a confirmation
    pub confirm: bool,
}

impl<'a> SubmitOptions<'a> {
    /// Scanner-triggered submit of a parsed ticket
    pub fn scanner(persons: u32) -> Self {
        Self {
            source_kind: SourceKind::Scanned,
            from_scanner: true,
            persons_override: Some(i64::from(persons)),
            photo: None,
            confirm: true,
        }
    }

    /// Operator-entered submit
    pub fn manual(source_kind: SourceKind, persons: i64, photo: Option<&'a CapturePhoto>) -> Self {
        Self {
            source_kind,
            from_scanner: false,
            persons_override: Some(persons),
            photo,
            confirm: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    Recorded(TicketScan),
    /// Another submit was in flight
    Dropped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    /// Operator did not confirm; nothing was touched
    NotConfirmed,
}

/// Clears the in-flight flag when the attempt ends, whatever the outcome
struct InFlightGuard<'a>(&'a AtomicBool);

impl<'a> InFlightGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Per-session intake state for one tour instance
pub struct IntakeCoordinator {
    tour: TourInstance,
    store: Arc<dyn RemoteStore>,
    blobs: Arc<dyn BlobStorage>,
    events: EventBus,
    photo_bucket: String,
    ledger: Mutex<DedupLedger>,
    scans: RwLock<Vec<TicketScan>>,
    in_flight: AtomicBool,
}

impl IntakeCoordinator {
    /// Bind to `tour` with its already-loaded scans (newest first)
    pub fn new(
        tour: TourInstance,
        store: Arc<dyn RemoteStore>,
        blobs: Arc<dyn BlobStorage>,
        events: EventBus,
        photo_bucket: impl Into<String>,
        existing: Vec<TicketScan>,
    ) -> Self {
        let mut ledger = DedupLedger::new();
        ledger.reset_from(existing.iter().map(|scan| scan.ticket_code.clone()));

        Self {
            tour,
            store,
            blobs,
            events,
            photo_bucket: photo_bucket.into(),
            ledger: Mutex::new(ledger),
            scans: RwLock::new(existing),
            in_flight: AtomicBool::new(false),
        }
    }

    pub fn tour(&self) -> &TourInstance {
        &self.tour
    }

    /// Visible scan list, newest first
    pub fn scans(&self) -> Vec<TicketScan> {
        self.scans_read().clone()
    }

    pub fn is_recorded(&self, reference: &str) -> bool {
        self.ledger().contains(reference)
    }

    pub fn ledger_len(&self) -> usize {
        self.ledger().len()
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Run one intake attempt and publish its outcome
    pub async fn submit_scan(
        &self,
        reference: &str,
        options: SubmitOptions<'_>,
    ) -> Result<SubmitOutcome, IntakeError> {
        let result = self.try_submit(reference, &options).await;

        match &result {
            Ok(SubmitOutcome::Recorded(scan)) => {
                info!(
                    slot_id = %self.tour.id,
                    reference = %scan.ticket_code,
                    persons = scan.persons,
                    kind = %scan.kind,
                    "Added {}p · ref {}",
                    scan.persons,
                    scan.ticket_code
                );
                self.events.emit_lossy(IntakeEvent::ScanRecorded {
                    slot_id: self.tour.id.clone(),
                    scan_id: scan.id.clone(),
                    reference: scan.ticket_code.clone(),
                    kind: scan.kind,
                    persons: scan.persons,
                    confirm: options.confirm,
                    timestamp: fieldguide_common::time::now(),
                });
            }
            Ok(SubmitOutcome::Dropped) => {
                debug!(reference, "Submit dropped: another attempt is in flight");
            }
            Err(IntakeError::DuplicateTicket {
                reference,
                from_scanner,
            }) => {
                info!(slot_id = %self.tour.id, reference = %reference, from_scanner, "Duplicate ticket");
                self.events.emit_lossy(IntakeEvent::DuplicateTicket {
                    reference: reference.clone(),
                    from_scanner: *from_scanner,
                    timestamp: fieldguide_common::time::now(),
                });
            }
            Err(e) => {
                match e {
                    IntakeError::Remote(_) => error!(slot_id = %self.tour.id, error = %e, "Intake failed"),
                    _ => warn!(slot_id = %self.tour.id, error = %e, "Intake rejected"),
                }
                self.events.emit_lossy(IntakeEvent::IntakeFailed {
                    message: e.to_string(),
                    from_scanner: options.from_scanner,
                    timestamp: fieldguide_common::time::now(),
                });
            }
        }

        result
    }

    async fn try_submit(
        &self,
        raw_reference: &str,
        options: &SubmitOptions<'_>,
    ) -> Result<SubmitOutcome, IntakeError> {
        let Some(_guard) = InFlightGuard::acquire(&self.in_flight) else {
            return Ok(SubmitOutcome::Dropped);
        };

        if !options.from_scanner && options.photo.is_none() {
            return Err(IntakeError::Validation(
                "A photo of the ticket is required.".to_string(),
            ));
        }
        let reference = resolve_reference(raw_reference, options)?;
        let persons = validate_persons(options.persons_override.unwrap_or(1))?;

        let duplicate = IntakeError::DuplicateTicket {
            reference: reference.clone(),
            from_scanner: options.from_scanner,
        };

        let known = self.ledger().contains(&reference);
        if known {
            return Err(duplicate);
        }

        let existing = self
            .store
            .find(
                TICKET_SCANS,
                &Query::new()
                    .eq("slot_id", self.tour.id.as_str())
                    .eq("ticket_code", reference.as_str())
                    .limit(1),
            )
            .await?;
        if !existing.is_empty() {
            // Recorded by another device since the last reload
            self.ledger().add(&reference);
            return Err(duplicate);
        }

        let photo_path = match options.photo {
            Some(photo) => {
                let path = format!("{}/{}.{}", self.tour.id, Uuid::new_v4(), photo.extension());
                self.blobs
                    .upload(&self.photo_bucket, &path, &photo.bytes)
                    .await?;
                debug!(bucket = %self.photo_bucket, path = %path, "Ticket photo uploaded");
                Some(path)
            }
            None => None,
        };

        let new_scan = NewTicketScan {
            slot_id: self.tour.id.clone(),
            ticket_code: reference.clone(),
            kind: options.source_kind,
            persons,
            photo_path,
        };
        let row = match self.store.insert(TICKET_SCANS, new_scan.to_record()).await {
            Ok(row) => row,
            Err(e) => {
                if let Some(path) = &new_scan.photo_path {
                    self.discard_photo(path).await;
                }
                return Err(e.into());
            }
        };
        self.ledger().add(&reference);

        let recorded = recorded_scan(row, &new_scan);
        if let Err(e) = self.reload().await {
            warn!(slot_id = %self.tour.id, error = %e, "Scan list refresh failed, showing local copy");
            self.scans_write().insert(0, recorded.clone());
        }

        Ok(SubmitOutcome::Recorded(recorded))
    }

    /// Delete a recorded scan after operator confirmation
    pub async fn delete_scan(
        &self,
        scan_id: &str,
        confirmed: bool,
    ) -> Result<DeleteOutcome, IntakeError> {
        if !confirmed {
            return Ok(DeleteOutcome::NotConfirmed);
        }

        let reference = self
            .scans_read()
            .iter()
            .find(|scan| scan.id == scan_id)
            .map(|scan| scan.ticket_code.clone());
        let Some(reference) = reference else {
            warn!(slot_id = %self.tour.id, scan_id, "Delete refused: scan not in this tour");
            return Err(IntakeError::UnknownScan(scan_id.to_string()));
        };

        if let Err(e) = self.store.delete(TICKET_SCANS, scan_id).await {
            error!(slot_id = %self.tour.id, scan_id, error = %e, "Delete failed");
            self.events.emit_lossy(IntakeEvent::IntakeFailed {
                message: e.to_string(),
                from_scanner: false,
                timestamp: fieldguide_common::time::now(),
            });
            return Err(e.into());
        }

        {
            let mut scans = self.scans_write();
            scans.retain(|scan| scan.id != scan_id);
            // Another device may have recorded the same code
            if !scans.iter().any(|scan| scan.ticket_code == reference) {
                self.ledger().remove(&reference);
            }
        }

        info!(slot_id = %self.tour.id, scan_id, reference = %reference, "Scan deleted");
        self.events.emit_lossy(IntakeEvent::ScanDeleted {
            slot_id: self.tour.id.clone(),
            scan_id: scan_id.to_string(),
            reference: Some(reference),
            timestamp: fieldguide_common::time::now(),
        });

        Ok(DeleteOutcome::Deleted)
    }

    /// Replace the visible list and the ledger with the store's current rows
    pub async fn reload(&self) -> Result<(), IntakeError> {
        let scans = load_scans(self.store.as_ref(), &self.tour.id).await?;

        self.ledger()
            .reset_from(scans.iter().map(|scan| scan.ticket_code.clone()));
        *self.scans_write() = scans;
        Ok(())
    }

    /// Best-effort removal of a photo whose scan was never inserted
    async fn discard_photo(&self, path: &str) {
        match self.blobs.remove(&self.photo_bucket, path).await {
            Ok(()) => debug!(bucket = %self.photo_bucket, path, "Unreferenced ticket photo removed"),
            Err(e) => warn!(bucket = %self.photo_bucket, path, error = %e, "Unreferenced ticket photo left in storage"),
        }
    }

    fn ledger(&self) -> MutexGuard<'_, DedupLedger> {
        self.ledger.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn scans_read(&self) -> RwLockReadGuard<'_, Vec<TicketScan>> {
        self.scans.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn scans_write(&self) -> RwLockWriteGuard<'_, Vec<TicketScan>> {
        self.scans.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Scans of one tour instance, newest first
///
/// Rows that fail to decode are skipped with a warning.
pub async fn load_scans(store: &dyn RemoteStore, slot_id: &str) -> Result<Vec<TicketScan>, IntakeError> {
    let rows = store
        .find(
            TICKET_SCANS,
            &Query::new()
                .eq("slot_id", slot_id)
                .order_by("scanned_at", false),
        )
        .await?;

    Ok(rows
        .into_iter()
        .filter_map(|row| match TicketScan::from_row(row) {
            Ok(scan) => Some(scan),
            Err(e) => {
                warn!(slot_id, error = %e, "Skipping malformed ticket scan row");
                None
            }
        })
        .collect())
}

/// Normalized reference, or a minted placeholder for photographed tickets without one
fn resolve_reference(raw: &str, options: &SubmitOptions<'_>) -> Result<String, IntakeError> {
    let reference = normalize(raw);
    if !reference.is_empty() {
        return Ok(reference);
    }

    let photographed = !options.from_scanner
        && options.photo.is_some()
        && options.source_kind != SourceKind::Scanned;
    if photographed {
        return Ok(placeholder_reference(options.source_kind));
    }

    Err(IntakeError::Validation("Ticket code is required.".to_string()))
}

/// `PAPER-1A2B3C4D` style reference, unique per call
fn placeholder_reference(kind: SourceKind) -> String {
    let token = Uuid::new_v4().simple().to_string();
    format!("{}-{}", kind.as_str().to_uppercase(), token[..8].to_uppercase())
}

fn validate_persons(persons: i64) -> Result<u32, IntakeError> {
    u32::try_from(persons)
        .ok()
        .filter(|p| *p > 0)
        .ok_or_else(|| IntakeError::Validation("Persons must be a positive number.".to_string()))
}

/// Decode the inserted row, falling back to what was sent
fn recorded_scan(row: Row, sent: &NewTicketScan) -> TicketScan {
    let id = row
        .get("id")
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string();

    TicketScan::from_row(row).unwrap_or_else(|e| {
        warn!(error = %e, "Inserted row did not decode");
        TicketScan {
            id,
            slot_id: Some(sent.slot_id.clone()),
            ticket_code: sent.ticket_code.clone(),
            kind: sent.kind,
            persons: sent.persons,
            scanned_at: None,
            photo_path: sent.photo_path.clone(),
            tourist_name: None,
        }
    })
}
