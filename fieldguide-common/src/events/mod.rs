//! Event system for Fieldguide
//!
//! Provides the intake event definitions and the EventBus used to fan them out
//! to SSE clients.

mod shared_types;

pub use shared_types::{CameraState, SourceKind};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Ticket intake events
///
/// Serialized with a `type` tag for SSE transmission.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum IntakeEvent {
    /// Intake session bound to a tour instance
    SessionStarted {
        slot_id: String,
        slot_date: String,
        slot_time: String,
        existing_scans: usize,
        timestamp: DateTime<Utc>,
    },

    /// Ticket scan persisted
    ScanRecorded {
        slot_id: String,
        scan_id: String,
        reference: String,
        kind: SourceKind,
        persons: u32,
        /// Operator asked to be shown a confirmation
        confirm: bool,
        timestamp: DateTime<Utc>,
    },

    /// Ticket scan removed by the operator
    ScanDeleted {
        slot_id: String,
        scan_id: String,
        reference: Option<String>,
        timestamp: DateTime<Utc>,
    },

    /// Ticket was already recorded for this tour
    ///
    /// Scanner-triggered duplicates are shown as a blocking alert.
    DuplicateTicket {
        reference: String,
        from_scanner: bool,
        timestamp: DateTime<Utc>,
    },

    /// Intake attempt failed (validation, remote or device error)
    IntakeFailed {
        message: String,
        from_scanner: bool,
        timestamp: DateTime<Utc>,
    },

    /// Transient scanner advisory; `None` clears it
    ScanAdvisory {
        message: Option<String>,
        timestamp: DateTime<Utc>,
    },

    /// Camera lifecycle transition
    CameraStateChanged {
        old_state: CameraState,
        new_state: CameraState,
        timestamp: DateTime<Utc>,
    },
}

impl IntakeEvent {
    /// Event name used for the SSE `event:` field
    pub fn event_type(&self) -> &'static str {
        match self {
            IntakeEvent::SessionStarted { .. } => "SessionStarted",
            IntakeEvent::ScanRecorded { .. } => "ScanRecorded",
            IntakeEvent::ScanDeleted { .. } => "ScanDeleted",
            IntakeEvent::DuplicateTicket { .. } => "DuplicateTicket",
            IntakeEvent::IntakeFailed { .. } => "IntakeFailed",
            IntakeEvent::ScanAdvisory { .. } => "ScanAdvisory",
            IntakeEvent::CameraStateChanged { .. } => "CameraStateChanged",
        }
    }
}

/// Central event distribution bus
///
/// Uses `tokio::sync::broadcast` internally:
/// - Non-blocking publish (slow subscribers don't block producers)
/// - Multiple concurrent subscribers
/// - Lagged message detection for slow subscribers
///
/// # Examples
///
/// ```
/// use fieldguide_common::events::{EventBus, IntakeEvent};
///
/// let event_bus = EventBus::new(100);
/// let mut rx = event_bus.subscribe();
///
/// event_bus.emit_lossy(IntakeEvent::ScanAdvisory {
///     message: Some("QR unknown".to_string()),
///     timestamp: chrono::Utc::now(),
/// });
///
/// assert!(rx.try_recv().is_ok());
/// ```
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<IntakeEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with the given channel capacity
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<IntakeEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Err` if no subscribers are listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: IntakeEvent,
    ) -> Result<usize, broadcast::error::SendError<IntakeEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: IntakeEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
