//! Data models for fieldguide-intake
//!
//! - Tour instances read from `schedule_slots`
//! - Ticket scans persisted in `ticket_scans`

pub mod ticket_scan;
pub mod tour;

pub use fieldguide_common::events::SourceKind;
pub use ticket_scan::{total_persons, NewTicketScan, TicketScan};
pub use tour::TourInstance;
