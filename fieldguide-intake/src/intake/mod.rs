//! Ticket intake and deduplication engine
//!
//! Leaf-first: [`parser`] → [`debouncer`] → [`ledger`] → [`capture`] →
//! [`coordinator`], bound together per tour by [`session`].

pub mod capture;
pub mod coordinator;
pub mod debouncer;
pub mod ledger;
pub mod parser;
pub mod session;

pub use capture::{
    CameraCapture, CameraConstraints, CaptureMode, CapturePhoto, DecodeEvent, DecoderDevice,
    DeviceError, FeedDevice, PhotoSlot, StreamHandle,
};
pub use coordinator::{DeleteOutcome, IntakeCoordinator, SubmitOptions, SubmitOutcome};
pub use debouncer::ScanDebouncer;
pub use ledger::DedupLedger;
pub use parser::{parse_payload, ParsedTicket};
pub use session::{IntakeServices, IntakeSession, ManualEntry};
