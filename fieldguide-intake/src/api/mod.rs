//! HTTP API handlers for fieldguide-intake
//!
//! REST routes for the intake screen plus an SSE stream of intake events.

pub mod health;
pub mod history;
pub mod scan;
pub mod session;
pub mod sse;

pub use health::health_routes;
pub use history::history_routes;
pub use scan::scan_routes;
pub use session::session_routes;
pub use sse::event_stream;
