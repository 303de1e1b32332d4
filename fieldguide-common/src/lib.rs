//! # Fieldguide Common Library
//!
//! Shared code for the Fieldguide tour-guide services:
//! - Error type and result alias
//! - Bootstrap configuration (root folder, TOML, logging)
//! - Intake event types and the EventBus
//! - Timestamp utilities

pub mod config;
pub mod error;
pub mod events;
pub mod time;

pub use error::{Error, Result};
