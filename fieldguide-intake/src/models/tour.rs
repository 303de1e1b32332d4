//! Tour instance (one scheduled, guide-led tour occurrence)

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// One `schedule_slots` row, immutable for the intake session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TourInstance {
    pub id: String,
    #[serde(default)]
    pub slot_date: String,
    #[serde(default)]
    pub slot_time: String,
}

impl TourInstance {
    /// Local start time, `None` when date or time are missing or malformed
    pub fn starts_at(&self) -> Option<NaiveDateTime> {
        fieldguide_common::time::parse_slot_start(&self.slot_date, &self.slot_time)
    }

    /// `2026-10-16 · 14:30` style label
    pub fn label(&self) -> String {
        let time: String = self.slot_time.chars().take(5).collect();
        format!("{} · {}", self.slot_date, time)
    }
}
