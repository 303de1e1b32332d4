//! Database Test Utilities
//!
//! Seed rows the intake session bootstraps from.

use chrono::{Duration, NaiveDateTime};
use sqlx::SqlitePool;

/// Insert a guide profile linked to `user_id`
pub async fn seed_guide(pool: &SqlitePool, user_id: &str, guide_id: &str) {
    sqlx::query("INSERT INTO guides (id, user_id, name) VALUES (?, ?, ?)")
        .bind(guide_id)
        .bind(user_id)
        .bind("Test Guide")
        .execute(pool)
        .await
        .expect("Failed to seed guide");
}

/// Insert a schedule slot starting at `start`
pub async fn seed_slot(pool: &SqlitePool, guide_id: &str, slot_id: &str, start: NaiveDateTime) {
    sqlx::query("INSERT INTO schedule_slots (id, guide_id, slot_date, slot_time) VALUES (?, ?, ?, ?)")
        .bind(slot_id)
        .bind(guide_id)
        .bind(start.format("%Y-%m-%d").to_string())
        .bind(start.format("%H:%M:%S").to_string())
        .execute(pool)
        .await
        .expect("Failed to seed schedule slot");
}

/// Guide linked to `user_id` with one slot starting `minutes` from local now
pub async fn seed_tour_starting_in(
    pool: &SqlitePool,
    user_id: &str,
    guide_id: &str,
    slot_id: &str,
    minutes: i64,
) {
    seed_guide(pool, user_id, guide_id).await;
    let start = fieldguide_common::time::local_now() + Duration::minutes(minutes);
    seed_slot(pool, guide_id, slot_id, start).await;
}

/// Ticket scan rows recorded for `slot_id`
pub async fn count_scans(pool: &SqlitePool, slot_id: &str) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM ticket_scans WHERE slot_id = ?")
        .bind(slot_id)
        .fetch_one(pool)
        .await
        .expect("Failed to count scans")
}
