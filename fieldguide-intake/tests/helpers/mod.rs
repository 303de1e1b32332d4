//! Test Helper Utilities
//!
//! Shared utilities for testing fieldguide-intake

#![allow(dead_code)]

pub mod db_utils;
pub mod doubles;

pub use db_utils::{count_scans, seed_guide, seed_slot, seed_tour_starting_in};
pub use doubles::{BlockingBlobs, CountingDevice, CountingStore, FailingBlobs, FaultyStore};

use fieldguide_common::events::{EventBus, IntakeEvent};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

use fieldguide_intake::intake::{DecoderDevice, FeedDevice, IntakeServices};
use fieldguide_intake::store::{BlobStorage, LocalBlobStorage, RemoteStore, SqliteStore, StaticSession};

pub const USER_ID: &str = "user-1";
pub const GUIDE_ID: &str = "guide-1";
pub const SLOT_ID: &str = "slot-1";

/// Scenario A payload
pub const VENDOR_PAYLOAD: &str = "Chester walking tour sold by VIC - 2 person(s) - reference #AB123";

/// Services over an in-memory store and a temp blob directory, signed in as [`USER_ID`]
pub fn services(
    pool: &sqlx::SqlitePool,
    blob_dir: &std::path::Path,
    device: Arc<dyn DecoderDevice>,
) -> IntakeServices {
    services_with(
        Arc::new(SqliteStore::new(pool.clone())),
        Arc::new(LocalBlobStorage::new(blob_dir.to_path_buf(), "http://localhost:5731")),
        device,
    )
}

pub fn services_with(
    store: Arc<dyn RemoteStore>,
    blobs: Arc<dyn BlobStorage>,
    device: Arc<dyn DecoderDevice>,
) -> IntakeServices {
    IntakeServices {
        store,
        blobs,
        session: Arc::new(StaticSession::new(Some(USER_ID.to_string()))),
        device,
        events: EventBus::new(100),
    }
}

pub fn feed_device() -> Arc<FeedDevice> {
    Arc::new(FeedDevice::new())
}

/// Wait for the first event matching `pred`, failing after 5 seconds
pub async fn wait_for_event<F>(rx: &mut broadcast::Receiver<IntakeEvent>, mut pred: F) -> IntakeEvent
where
    F: FnMut(&IntakeEvent) -> bool,
{
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            match rx.recv().await {
                Ok(event) if pred(&event) => return event,
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(e) => panic!("event bus closed: {}", e),
            }
        }
    })
    .await
    .expect("timed out waiting for event")
}
