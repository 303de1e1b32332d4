//! Collaborator test doubles for fault injection and call counting

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

use fieldguide_intake::intake::capture::{CameraConstraints, DecodeSink, DecoderDevice, DeviceError, StreamHandle};
use fieldguide_intake::store::{BlobStorage, Query, RemoteStore, Row, StoreError};

/// Blob storage whose uploads always fail
pub struct FailingBlobs;

#[async_trait]
impl BlobStorage for FailingBlobs {
    async fn upload(&self, _bucket: &str, _path: &str, _bytes: &[u8]) -> Result<(), StoreError> {
        Err(StoreError::Rejected("Storage quota exceeded".to_string()))
    }

    async fn remove(&self, _bucket: &str, _path: &str) -> Result<(), StoreError> {
        Ok(())
    }

    fn public_url(&self, bucket: &str, path: &str) -> String {
        format!("http://unused/{}/{}", bucket, path)
    }
}

/// Blob storage that parks every upload until released
#[derive(Default)]
pub struct BlockingBlobs {
    pub entered: Notify,
    pub release: Notify,
}

#[async_trait]
impl BlobStorage for BlockingBlobs {
    async fn upload(&self, _bucket: &str, _path: &str, _bytes: &[u8]) -> Result<(), StoreError> {
        self.entered.notify_one();
        self.release.notified().await;
        Ok(())
    }

    async fn remove(&self, _bucket: &str, _path: &str) -> Result<(), StoreError> {
        Ok(())
    }

    fn public_url(&self, bucket: &str, path: &str) -> String {
        format!("http://blocking/{}/{}", bucket, path)
    }
}

/// Store wrapper counting every call made through it
pub struct CountingStore {
    inner: Arc<dyn RemoteStore>,
    pub finds: AtomicUsize,
    pub inserts: AtomicUsize,
    pub deletes: AtomicUsize,
}

impl CountingStore {
    pub fn new(inner: Arc<dyn RemoteStore>) -> Self {
        Self {
            inner,
            finds: AtomicUsize::new(0),
            inserts: AtomicUsize::new(0),
            deletes: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.finds.load(Ordering::SeqCst)
            + self.inserts.load(Ordering::SeqCst)
            + self.deletes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RemoteStore for CountingStore {
    async fn find(&self, table: &str, query: &Query) -> Result<Vec<Row>, StoreError> {
        self.finds.fetch_add(1, Ordering::SeqCst);
        self.inner.find(table, query).await
    }

    async fn insert(&self, table: &str, record: Row) -> Result<Row, StoreError> {
        self.inserts.fetch_add(1, Ordering::SeqCst);
        self.inner.insert(table, record).await
    }

    async fn delete(&self, table: &str, id: &str) -> Result<(), StoreError> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        self.inner.delete(table, id).await
    }
}

/// Store wrapper whose operations fail on demand
pub struct FaultyStore {
    inner: Arc<dyn RemoteStore>,
    pub fail_find: AtomicBool,
    pub fail_insert: AtomicBool,
    pub fail_delete: AtomicBool,
}

impl FaultyStore {
    pub fn new(inner: Arc<dyn RemoteStore>) -> Self {
        Self {
            inner,
            fail_find: AtomicBool::new(false),
            fail_insert: AtomicBool::new(false),
            fail_delete: AtomicBool::new(false),
        }
    }

    fn check(flag: &AtomicBool, message: &str) -> Result<(), StoreError> {
        if flag.load(Ordering::SeqCst) {
            Err(StoreError::Rejected(message.to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl RemoteStore for FaultyStore {
    async fn find(&self, table: &str, query: &Query) -> Result<Vec<Row>, StoreError> {
        Self::check(&self.fail_find, "Network request failed")?;
        self.inner.find(table, query).await
    }

    async fn insert(&self, table: &str, record: Row) -> Result<Row, StoreError> {
        Self::check(&self.fail_insert, "Insert rejected by store")?;
        self.inner.insert(table, record).await
    }

    async fn delete(&self, table: &str, id: &str) -> Result<(), StoreError> {
        Self::check(&self.fail_delete, "Delete rejected by store")?;
        self.inner.delete(table, id).await
    }
}

/// Camera that counts starts and stops; optionally refuses to start
#[derive(Default)]
pub struct CountingDevice {
    pub starts: AtomicUsize,
    pub stops: AtomicUsize,
    pub deny: bool,
}

impl CountingDevice {
    pub fn denying() -> Self {
        Self {
            deny: true,
            ..Default::default()
        }
    }

    pub fn stops(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DecoderDevice for CountingDevice {
    async fn start(
        &self,
        _constraints: &CameraConstraints,
        _sink: DecodeSink,
    ) -> Result<StreamHandle, DeviceError> {
        if self.deny {
            return Err(DeviceError("Permission denied".to_string()));
        }
        let n = self.starts.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(StreamHandle(n as u64))
    }

    fn stop(&self, _handle: StreamHandle) {
        self.stops.fetch_add(1, Ordering::SeqCst);
    }
}
