//! Collaborator contracts consumed by the intake core
//!
//! - [`RemoteStore`]: row-oriented data store (`find` / `insert` / `delete`)
//! - [`BlobStorage`]: photo storage (`upload` / `remove` / `public_url`)
//! - [`SessionProvider`]: authentication (`current_user` / `sign_out`)
//!
//! Each contract has one local implementation in this module tree; the intake
//! core only ever sees the traits.

pub mod blob;
pub mod session;
pub mod sqlite;

pub use blob::LocalBlobStorage;
pub use session::StaticSession;
pub use sqlite::SqliteStore;

use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;

/// A store row: column name → JSON value
pub type Row = Map<String, Value>;

/// Table holding tour instances
pub const SCHEDULE_SLOTS: &str = "schedule_slots";
/// Table holding ticket scans
pub const TICKET_SCANS: &str = "ticket_scans";
/// Table mapping auth users to guide profiles
pub const GUIDES: &str = "guides";

/// Collaborator failure, displayed verbatim to the operator
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0}")]
    Database(#[from] sqlx::Error),

    #[error("{0}")]
    Io(#[from] std::io::Error),

    /// Request refused by the collaborator (bad identifier, existing object, ...)
    #[error("{0}")]
    Rejected(String),
}

/// Equality filter, ordering and limit for [`RemoteStore::find`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    pub filters: Vec<(String, Value)>,
    /// `(column, ascending)`
    pub order: Vec<(String, bool)>,
    pub limit: Option<usize>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.filters.push((column.to_string(), value.into()));
        self
    }

    pub fn order_by(mut self, column: &str, ascending: bool) -> Self {
        self.order.push((column.to_string(), ascending));
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Row-oriented remote data store
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Rows of `table` matching every filter, in the requested order
    async fn find(&self, table: &str, query: &Query) -> Result<Vec<Row>, StoreError>;

    /// Insert `record`, returning the stored row (with generated columns)
    async fn insert(&self, table: &str, record: Row) -> Result<Row, StoreError>;

    /// Delete the row with the given `id`
    async fn delete(&self, table: &str, id: &str) -> Result<(), StoreError>;
}

/// Blob storage for ticket photos
#[async_trait]
pub trait BlobStorage: Send + Sync {
    async fn upload(&self, bucket: &str, path: &str, bytes: &[u8]) -> Result<(), StoreError>;

    /// Remove an object; removing a missing object is not an error
    async fn remove(&self, bucket: &str, path: &str) -> Result<(), StoreError>;

    fn public_url(&self, bucket: &str, path: &str) -> String;
}

/// Authentication/session collaborator
#[async_trait]
pub trait SessionProvider: Send + Sync {
    /// Signed-in user id, `None` when signed out
    async fn current_user(&self) -> Option<String>;

    async fn sign_out(&self);
}
