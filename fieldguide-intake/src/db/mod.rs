//! Database access for fieldguide-intake
//!
//! Local SQLite rendition of the remote data store: connection pool and schema.

pub mod settings;

use anyhow::Result;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use std::path::Path;

/// Initialize database connection pool
///
/// Creates the database file (and parent directory) on first start.
pub async fn init_database_pool(db_path: &Path) -> Result<SqlitePool> {
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // mode=rwc: read, write, create
    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    tracing::debug!("Connecting to database: {}", db_url);

    let pool = SqlitePool::connect(&db_url).await?;
    init_tables(&pool).await?;

    Ok(pool)
}

/// Single-connection in-memory database with the schema applied
///
/// Every pooled connection to `sqlite::memory:` would see its own database,
/// so the pool is capped at one connection.
pub async fn init_memory_pool() -> Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await?;
    init_tables(&pool).await?;
    Ok(pool)
}

/// Create tables if they don't exist
pub async fn init_tables(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS settings (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS guides (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            name TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS schedule_slots (
            id TEXT PRIMARY KEY,
            guide_id TEXT,
            slot_date TEXT NOT NULL,
            slot_time TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'scheduled'
        )
        "#,
    )
    .execute(pool)
    .await?;

    // (slot_id, ticket_code) uniqueness is an application-level rule
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS ticket_scans (
            id TEXT PRIMARY KEY,
            slot_id TEXT NOT NULL,
            ticket_code TEXT NOT NULL,
            kind TEXT NOT NULL,
            persons INTEGER,
            tourist_name TEXT,
            scanned_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
            photo_path TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_ticket_scans_slot ON ticket_scans(slot_id, scanned_at)")
        .execute(pool)
        .await?;

    tracing::info!("Database tables initialized (settings, guides, schedule_slots, ticket_scans)");

    Ok(())
}
