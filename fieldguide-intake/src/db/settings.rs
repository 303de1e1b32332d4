//! Settings database operations
//!
//! Key-value accessors for the `settings` table.

use fieldguide_common::{Error, Result};
use sqlx::{Pool, Sqlite};

/// Signed-in guide user id, if stored
pub async fn get_guide_user_id(db: &Pool<Sqlite>) -> Result<Option<String>> {
    get_setting::<String>(db, "guide_user_id").await
}

pub async fn set_guide_user_id(db: &Pool<Sqlite>, user_id: String) -> Result<()> {
    set_setting(db, "guide_user_id", user_id).await
}

/// Remove the stored guide user id (sign out)
pub async fn clear_guide_user_id(db: &Pool<Sqlite>) -> Result<()> {
    sqlx::query("DELETE FROM settings WHERE key = 'guide_user_id'")
        .execute(db)
        .await
        .map_err(Error::Database)?;
    Ok(())
}

async fn get_setting<T>(db: &Pool<Sqlite>, key: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let row: Option<(String,)> = sqlx::query_as("SELECT value FROM settings WHERE key = ?")
        .bind(key)
        .fetch_optional(db)
        .await
        .map_err(Error::Database)?;

    match row {
        Some((value,)) => {
            let parsed = value
                .parse::<T>()
                .map_err(|e| Error::Config(format!("Parse setting failed: {}", e)))?;
            Ok(Some(parsed))
        }
        None => Ok(None),
    }
}

async fn set_setting<T>(db: &Pool<Sqlite>, key: &str, value: T) -> Result<()>
where
    T: std::fmt::Display,
{
    sqlx::query(
        "INSERT INTO settings (key, value) VALUES (?, ?)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
    )
    .bind(key)
    .bind(value.to_string())
    .execute(db)
    .await
    .map_err(Error::Database)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_guide_user_id_set_get_clear() {
        let pool = crate::db::init_memory_pool().await.unwrap();

        assert_eq!(get_guide_user_id(&pool).await.unwrap(), None);

        set_guide_user_id(&pool, "user-1".to_string()).await.unwrap();
        set_guide_user_id(&pool, "user-2".to_string()).await.unwrap();
        assert_eq!(get_guide_user_id(&pool).await.unwrap(), Some("user-2".to_string()));

        clear_guide_user_id(&pool).await.unwrap();
        assert_eq!(get_guide_user_id(&pool).await.unwrap(), None);
    }
}
