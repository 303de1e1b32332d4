//! [`RemoteStore`] over the local SQLite pool

use async_trait::async_trait;
use serde_json::{json, Value};
use sqlx::sqlite::{SqliteArguments, SqliteRow};
use sqlx::{Column, Row as _, Sqlite, SqlitePool, TypeInfo, ValueRef};

use super::{Query, RemoteStore, Row, StoreError};

type SqliteQuery<'q> = sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>>;

/// SQLite-backed remote store
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl RemoteStore for SqliteStore {
    async fn find(&self, table: &str, query: &Query) -> Result<Vec<Row>, StoreError> {
        check_identifier(table)?;

        let mut sql = format!("SELECT * FROM {}", table);
        if !query.filters.is_empty() {
            let clauses = query
                .filters
                .iter()
                .map(|(column, _)| check_identifier(column).map(|_| format!("{} = ?", column)))
                .collect::<Result<Vec<_>, _>>()?;
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }
        if !query.order.is_empty() {
            let terms = query
                .order
                .iter()
                .map(|(column, ascending)| {
                    check_identifier(column)
                        .map(|_| format!("{} {}", column, if *ascending { "ASC" } else { "DESC" }))
                })
                .collect::<Result<Vec<_>, _>>()?;
            sql.push_str(" ORDER BY ");
            sql.push_str(&terms.join(", "));
        }
        if let Some(limit) = query.limit {
            sql.push_str(&format!(" LIMIT {}", limit));
        }

        tracing::debug!(table, sql = %sql, "find");

        let mut q = sqlx::query(&sql);
        for (_, value) in &query.filters {
            q = bind_value(q, value);
        }
        let rows = q.fetch_all(&self.pool).await?;

        rows.iter().map(row_to_json).collect()
    }

    async fn insert(&self, table: &str, mut record: Row) -> Result<Row, StoreError> {
        check_identifier(table)?;

        let id = match record.get("id").and_then(Value::as_str) {
            Some(id) => id.to_string(),
            None => {
                let id = uuid::Uuid::new_v4().to_string();
                record.insert("id".to_string(), json!(id));
                id
            }
        };

        let columns: Vec<&String> = record.keys().collect();
        for column in &columns {
            check_identifier(column)?;
        }
        let column_list = columns
            .iter()
            .map(|c| c.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        let placeholders = vec!["?"; columns.len()].join(", ");
        let sql = format!("INSERT INTO {} ({}) VALUES ({})", table, column_list, placeholders);

        let mut q = sqlx::query(&sql);
        for value in record.values() {
            q = bind_value(q, value);
        }
        q.execute(&self.pool).await?;

        let select = format!("SELECT * FROM {} WHERE id = ?", table);
        let row = sqlx::query(&select).bind(&id).fetch_one(&self.pool).await?;

        tracing::debug!(table, id = %id, "insert");
        row_to_json(&row)
    }

    async fn delete(&self, table: &str, id: &str) -> Result<(), StoreError> {
        check_identifier(table)?;

        let sql = format!("DELETE FROM {} WHERE id = ?", table);
        let result = sqlx::query(&sql).bind(id).execute(&self.pool).await?;

        tracing::debug!(table, id, rows = result.rows_affected(), "delete");
        Ok(())
    }
}

/// Table and column names are interpolated, so only `[a-z0-9_]` is accepted
fn check_identifier(name: &str) -> Result<(), StoreError> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');
    if valid {
        Ok(())
    } else {
        Err(StoreError::Rejected(format!("Invalid identifier: {:?}", name)))
    }
}

fn bind_value<'q>(query: SqliteQuery<'q>, value: &Value) -> SqliteQuery<'q> {
    match value {
        Value::Null => query.bind(Option::<String>::None),
        Value::Bool(b) => query.bind(*b),
        Value::Number(n) => match n.as_i64() {
            Some(i) => query.bind(i),
            None => query.bind(n.as_f64().unwrap_or_default()),
        },
        Value::String(s) => query.bind(s.clone()),
        other => query.bind(other.to_string()),
    }
}

fn row_to_json(row: &SqliteRow) -> Result<Row, StoreError> {
    let mut map = Row::new();
    for column in row.columns() {
        let index = column.ordinal();
        let (is_null, type_name) = {
            let raw = row.try_get_raw(index)?;
            (raw.is_null(), raw.type_info().name().to_string())
        };

        let value = if is_null {
            Value::Null
        } else {
            match type_name.as_str() {
                "INTEGER" => json!(row.try_get::<i64, _>(index)?),
                "REAL" => json!(row.try_get::<f64, _>(index)?),
                "BLOB" => Value::Null,
                _ => Value::String(row.try_get::<String, _>(index)?),
            }
        };
        map.insert(column.name().to_string(), value);
    }
    Ok(map)
}
