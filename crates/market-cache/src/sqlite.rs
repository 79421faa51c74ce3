use async_trait::async_trait;
use chrono::{DateTime, Utc};
use market_core::MarketError;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;

use crate::record::{Collection, Record, RecordFilter, RecordStore};

#[derive(Debug, sqlx::FromRow)]
struct RecordRow {
    key: String,
    payload: String,
    sort_key: i64,
    written_at: String,
}

impl RecordRow {
    fn into_record(self, collection: Collection) -> Result<Record, MarketError> {
        let written_at = DateTime::parse_from_rfc3339(&self.written_at)
            .map_err(|e| MarketError::Storage(format!("bad timestamp on {}/{}: {}", collection, self.key, e)))?
            .with_timezone(&Utc);
        Ok(Record {
            collection,
            key: self.key,
            payload: self.payload,
            sort_key: self.sort_key,
            written_at,
        })
    }
}

fn storage(err: sqlx::Error) -> MarketError {
    MarketError::Storage(err.to_string())
}

/// SQLite-backed record store.
#[derive(Clone)]
pub struct SqliteRecordStore {
    pool: SqlitePool,
}

impl SqliteRecordStore {
    pub async fn connect(database_url: &str) -> Result<Self, MarketError> {
        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(storage)?
            .create_if_missing(true);

        // Every connection to an in-memory database is a separate database.
        let max_connections = if database_url.contains(":memory:") { 1 } else { 5 };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .map_err(storage)?;

        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    async fn init_schema(&self) -> Result<(), MarketError> {
        let schema = include_str!("../schema.sql");
        for statement in schema.split(';') {
            let stmt = statement.trim();
            if !stmt.is_empty() {
                sqlx::query(stmt).execute(&self.pool).await.map_err(storage)?;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl RecordStore for SqliteRecordStore {
    async fn insert(&self, record: Record) -> Result<(), MarketError> {
        sqlx::query(
            "INSERT INTO records (collection, key, payload, sort_key, written_at)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT(collection, key) DO UPDATE SET
                payload = excluded.payload,
                sort_key = excluded.sort_key,
                written_at = excluded.written_at",
        )
        .bind(record.collection.as_str())
        .bind(&record.key)
        .bind(&record.payload)
        .bind(record.sort_key)
        .bind(record.written_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(storage)?;
        Ok(())
    }

    async fn get(&self, collection: Collection, key: &str) -> Result<Option<Record>, MarketError> {
        let row: Option<RecordRow> = sqlx::query_as(
            "SELECT key, payload, sort_key, written_at FROM records WHERE collection = ? AND key = ?",
        )
        .bind(collection.as_str())
        .bind(key)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage)?;

        row.map(|r| r.into_record(collection)).transpose()
    }

    async fn scan(&self, collection: Collection, filter: RecordFilter<'_>) -> Result<Vec<Record>, MarketError> {
        let rows: Vec<RecordRow> = sqlx::query_as(
            "SELECT key, payload, sort_key, written_at FROM records
             WHERE collection = ? ORDER BY sort_key ASC, key ASC",
        )
        .bind(collection.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(storage)?;

        let mut matched = Vec::with_capacity(rows.len());
        for row in rows {
            let record = row.into_record(collection)?;
            if filter(&record) {
                matched.push(record);
            }
        }
        Ok(matched)
    }

    async fn delete(&self, collection: Collection, key: &str) -> Result<bool, MarketError> {
        let result = sqlx::query("DELETE FROM records WHERE collection = ? AND key = ?")
            .bind(collection.as_str())
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(storage)?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_all(&self, collection: Collection) -> Result<u64, MarketError> {
        let result = sqlx::query("DELETE FROM records WHERE collection = ?")
            .bind(collection.as_str())
            .execute(&self.pool)
            .await
            .map_err(storage)?;
        Ok(result.rows_affected())
    }
}
