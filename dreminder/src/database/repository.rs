//! Repository layer for database operations
//!
//! Key-value rows are namespaced by store name so one database can back
//! several stores of the same node.

use super::models::KvEntry;
use crate::error::Result;
use chrono::Utc;
use sqlx::SqlitePool;

/// Repository for database operations
#[derive(Clone)]
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// List every entry of a store
    pub async fn list_entries(&self, store: &str) -> Result<Vec<KvEntry>> {
        let entries = sqlx::query_as::<_, KvEntry>(
            r#"
            SELECT key, value FROM kv_entries
            WHERE store = ?
            ORDER BY key
            "#,
        )
        .bind(store)
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }

    /// Insert or replace an entry
    pub async fn upsert_entry(&self, store: &str, key: &str, value: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO kv_entries (store, key, value, updated_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(store, key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(store)
        .bind(key)
        .bind(value)
        .bind(Utc::now().timestamp_millis())
        .execute(&self.pool)
        .await?;

        tracing::debug!("Stored entry {} in {}", key, store);
        Ok(())
    }

    /// Delete an entry, returning whether a row was removed
    pub async fn delete_entry(&self, store: &str, key: &str) -> Result<bool> {
        let rows = sqlx::query("DELETE FROM kv_entries WHERE store = ? AND key = ?")
            .bind(store)
            .bind(key)
            .execute(&self.pool)
            .await?
            .rows_affected();

        tracing::debug!("Deleted entry {} from {} ({} rows)", key, store, rows);
        Ok(rows > 0)
    }

    /// Get the persisted node identity, if any
    pub async fn get_node_id(&self) -> Result<Option<String>> {
        let id = sqlx::query_scalar::<_, String>(
            "SELECT id FROM node_identity ORDER BY created_at LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await?;

        Ok(id)
    }

    /// Persist the node identity
    pub async fn insert_node_id(&self, id: &str) -> Result<()> {
        sqlx::query("INSERT INTO node_identity (id, created_at) VALUES (?, ?)")
            .bind(id)
            .bind(Utc::now().timestamp_millis())
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Close the underlying pool
    pub async fn close(&self) {
        self.pool.close().await;
    }
}
