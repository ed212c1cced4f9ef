//! Schema migrations
//!
//! Each migration runs in its own transaction and is recorded in the
//! `migrations` table together with its name.

use crate::error::Result;
use chrono::Utc;
use sqlx::sqlite::SqlitePool;

struct Migration {
    version: i64,
    name: &'static str,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    name: "initial schema",
    sql: include_str!("migrations/001_initial_schema.sql"),
}];

/// Bring the schema up to date. Returns how many migrations were applied.
pub async fn initialize_database(pool: &SqlitePool) -> Result<usize> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS migrations (
            version INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            applied_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    let current = schema_version(pool).await?;
    tracing::debug!("Schema version {}", current);

    let pending: Vec<&Migration> = MIGRATIONS.iter().filter(|m| m.version > current).collect();
    for migration in &pending {
        apply(pool, migration).await?;
    }

    Ok(pending.len())
}

/// Highest applied migration, 0 for a fresh database
pub async fn schema_version(pool: &SqlitePool) -> Result<i64> {
    let version = sqlx::query_scalar::<_, i64>("SELECT COALESCE(MAX(version), 0) FROM migrations")
        .fetch_one(pool)
        .await?;
    Ok(version)
}

async fn apply(pool: &SqlitePool, migration: &Migration) -> Result<()> {
    tracing::info!("Applying migration {} ({})", migration.version, migration.name);

    let mut tx = pool.begin().await?;
    sqlx::Executor::execute(&mut *tx, sqlx::raw_sql(migration.sql)).await?;
    sqlx::query("INSERT INTO migrations (version, name, applied_at) VALUES (?, ?, ?)")
        .bind(migration.version)
        .bind(migration.name)
        .bind(Utc::now().timestamp_millis())
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn empty_pool() -> SqlitePool {
        SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_initialize_database() {
        let pool = empty_pool().await;

        assert_eq!(initialize_database(&pool).await.unwrap(), MIGRATIONS.len());
        assert_eq!(schema_version(&pool).await.unwrap(), 1);

        let tables: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name IN ('kv_entries', 'node_identity')",
        )
        .fetch_one(&pool)
        .await
        .unwrap();
        assert_eq!(tables, 2);

        let name: String = sqlx::query_scalar("SELECT name FROM migrations WHERE version = 1")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(name, "initial schema");
    }

    #[tokio::test]
    async fn test_initialize_database_is_idempotent() {
        let pool = empty_pool().await;

        initialize_database(&pool).await.unwrap();
        assert_eq!(initialize_database(&pool).await.unwrap(), 0);
        assert_eq!(schema_version(&pool).await.unwrap(), 1);
    }
}
