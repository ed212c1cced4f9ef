//! Database module
//!
//! SQLite layer behind the node and its stores:
//! - Versioned schema migrations
//! - Row models
//! - Repository for key-value rows and the node identity

pub mod models;
pub mod repository;
pub mod schema;

pub use models::*;
pub use repository::Repository;
pub use schema::{initialize_database, schema_version};

use crate::error::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);
const POOL_SIZE: u32 = 5;

/// Where a pool keeps its database
#[derive(Debug, Clone, Copy)]
pub enum DbLocation<'a> {
    File(&'a Path),
    Memory,
}

impl DbLocation<'_> {
    fn connect_options(&self) -> Result<SqliteConnectOptions> {
        let options = match self {
            DbLocation::File(path) => SqliteConnectOptions::new()
                .filename(path)
                .create_if_missing(true)
                .journal_mode(SqliteJournalMode::Wal),
            DbLocation::Memory => SqliteConnectOptions::from_str("sqlite::memory:")?,
        };
        Ok(options.busy_timeout(BUSY_TIMEOUT))
    }
}

/// Open the database file at `db_path`, migrate it and return the
/// application pool.
pub async fn create_pool(db_path: &Path) -> Result<SqlitePool> {
    tracing::info!("Opening database at {:?}", db_path);

    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let location = DbLocation::File(db_path);

    // Phase 1: migrate on a single connection, then close it
    let migration_pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(location.connect_options()?)
        .await?;
    let applied = initialize_database(&migration_pool).await?;
    migration_pool.close().await;

    // Phase 2: every pooled connection opens on the migrated schema
    let pool = SqlitePoolOptions::new()
        .max_connections(POOL_SIZE)
        .connect_with(location.connect_options()?)
        .await?;

    tracing::info!("Database ready ({} migration(s) applied)", applied);
    Ok(pool)
}

/// Create a migrated in-memory pool.
///
/// The database lives as long as its only connection, so that connection
/// never idles out or expires.
pub async fn create_memory_pool() -> Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None::<Duration>)
        .max_lifetime(None::<Duration>)
        .connect_with(DbLocation::Memory.connect_options()?)
        .await?;

    initialize_database(&pool).await?;
    Ok(pool)
}
