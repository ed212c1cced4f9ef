//! SQLite-backed key-value store
//!
//! Rows live in the node's database, namespaced by store name. Values are
//! stored as JSON text; a row that fails to parse is kept in the index as a
//! plain string so readers see it as malformed instead of losing it.

use super::{Entries, KeyValueStore, StoreAddress};
use crate::database::Repository;
use crate::error::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Key-value store persisted in SQLite
pub struct SqliteKvStore {
    name: String,
    repo: Repository,
    address: StoreAddress,
    index: RwLock<Entries>,
}

impl SqliteKvStore {
    pub fn new(repo: Repository, name: impl Into<String>, address: StoreAddress) -> Self {
        Self {
            name: name.into(),
            repo,
            address,
            index: RwLock::new(Entries::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    // Index writes are single map operations, so a poisoned lock still
    // guards a consistent map.
    fn read_index(&self) -> RwLockReadGuard<'_, Entries> {
        self.index.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_index(&self) -> RwLockWriteGuard<'_, Entries> {
        self.index.write().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl KeyValueStore for SqliteKvStore {
    async fn load(&self) -> Result<()> {
        let rows = self.repo.list_entries(&self.name).await?;
        let mut entries = Entries::new();

        for row in rows {
            let value = match serde_json::from_str::<Value>(&row.value) {
                Ok(value) => value,
                Err(e) => {
                    tracing::warn!("Entry {} in {} is not valid JSON: {}", row.key, self.name, e);
                    Value::String(row.value)
                }
            };
            entries.insert(row.key, value);
        }

        tracing::info!("Loaded {} entries from store {}", entries.len(), self.name);
        *self.write_index() = entries;
        Ok(())
    }

    fn all(&self) -> Entries {
        self.read_index().clone()
    }

    fn get(&self, key: &str) -> Option<Value> {
        self.read_index().get(key).cloned()
    }

    async fn put(&self, key: &str, value: Value) -> Result<()> {
        let text = serde_json::to_string(&value)?;
        self.repo.upsert_entry(&self.name, key, &text).await?;
        self.write_index().insert(key.to_string(), value);
        Ok(())
    }

    async fn del(&self, key: &str) -> Result<()> {
        if !self.repo.delete_entry(&self.name, key).await? {
            tracing::debug!("Delete of missing key {} in {}", key, self.name);
        }
        self.write_index().remove(key);
        Ok(())
    }

    fn address(&self) -> &StoreAddress {
        &self.address
    }
}
