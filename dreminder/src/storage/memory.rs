//! In-memory key-value store
//!
//! Nothing is persisted; `load` only marks the store as loaded.

use super::{Entries, KeyValueStore, StoreAddress};
use crate::error::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

pub struct MemoryKvStore {
    address: StoreAddress,
    entries: Mutex<Entries>,
    loads: AtomicUsize,
}

impl MemoryKvStore {
    pub fn new(name: &str) -> Self {
        Self {
            address: StoreAddress::derive("memory", name),
            entries: Mutex::new(Entries::new()),
            loads: AtomicUsize::new(0),
        }
    }

    /// Number of times `load` ran
    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    fn entries(&self) -> MutexGuard<'_, Entries> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl KeyValueStore for MemoryKvStore {
    async fn load(&self) -> Result<()> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn all(&self) -> Entries {
        self.entries().clone()
    }

    fn get(&self, key: &str) -> Option<Value> {
        self.entries().get(key).cloned()
    }

    async fn put(&self, key: &str, value: Value) -> Result<()> {
        self.entries().insert(key.to_string(), value);
        Ok(())
    }

    async fn del(&self, key: &str) -> Result<()> {
        self.entries().remove(key);
        Ok(())
    }

    fn address(&self) -> &StoreAddress {
        &self.address
    }
}
