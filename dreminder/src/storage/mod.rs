//! Storage module
//!
//! Key-value stores holding opaque JSON values.
//!
//! A store is opened by a node, `load`ed once, and then serves `all`/`get`
//! synchronously from an in-memory index that `put`/`del` keep current.

pub mod kv_store;
pub mod memory;

pub use kv_store::SqliteKvStore;
pub use memory::MemoryKvStore;

use crate::error::Result;
use async_trait::async_trait;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;

/// Full contents of a store, ordered by key
pub type Entries = BTreeMap<String, Value>;

/// Key-value store contract consumed by the reminder adapter
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Load persisted contents into the index
    async fn load(&self) -> Result<()>;

    /// Snapshot of every entry
    fn all(&self) -> Entries;

    fn get(&self, key: &str) -> Option<Value>;

    async fn put(&self, key: &str, value: Value) -> Result<()>;

    async fn del(&self, key: &str) -> Result<()>;

    fn address(&self) -> &StoreAddress;
}

/// Displayable address of a store: `<root>/<path>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreAddress {
    pub root: String,
    pub path: String,
}

impl StoreAddress {
    /// Derive the address of store `name` owned by node `owner`.
    ///
    /// The root is the hex SHA-256 of `"<owner>/<name>"`, so it is stable for
    /// a given node and store name.
    pub fn derive(owner: &str, name: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(owner.as_bytes());
        hasher.update(b"/");
        hasher.update(name.as_bytes());

        Self {
            root: format!("{:x}", hasher.finalize()),
            path: name.to_string(),
        }
    }
}

impl fmt::Display for StoreAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.root, self.path)
    }
}
