//! Local node
//!
//! A node owns the database of one data directory and a stable identity.
//! Stores are opened through the node, which determines their address.

use crate::config::DATABASE_FILE;
use crate::database::{create_pool, Repository};
use crate::error::Result;
use crate::storage::{SqliteKvStore, StoreAddress};
use std::path::Path;
use uuid::Uuid;

#[derive(Clone)]
pub struct Node {
    id: String,
    repo: Repository,
}

impl Node {
    /// Open (or create) the node rooted at `data_dir`
    pub async fn create(data_dir: &Path) -> Result<Self> {
        let pool = create_pool(&data_dir.join(DATABASE_FILE)).await?;
        Self::from_repository(Repository::new(pool)).await
    }

    /// Build a node on an already initialized repository, generating an
    /// identity on first use.
    pub async fn from_repository(repo: Repository) -> Result<Self> {
        let id = match repo.get_node_id().await? {
            Some(id) => id,
            None => {
                let id = Uuid::new_v4().simple().to_string();
                repo.insert_node_id(&id).await?;
                tracing::info!("Generated node identity {}", id);
                id
            }
        };

        tracing::info!("Node ready: {}", id);
        Ok(Self { id, repo })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Open the key-value store `name`. The store still needs `load`.
    pub fn kvstore(&self, name: &str) -> SqliteKvStore {
        SqliteKvStore::new(self.repo.clone(), name, StoreAddress::derive(&self.id, name))
    }

    pub async fn close(&self) {
        self.repo.close().await;
        tracing::info!("Node {} closed", self.id);
    }
}
