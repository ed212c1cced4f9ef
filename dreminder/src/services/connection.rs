//! Connection provider
//!
//! Brings up the node and the reminder store in the background and
//! publishes the outcome. Initialization runs once; a failure is final for
//! the lifetime of the process.

use crate::config::STORE_NAME;
use crate::error::Result;
use crate::node::Node;
use crate::storage::KeyValueStore;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;

/// Ready node and store handles
#[derive(Clone)]
pub struct Connection {
    pub node: Node,
    pub store: Arc<dyn KeyValueStore>,
}

impl Connection {
    /// Open the node in `data_dir` and its reminder store
    pub async fn establish(data_dir: PathBuf) -> Result<Self> {
        let node = Node::create(&data_dir).await?;
        let store = Arc::new(node.kvstore(STORE_NAME));
        tracing::info!("Store opened at {}", store.address());

        Ok(Self { node, store })
    }
}

#[derive(Clone)]
pub enum ConnectionState {
    Connecting,
    Ready(Connection),
    Failed(String),
}

impl ConnectionState {
    pub fn connection(&self) -> Option<&Connection> {
        match self {
            ConnectionState::Ready(connection) => Some(connection),
            _ => None,
        }
    }
}

/// Owner of the background initialization
pub struct ConnectionProvider {
    state_tx: Arc<watch::Sender<ConnectionState>>,
}

impl ConnectionProvider {
    /// Connect to the node rooted at `data_dir`
    pub fn connect(data_dir: PathBuf) -> Self {
        Self::spawn(Connection::establish(data_dir))
    }

    /// Run `init` in the background and publish its result
    pub fn spawn<F>(init: F) -> Self
    where
        F: Future<Output = Result<Connection>> + Send + 'static,
    {
        let (state_tx, _) = watch::channel(ConnectionState::Connecting);
        let state_tx = Arc::new(state_tx);
        let publisher = Arc::clone(&state_tx);

        tokio::spawn(async move {
            let state = match init.await {
                Ok(connection) => {
                    tracing::info!("Connection ready: node {}", connection.node.id());
                    ConnectionState::Ready(connection)
                }
                Err(e) => {
                    tracing::error!("Connection failed: {}", e);
                    ConnectionState::Failed(e.to_string())
                }
            };
            publisher.send_replace(state);
        });

        Self { state_tx }
    }

    /// A provider that is already connected
    pub fn ready(connection: Connection) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Ready(connection));
        Self {
            state_tx: Arc::new(state_tx),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }

    pub fn state(&self) -> ConnectionState {
        self.state_tx.borrow().clone()
    }

    /// Wait until initialization has finished. `None` if it failed.
    pub async fn wait(&self) -> Option<Connection> {
        let mut rx = self.subscribe();
        let state = rx
            .wait_for(|state| !matches!(state, ConnectionState::Connecting))
            .await
            .ok()?;
        state.connection().cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_connect_publishes_ready() {
        let temp_dir = TempDir::new().unwrap();
        let provider = ConnectionProvider::connect(temp_dir.path().to_path_buf());

        let connection = provider.wait().await.unwrap();
        assert_eq!(connection.store.address().path, STORE_NAME);
        assert!(matches!(provider.state(), ConnectionState::Ready(_)));
    }

    #[tokio::test]
    async fn test_failure_is_final() {
        let provider = ConnectionProvider::spawn(async {
            Err(AppError::Connection("no route".to_string()))
        });

        assert!(provider.wait().await.is_none());
        match provider.state() {
            ConnectionState::Failed(reason) => assert!(reason.contains("no route")),
            _ => panic!("expected failed state"),
        }
    }

    #[tokio::test]
    async fn test_subscriber_sees_transition() {
        let temp_dir = TempDir::new().unwrap();
        let provider = ConnectionProvider::connect(temp_dir.path().to_path_buf());
        let mut rx = provider.subscribe();

        let state = rx
            .wait_for(|s| !matches!(s, ConnectionState::Connecting))
            .await
            .unwrap()
            .clone();
        assert!(state.connection().is_some());
    }
}
