//! Reminders service
//!
//! Translates user actions into store calls and store contents into
//! versioned snapshots. Every mutation is followed by a full refresh; there
//! are no optimistic local updates.

use crate::clock::Clock;
use crate::database::{Reminder, ReminderEntry, ReminderId};
use crate::error::{AppError, Result};
use crate::storage::{Entries, KeyValueStore, StoreAddress};
use std::sync::Arc;
use tokio::sync::{watch, OnceCell};
use uuid::Uuid;

/// Immutable point-in-time copy of the store
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    /// Increases by one on every refresh
    pub version: u64,
    pub entries: Arc<Entries>,
}

impl Snapshot {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    /// The reminder stored under `id`, if present and well-formed
    pub fn reminder(&self, id: &str) -> Option<Reminder> {
        self.entries.get(id).and_then(Reminder::from_value)
    }

    /// Every entry in key order; malformed values yield `None`
    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<Reminder>)> + '_ {
        self.entries
            .iter()
            .map(|(id, value)| (id.as_str(), Reminder::from_value(value)))
    }
}

/// Reminder store adapter
#[derive(Clone)]
pub struct RemindersService {
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    offset_ms: i64,
    loaded: Arc<OnceCell<()>>,
    snapshot_tx: Arc<watch::Sender<Snapshot>>,
}

impl RemindersService {
    pub fn new(store: Arc<dyn KeyValueStore>, clock: Arc<dyn Clock>, offset_ms: i64) -> Self {
        let (snapshot_tx, _) = watch::channel(Snapshot::default());
        Self {
            store,
            clock,
            offset_ms,
            loaded: Arc::new(OnceCell::new()),
            snapshot_tx: Arc::new(snapshot_tx),
        }
    }

    pub fn address(&self) -> &StoreAddress {
        self.store.address()
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded.initialized()
    }

    /// Load the store once, then refresh. Later calls only refresh.
    pub async fn load(&self) -> Result<()> {
        self.loaded
            .get_or_try_init(|| async {
                tracing::info!("Loading reminder store {}", self.store.address());
                self.store.load().await
            })
            .await?;

        self.refresh().await;
        Ok(())
    }

    /// Re-read the whole store into a new snapshot version
    pub async fn refresh(&self) -> Snapshot {
        let entries = Arc::new(self.store.all());

        self.snapshot_tx.send_modify(|snapshot| {
            *snapshot = Snapshot {
                version: snapshot.version + 1,
                entries,
            };
        });

        let snapshot = self.snapshot();
        tracing::trace!("Snapshot v{} with {} entries", snapshot.version, snapshot.len());
        snapshot
    }

    /// Latest completed snapshot
    pub fn snapshot(&self) -> Snapshot {
        self.snapshot_tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.snapshot_tx.subscribe()
    }

    /// Create a reminder due `offset` from now.
    ///
    /// Empty or whitespace-only messages are ignored and return `None`
    /// without touching the store.
    pub async fn create(&self, message: &str) -> Result<Option<ReminderEntry>> {
        let message = message.trim();
        if message.is_empty() {
            tracing::debug!("Ignoring empty reminder");
            return Ok(None);
        }
        self.ensure_loaded()?;

        let id: ReminderId = Uuid::new_v4().to_string();
        let reminder = Reminder::new(message, self.clock.now_millis(), self.offset_ms);

        tracing::info!("Creating reminder {} due at {}", id, reminder.datetime);
        self.store.put(&id, reminder.to_value()).await?;
        self.refresh().await;

        Ok(Some(ReminderEntry { id, reminder }))
    }

    pub async fn delete(&self, id: &str) -> Result<()> {
        self.ensure_loaded()?;

        tracing::info!("Deleting reminder {}", id);
        self.store.del(id).await?;
        self.refresh().await;
        Ok(())
    }

    fn ensure_loaded(&self) -> Result<()> {
        if self.is_loaded() {
            Ok(())
        } else {
            Err(AppError::Store("Reminder store is not loaded".to_string()))
        }
    }
}
