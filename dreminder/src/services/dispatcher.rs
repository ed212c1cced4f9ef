//! Notification dispatcher
//!
//! Drains the due-queue one entry per invocation. The reminder is looked up
//! again in the latest snapshot because it may have been deleted after it
//! was queued; such entries are dropped quietly.

use crate::config::NOTIFICATION_TITLE;
use crate::database::ReminderId;
use crate::error::Result;
use crate::services::notifier::Notifier;
use crate::services::permission::PermissionState;
use crate::services::reminders::Snapshot;
use std::collections::VecDeque;
use std::sync::Arc;

/// FIFO of reminder ids judged due
#[derive(Debug, Default, Clone)]
pub struct DueQueue {
    entries: VecDeque<ReminderId>,
}

impl DueQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, id: ReminderId) {
        self.entries.push_back(id);
    }

    pub fn pop(&mut self) -> Option<ReminderId> {
        self.entries.pop_front()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(String::as_str)
    }
}

impl Extend<ReminderId> for DueQueue {
    fn extend<I: IntoIterator<Item = ReminderId>>(&mut self, iter: I) {
        self.entries.extend(iter);
    }
}

/// Result of one dispatch invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The queue was empty
    Idle,
    Notified { id: ReminderId, message: String },
    /// Notifications are not permitted; the entry was drained
    Suppressed { id: ReminderId },
    /// The reminder was deleted or malformed
    Dropped { id: ReminderId },
    /// The notifier reported an error; the entry was drained
    Failed { id: ReminderId, reason: String },
}

impl DispatchOutcome {
    /// Whether the view has to be refreshed afterwards
    pub fn marks_stale(&self) -> bool {
        matches!(self, DispatchOutcome::Notified { .. })
    }
}

pub struct Dispatcher {
    notifier: Arc<dyn Notifier>,
}

impl Dispatcher {
    pub fn new(notifier: Arc<dyn Notifier>) -> Self {
        Self { notifier }
    }

    /// Pop the head of `queue` and notify for it.
    pub async fn dispatch_one(
        &self,
        queue: &mut DueQueue,
        snapshot: &Snapshot,
        permission: PermissionState,
    ) -> DispatchOutcome {
        let Some(id) = queue.pop() else {
            return DispatchOutcome::Idle;
        };

        // Deleted or rewritten since it was queued
        let Some(reminder) = snapshot.reminder(&id) else {
            tracing::info!("Reminder {} no longer exists, dropping notification", id);
            return DispatchOutcome::Dropped { id };
        };

        // Drained either way, nothing is kept for later
        if !permission.allows_notifications() {
            tracing::info!(
                "Notification for reminder {} suppressed (permission: {})",
                id,
                permission.permission
            );
            return DispatchOutcome::Suppressed { id };
        }

        match self.notifier.show(NOTIFICATION_TITLE, &reminder.message).await {
            Ok(()) => {
                tracing::info!("Notification sent for reminder {}", id);
                DispatchOutcome::Notified {
                    id,
                    message: reminder.message,
                }
            }
            Err(e) => {
                tracing::error!("Failed to send notification for reminder {}: {}", id, e);
                DispatchOutcome::Failed {
                    id,
                    reason: e.to_string(),
                }
            }
        }
    }

    /// Show a notification outside the queue
    pub async fn notify(&self, permission: PermissionState, body: &str) -> Result<bool> {
        if !permission.allows_notifications() {
            return Ok(false);
        }
        self.notifier.show(NOTIFICATION_TITLE, body).await?;
        Ok(true)
    }
}
