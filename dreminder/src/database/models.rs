//! Database models
//!
//! Rust structs for rows and for the JSON values kept in the reminder store.

use chrono::{DateTime, TimeZone};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;

/// Opaque reminder identifier (random UUID)
pub type ReminderId = String;

/// One row of a key-value store. `value` is JSON text.
#[derive(Debug, Clone, FromRow)]
pub struct KvEntry {
    pub key: String,
    pub value: String,
}

/// A reminder as stored under its id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reminder {
    pub message: String,
    /// Due instant in milliseconds since the Unix epoch. Set once at creation.
    pub datetime: i64,
}

impl Reminder {
    pub fn new(message: impl Into<String>, created_at_ms: i64, offset_ms: i64) -> Self {
        Self {
            message: message.into(),
            datetime: created_at_ms.saturating_add(offset_ms),
        }
    }

    /// Interpret a stored value, or `None` when it does not have the
    /// `{message, datetime}` shape.
    pub fn from_value(value: &Value) -> Option<Self> {
        serde_json::from_value(value.clone()).ok()
    }

    pub fn to_value(&self) -> Value {
        serde_json::json!({
            "message": self.message,
            "datetime": self.datetime,
        })
    }

    /// The due instant in the given timezone
    pub fn due_in<Tz: TimeZone>(&self, tz: &Tz) -> Option<DateTime<Tz>> {
        tz.timestamp_millis_opt(self.datetime).single()
    }

    pub fn is_overdue(&self, now_ms: i64) -> bool {
        self.datetime < now_ms
    }
}

/// A reminder together with its id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReminderEntry {
    pub id: ReminderId,
    pub reminder: Reminder,
}
