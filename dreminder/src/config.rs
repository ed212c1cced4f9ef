//! Application configuration constants
//!
//! Central location for timing constants, storage names and the
//! validation boundaries applied to persisted settings.

use std::time::Duration;

// ===== Scheduling =====

/// Interval between two due-check ticks
pub const TICK_INTERVAL: Duration = Duration::from_secs(1);

/// Default distance between a reminder's creation and its due time (3 minutes)
pub const DEFAULT_REMINDER_OFFSET_SECS: u64 = 180;

/// Minimum reminder offset in seconds.
/// A zero offset would make a reminder due before the next tick can see it.
pub const MIN_REMINDER_OFFSET_SECS: u64 = 1;

/// Maximum reminder offset in seconds (7 days)
pub const MAX_REMINDER_OFFSET_SECS: u64 = 7 * 24 * 60 * 60;

// ===== Storage =====

/// Directory name under the platform data directory
pub const DATA_DIR_NAME: &str = "dreminder";

/// SQLite database file inside the data directory
pub const DATABASE_FILE: &str = "dreminder.db";

/// Settings file inside the data directory
pub const SETTINGS_FILE: &str = "settings.json";

/// Name of the key-value store holding reminders
pub const STORE_NAME: &str = "reminders";

// ===== Notifications =====

/// Title used for every reminder notification
pub const NOTIFICATION_TITLE: &str = "dReminder";

/// Body of the manually triggered test notification
pub const TEST_NOTIFICATION_BODY: &str = "This is a test notification";

// ===== Logging =====

/// Filter used when RUST_LOG is not set
pub const DEFAULT_LOG_FILTER: &str = "dreminder=info,warn";

/// Filter used with --verbose
pub const VERBOSE_LOG_FILTER: &str = "dreminder=debug,info";
