//! Services module
//!
//! Business logic services that coordinate between the app loop, the
//! reminder store and the notifier.

pub mod connection;
pub mod dispatcher;
pub mod notifier;
pub mod permission;
pub mod reminders;
pub mod scheduler;
pub mod settings;

pub use connection::{Connection, ConnectionProvider, ConnectionState};
pub use dispatcher::{DispatchOutcome, Dispatcher, DueQueue};
pub use notifier::{LogNotifier, MemoryNotifier, Notifier, NotifierKind, TerminalNotifier};
pub use permission::{Permission, PermissionState};
pub use reminders::{RemindersService, Snapshot};
pub use scheduler::{DueCheck, DueCheckMode, Ticker};
pub use settings::{AppSettings, SettingsService};
