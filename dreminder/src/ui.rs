//! Terminal presentation
//!
//! Pure formatting of the clock, status and reminder list, plus the
//! [`Screen`] they are written to.

use crate::database::Reminder;
use crate::error::Result;
use crate::services::connection::ConnectionState;
use crate::services::permission::PermissionState;
use crate::services::reminders::Snapshot;
use chrono::{DateTime, TimeZone};
use crossterm::style::Stylize;
use crossterm::terminal::SetTitle;
use crossterm::QueueableCommand;
use std::fmt;
use std::io::{IsTerminal, Write};

/// Formatted clock parts, all zero-padded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClockView {
    pub time: String,
    pub date: String,
    pub weekday: String,
}

impl fmt::Display for ClockView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}  {}  {}", self.time, self.date, self.weekday)
    }
}

pub fn format_clock<Tz: TimeZone>(now: &DateTime<Tz>) -> ClockView
where
    Tz::Offset: fmt::Display,
{
    ClockView {
        time: now.format("%H:%M:%S").to_string(),
        date: now.format("%Y/%m/%d").to_string(),
        weekday: now.format("%a").to_string(),
    }
}

/// Due time of a reminder in the given timezone
pub fn format_due<Tz: TimeZone>(reminder: &Reminder, tz: &Tz) -> String
where
    Tz::Offset: fmt::Display,
{
    reminder
        .due_in(tz)
        .map(|due| due.format("%Y/%m/%d %H:%M:%S").to_string())
        .unwrap_or_else(|| "invalid time".to_string())
}

/// Strike-through styling for overdue reminders
pub fn strike(text: &str) -> String {
    text.crossed_out().to_string()
}

pub fn render_status(connection: &ConnectionState, permission: &PermissionState) -> String {
    let (node, store, address) = match connection {
        ConnectionState::Connecting => (
            "Node not connected".to_string(),
            "Store not instantiated".to_string(),
            String::new(),
        ),
        ConnectionState::Failed(reason) => (
            format!("Node not connected ({})", reason),
            "Store not instantiated".to_string(),
            String::new(),
        ),
        ConnectionState::Ready(connection) => {
            let address = connection.store.address();
            (
                "Node connected".to_string(),
                format!("Store instantiated: {}", connection.node.id()),
                format!("{} / {}", address.root, address.path),
            )
        }
    };

    let notifications = if permission.supported {
        format!("Notifications: {}", permission.permission)
    } else {
        "Notifications: unsupported".to_string()
    };

    format!(
        "dReminder\n{}\n{}\nDatastore: {}\n{}",
        node, store, address, notifications
    )
}

pub fn render_list<Tz: TimeZone>(snapshot: &Snapshot, now: &DateTime<Tz>) -> String
where
    Tz::Offset: fmt::Display,
{
    let now_ms = now.timestamp_millis();
    let tz = now.timezone();
    let mut out = format!("Reminders ({})", snapshot.len());

    if snapshot.is_empty() {
        out.push_str("\n  (no reminders)");
        return out;
    }

    for (id, reminder) in snapshot.iter() {
        let line = match reminder {
            Some(reminder) => {
                let line = format!(
                    "{}  {}  {}",
                    id,
                    format_due(&reminder, &tz),
                    reminder.message
                );
                if reminder.is_overdue(now_ms) {
                    strike(&line)
                } else {
                    line
                }
            }
            None => format!("{}  <malformed entry>", id),
        };
        out.push_str("\n  ");
        out.push_str(&line);
    }

    out
}

/// Output sink for rendered views
pub struct Screen {
    out: Box<dyn Write + Send>,
    terminal: bool,
}

impl Screen {
    pub fn stdout() -> Self {
        Self {
            terminal: std::io::stdout().is_terminal(),
            out: Box::new(std::io::stdout()),
        }
    }

    pub fn new(out: Box<dyn Write + Send>) -> Self {
        Self {
            out,
            terminal: false,
        }
    }

    pub fn print(&mut self, text: &str) -> Result<()> {
        writeln!(self.out, "{}", text)?;
        self.out.flush()?;
        Ok(())
    }

    /// Show the clock in the terminal title. No-op when not a terminal.
    pub fn set_title(&mut self, clock: &ClockView) -> Result<()> {
        if self.terminal {
            self.out.queue(SetTitle(format!("dReminder {}", clock)))?;
            self.out.flush()?;
        }
        Ok(())
    }
}
