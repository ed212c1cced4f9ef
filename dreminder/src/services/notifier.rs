//! Notification backends
//!
//! A notifier answers permission requests and displays a title/body pair.

use crate::error::{AppError, Result};
use crate::services::permission::Permission;
use async_trait::async_trait;
use crossterm::style::Stylize;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

#[async_trait]
pub trait Notifier: Send + Sync {
    /// Whether this backend can display notifications at all
    fn is_supported(&self) -> bool;

    async fn request_permission(&self) -> Result<Permission>;

    async fn show(&self, title: &str, body: &str) -> Result<()>;
}

/// Which notifier the binary builds
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotifierKind {
    /// Bold-titled line on stdout
    #[default]
    Terminal,
    /// Log line only
    Log,
}

impl NotifierKind {
    /// `answer` is what a permission request resolves to
    pub fn build(self, answer: Permission) -> Arc<dyn Notifier> {
        match self {
            NotifierKind::Terminal => Arc::new(TerminalNotifier::new(answer)),
            NotifierKind::Log => Arc::new(LogNotifier::new(answer)),
        }
    }
}

impl FromStr for NotifierKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "terminal" => Ok(NotifierKind::Terminal),
            "log" => Ok(NotifierKind::Log),
            other => Err(format!(
                "Invalid notifier '{}'. Use 'terminal' or 'log'",
                other
            )),
        }
    }
}

/// Prints the notification with a bold title
pub struct TerminalNotifier {
    answer: Permission,
}

impl TerminalNotifier {
    pub fn new(answer: Permission) -> Self {
        Self { answer }
    }
}

#[async_trait]
impl Notifier for TerminalNotifier {
    fn is_supported(&self) -> bool {
        true
    }

    async fn request_permission(&self) -> Result<Permission> {
        Ok(self.answer)
    }

    async fn show(&self, title: &str, body: &str) -> Result<()> {
        let mut out = std::io::stdout().lock();
        writeln!(out, "{} {}", format!("[{}]", title).bold(), body)
            .and_then(|()| out.flush())
            .map_err(|e| AppError::Notification(format!("Failed to write notification: {}", e)))
    }
}

/// Writes notifications to the log only
pub struct LogNotifier {
    answer: Permission,
}

impl LogNotifier {
    pub fn new(answer: Permission) -> Self {
        Self { answer }
    }
}

#[async_trait]
impl Notifier for LogNotifier {
    fn is_supported(&self) -> bool {
        true
    }

    async fn request_permission(&self) -> Result<Permission> {
        Ok(self.answer)
    }

    async fn show(&self, title: &str, body: &str) -> Result<()> {
        tracing::info!("Notification: {} - {}", title, body);
        Ok(())
    }
}

/// Records notifications in memory
pub struct MemoryNotifier {
    answer: Option<Permission>,
    supported: bool,
    shown: Mutex<Vec<(String, String)>>,
}

impl MemoryNotifier {
    pub fn new(answer: Permission) -> Self {
        Self {
            answer: Some(answer),
            supported: true,
            shown: Mutex::new(Vec::new()),
        }
    }

    /// A notifier whose permission request fails
    pub fn failing() -> Self {
        Self {
            answer: None,
            ..Self::new(Permission::Default)
        }
    }

    pub fn unsupported() -> Self {
        Self {
            supported: false,
            ..Self::new(Permission::Default)
        }
    }

    /// Every (title, body) shown so far
    pub fn shown(&self) -> Vec<(String, String)> {
        self.shown.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait]
impl Notifier for MemoryNotifier {
    fn is_supported(&self) -> bool {
        self.supported
    }

    async fn request_permission(&self) -> Result<Permission> {
        self.answer
            .ok_or_else(|| AppError::Notification("Permission request rejected".to_string()))
    }

    async fn show(&self, title: &str, body: &str) -> Result<()> {
        self.shown
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((title.to_string(), body.to_string()));
        Ok(())
    }
}
