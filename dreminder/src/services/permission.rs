//! Notification permission
//!
//! The permission is requested once at startup. A failing request counts as
//! a denial; it never stops the application.

use crate::services::notifier::Notifier;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Permission {
    Granted,
    Denied,
    /// Not decided yet
    #[default]
    Default,
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Permission::Granted => "granted",
            Permission::Denied => "denied",
            Permission::Default => "default",
        };
        f.write_str(s)
    }
}

impl FromStr for Permission {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "granted" => Ok(Permission::Granted),
            "denied" => Ok(Permission::Denied),
            "default" => Ok(Permission::Default),
            other => Err(format!(
                "Invalid permission '{}'. Use 'granted', 'denied' or 'default'",
                other
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PermissionState {
    pub permission: Permission,
    pub supported: bool,
}

impl Default for PermissionState {
    fn default() -> Self {
        Self {
            permission: Permission::Default,
            supported: true,
        }
    }
}

impl PermissionState {
    pub fn allows_notifications(&self) -> bool {
        self.supported && self.permission == Permission::Granted
    }
}

/// Ask the notifier for permission
pub async fn request_permission(notifier: &dyn Notifier) -> PermissionState {
    if !notifier.is_supported() {
        tracing::info!("This terminal does NOT support notifications.");
        return PermissionState {
            permission: Permission::Default,
            supported: false,
        };
    }

    let permission = match notifier.request_permission().await {
        Ok(permission) => permission,
        Err(e) => {
            tracing::warn!("Notification permission request failed: {}", e);
            Permission::Denied
        }
    };

    tracing::info!("Notification permission: {}", permission);
    PermissionState {
        permission,
        supported: true,
    }
}
