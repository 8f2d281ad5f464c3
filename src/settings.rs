//! Application settings.
//!
//! A single settings document is read at startup and handed explicitly to every
//! component that needs it; nothing looks settings up ambiently.

use crate::error::StoreError;
use crate::session::Storage;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const SETTINGS_NAMESPACE: &str = "store";
pub const SETTINGS_KEY: &str = "settings";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CloseBehavior {
    #[default]
    Quit,
    Tray,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemSettings {
    /// Whether tool state is persisted across restarts.
    pub cachable: bool,
    #[serde(rename = "closeBehavior")]
    pub close_behavior: CloseBehavior,
}

impl Default for SystemSettings {
    fn default() -> Self {
        Self {
            cachable: true,
            close_behavior: CloseBehavior::Quit,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommonSettings {
    pub theme: String,
}

impl Default for CommonSettings {
    fn default() -> Self {
        Self {
            theme: "dark".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DebugSettings {
    /// Log level used when `RUST_LOG` is unset.
    pub level: String,
}

impl Default for DebugSettings {
    fn default() -> Self {
        Self {
            level: "info".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendSettings {
    /// Remote engine base URL; the in-process engine is used when unset.
    pub url: Option<String>,
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            url: None,
            timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub system: SystemSettings,
    pub common: CommonSettings,
    pub debug: DebugSettings,
    pub backend: BackendSettings,
}

impl Settings {
    /// Read the stored settings; a missing document yields the defaults.
    pub fn try_load(storage: &dyn Storage) -> Result<Self, StoreError> {
        match storage.get(SETTINGS_NAMESPACE, SETTINGS_KEY)? {
            Some(v) => Ok(serde_json::from_value(v)?),
            None => Ok(Settings::default()),
        }
    }

    /// Load settings, falling back to defaults if they are unreadable.
    pub fn load(storage: &dyn Storage) -> Self {
        Self::try_load(storage).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "failed to load settings, using defaults");
            Settings::default()
        })
    }

    pub fn save(&self, storage: &dyn Storage) -> Result<(), StoreError> {
        storage.set(SETTINGS_NAMESPACE, SETTINGS_KEY, serde_json::to_value(self)?)?;
        storage.save(SETTINGS_NAMESPACE)?;
        tracing::debug!("settings saved");
        Ok(())
    }
}
