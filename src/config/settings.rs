//! Live settings shared with the ban decider.
//!
//! The API key can change while the gate is running (SIGHUP rehash), so the
//! decider reads it through [`ApiKeyProvider`] on every check instead of
//! capturing it at startup.

use parking_lot::RwLock;
use std::path::{Path, PathBuf};

use super::types::{Config, ConfigError};

/// Source of the AbuseIPDB API key.
pub trait ApiKeyProvider: Send + Sync {
    /// Current API key. `None` disables the gate.
    fn api_key(&self) -> Option<String>;
}

/// Reloadable settings backed by the config file.
pub struct Settings {
    path: Option<PathBuf>,
    api_key: RwLock<Option<String>>,
}

impl Settings {
    /// Settings seeded from an already loaded config, reloadable from `path`.
    pub fn from_config(path: impl Into<PathBuf>, config: &Config) -> Self {
        Self {
            path: Some(path.into()),
            api_key: RwLock::new(config.abuseipdb.effective_api_key()),
        }
    }

    /// Fixed settings with no backing file.
    #[cfg(test)]
    pub fn fixed(api_key: Option<&str>) -> Self {
        Self {
            path: None,
            api_key: RwLock::new(
                api_key
                    .map(str::trim)
                    .filter(|k| !k.is_empty())
                    .map(str::to_string),
            ),
        }
    }

    /// Path the settings are reloaded from, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Re-read the config file and swap in its API key.
    ///
    /// On error the previous key stays in effect. Returns whether the gate is
    /// enabled after the reload.
    pub fn reload(&self) -> Result<bool, ConfigError> {
        let Some(path) = self.path.as_deref() else {
            return Ok(self.api_key.read().is_some());
        };

        let config = Config::load(path)?;
        let new_key = config.abuseipdb.effective_api_key();
        let enabled = new_key.is_some();
        *self.api_key.write() = new_key;
        Ok(enabled)
    }
}

impl ApiKeyProvider for Settings {
    fn api_key(&self) -> Option<String> {
        self.api_key.read().clone()
    }
}
