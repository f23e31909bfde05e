//! Configuration loading and management
//!
//! Handles parsing of `selfcontrol.toml` from the data directory.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::storage::CONFIG_FILE;

/// Environment variable overriding the data directory
pub const DATA_DIR_ENV: &str = "SELFCONTROL_DIR";

const DEFAULT_DATA_DIR: &str = ".selfcontrol";

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Timer engine configuration
    #[serde(default)]
    pub timers: TimersConfig,

    /// Notification configuration
    #[serde(default)]
    pub notify: NotifyConfig,

    /// Document store configuration
    #[serde(default)]
    pub store: StoreConfig,
}

/// Unit applied to bare numeric durations given to `selfcontrol timer`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DurationUnit {
    Minutes,
    Seconds,
}

/// Timer-related configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimersConfig {
    /// Interval between polling passes
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Unit for durations without a suffix
    #[serde(default = "default_duration_unit")]
    pub duration_unit: DurationUnit,
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_duration_unit() -> DurationUnit {
    DurationUnit::Minutes
}

impl Default for TimersConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            duration_unit: default_duration_unit(),
        }
    }
}

impl TimersConfig {
    pub fn poll_interval(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.poll_interval_ms)
    }
}

/// Where fired timers are announced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotifySink {
    Desktop,
    Log,
    Stdout,
}

/// Notification configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifyConfig {
    #[serde(default = "default_sink")]
    pub sink: NotifySink,

    /// Title shown on desktop notifications
    #[serde(default = "default_title")]
    pub title: String,
}

fn default_sink() -> NotifySink {
    NotifySink::Desktop
}

fn default_title() -> String {
    "selfcontrol".to_string()
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            sink: default_sink(),
            title: default_title(),
        }
    }
}

/// Document store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// How long to wait for a collection lock
    #[serde(default = "default_lock_timeout_ms")]
    pub lock_timeout_ms: u64,
}

fn default_lock_timeout_ms() -> u64 {
    crate::lock::DEFAULT_LOCK_TIMEOUT_MS
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            lock_timeout_ms: default_lock_timeout_ms(),
        }
    }
}

impl Config {
    /// Load configuration from a `selfcontrol.toml` file
    pub fn load(path: &Path) -> crate::error::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a data directory, or return defaults
    pub fn load_from_dir(data_dir: &Path) -> Self {
        let config_path = data_dir.join(CONFIG_FILE);
        if !config_path.exists() {
            return Self::default();
        }
        match Self::load(&config_path) {
            Ok(config) => config,
            Err(err) => {
                tracing::warn!(path = %config_path.display(), error = %err, "ignoring invalid config");
                Self::default()
            }
        }
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> crate::error::Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    fn validate(&self) -> crate::error::Result<()> {
        if self.timers.poll_interval_ms == 0 {
            return Err(crate::error::Error::InvalidConfig(
                "timers.poll_interval_ms must be > 0".to_string(),
            ));
        }
        if self.store.lock_timeout_ms == 0 {
            return Err(crate::error::Error::InvalidConfig(
                "store.lock_timeout_ms must be > 0".to_string(),
            ));
        }
        if self.notify.title.trim().is_empty() {
            return Err(crate::error::Error::InvalidConfig(
                "notify.title cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// `$HOME/.selfcontrol`, or `./.selfcontrol` when no home directory is known
pub fn default_data_dir() -> PathBuf {
    directories::BaseDirs::new()
        .map(|dirs| dirs.home_dir().join(DEFAULT_DATA_DIR))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR))
}

/// Pick the data directory: explicit path first, then the default
pub fn resolve_data_dir(explicit: Option<PathBuf>) -> PathBuf {
    explicit.unwrap_or_else(default_data_dir)
}
