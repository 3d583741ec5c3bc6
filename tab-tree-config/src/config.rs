//! Engine configuration and its YAML persistence.
//!
//! Covers:
//! - the `Config` struct and its defaults
//! - `load` / `save` (YAML file I/O with atomic write)
//! - XDG-style path helpers (`config_path`, `config_dir`, `effective_storage_dir`)
//! - semantic validation

use crate::error::ConfigError;
use crate::types::{GroupDeletePolicy, LogLevel};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Verbosity of the debug log file
    pub log_level: LogLevel,

    /// Quiescence window before a burst of mutations is written to storage
    #[serde(default = "crate::defaults::persistence_debounce_ms")]
    pub persistence_debounce_ms: u64,

    /// Seconds between background reconciliation passes (0 = on demand only)
    #[serde(default = "crate::defaults::reconcile_interval_secs")]
    pub reconcile_interval_secs: u64,

    /// Directory used by the file storage backend.
    /// When unset, `<config dir>/storage` is used.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_dir: Option<PathBuf>,

    /// Close the source window when a subtree move leaves it without tabs
    #[serde(default = "crate::defaults::auto_close_empty_source_window")]
    pub auto_close_empty_source_window: bool,

    /// Expand a collapsed parent when a child tab is opened under it
    #[serde(default = "crate::defaults::expand_parent_on_new_child")]
    pub expand_parent_on_new_child: bool,

    /// How deleting a group that still has children is handled
    pub group_delete_policy: GroupDeletePolicy,

    /// Name of the view every new window starts with
    #[serde(default = "crate::defaults::default_view_name")]
    pub default_view_name: String,

    /// Color of the view every new window starts with
    #[serde(default = "crate::defaults::default_view_color")]
    pub default_view_color: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: LogLevel::default(),
            persistence_debounce_ms: crate::defaults::persistence_debounce_ms(),
            reconcile_interval_secs: crate::defaults::reconcile_interval_secs(),
            storage_dir: None,
            auto_close_empty_source_window: crate::defaults::auto_close_empty_source_window(),
            expand_parent_on_new_child: crate::defaults::expand_parent_on_new_child(),
            group_delete_policy: GroupDeletePolicy::default(),
            default_view_name: crate::defaults::default_view_name(),
            default_view_color: crate::defaults::default_view_color(),
        }
    }
}

impl Config {
    /// Load configuration from the default location, or return defaults
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::config_path())
    }

    /// Load configuration from a specific file.
    ///
    /// A missing or empty file yields the default configuration.
    /// A file that exists but does not parse is an error.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            log::info!("Config file not found at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)?;
        if contents.trim().is_empty() {
            log::info!("Config file {:?} is empty, using defaults", path);
            return Ok(Self::default());
        }

        let config: Config = serde_yaml_ng::from_str(&contents)?;
        config.validate()?;
        log::info!("Loaded config from {:?}", path);
        Ok(config)
    }

    /// Save configuration to the default location
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::config_path())
    }

    /// Save configuration to a specific file
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let yaml = serde_yaml_ng::to_string(self)?;

        // Atomic save: write to temp file then rename to prevent corruption on crash
        let temp_path = path.with_extension("yaml.tmp");
        fs::write(&temp_path, &yaml)?;
        fs::rename(&temp_path, path)?;
        Ok(())
    }

    /// Check field values that serde cannot reject on its own
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_view_name.trim().is_empty() {
            return Err(ConfigError::Validation(
                "default_view_name must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Get the configuration directory: `~/.config/tab-tree`
    pub fn config_dir() -> PathBuf {
        #[cfg(target_os = "windows")]
        {
            dirs::config_dir()
                .map(|dir| dir.join("tab-tree"))
                .unwrap_or_else(|| PathBuf::from("."))
        }
        #[cfg(not(target_os = "windows"))]
        {
            dirs::home_dir()
                .map(|home| home.join(".config").join("tab-tree"))
                .unwrap_or_else(|| PathBuf::from("."))
        }
    }

    /// Get the configuration file path
    pub fn config_path() -> PathBuf {
        Self::config_dir().join("config.yaml")
    }

    /// Directory the file storage backend writes into
    pub fn effective_storage_dir(&self) -> PathBuf {
        self.storage_dir
            .clone()
            .unwrap_or_else(|| Self::config_dir().join("storage"))
    }

    /// Debounce window as a `Duration`
    pub fn persistence_debounce(&self) -> Duration {
        Duration::from_millis(self.persistence_debounce_ms)
    }

    /// Background reconcile period, or `None` when reconciliation is on demand only
    pub fn reconcile_interval(&self) -> Option<Duration> {
        (self.reconcile_interval_secs > 0).then(|| Duration::from_secs(self.reconcile_interval_secs))
    }
}
