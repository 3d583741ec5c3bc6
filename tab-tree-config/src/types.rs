//! Shared identifiers and configuration enums.

use serde::{Deserialize, Serialize};

/// Browser-assigned tab identifier
pub type TabId = u64;

/// Browser-assigned window identifier
pub type WindowId = u64;

/// Engine-assigned tree node identifier (never persisted)
pub type NodeId = u64;

/// Display metadata carried by a group node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupInfo {
    /// Group label shown in the tree
    pub name: String,
    /// Group color, usually a CSS hex string
    pub color: String,
}

impl GroupInfo {
    pub fn new(name: impl Into<String>, color: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            color: color.into(),
        }
    }
}

/// What happens when a group that still owns children is deleted.
///
/// Empty groups are always deleted immediately regardless of this setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum GroupDeletePolicy {
    /// Refuse the delete and report the group as non-empty
    #[default]
    Reject,
    /// Delete the group node and promote its children into its place
    PromoteChildren,
}

/// Log level for debug logging to file.
///
/// Controls the verbosity of log output written to the debug log file.
/// The `RUST_LOG` environment variable and the `--log-level` CLI flag take precedence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// No logging (log file not created)
    #[default]
    Off,
    /// Errors only
    Error,
    /// Warnings and errors
    Warn,
    /// Informational messages
    Info,
    /// Debug messages
    Debug,
    /// Most verbose
    Trace,
}

impl LogLevel {
    /// Convert to `log::LevelFilter`
    pub fn to_level_filter(self) -> log::LevelFilter {
        match self {
            LogLevel::Off => log::LevelFilter::Off,
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}
