//! Configuration system for the tab-tree state engine.
//!
//! This crate provides configuration loading, saving, and default values
//! for the engine, together with the identifier aliases and small value
//! types shared by every other crate in the workspace:
//!
//! - Engine configuration (`Config`) backed by a YAML file
//! - Default value functions used by serde
//! - Tab / window / node identifiers
//! - Group metadata and group deletion policy
//! - Log level selection

pub mod config;
pub mod defaults;
pub mod error;
mod types;

pub use config::Config;
pub use error::ConfigError;
pub use types::{GroupDeletePolicy, GroupInfo, LogLevel, NodeId, TabId, WindowId};
