//! Typed error types for the tab-tree engine.
//!
//! The tree store, the host boundary and the storage layer each have their
//! own error enum so callers can match on the failure that concerns them;
//! [`EngineError`] wraps all of them for the event loop.

use tab_tree_config::{NodeId, TabId, WindowId};
use thiserror::Error;

/// Failures of [`crate::tree::TreeStateStore`] operations.
///
/// Every failing operation leaves the tree exactly as it was.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TreeError {
    #[error("node {0} not found")]
    NodeNotFound(NodeId),

    #[error("no node for tab {0}")]
    TabNotFound(TabId),

    #[error("window {0} not found")]
    WindowNotFound(WindowId),

    #[error("view {view_index} not found in window {window_id}")]
    ViewNotFound {
        window_id: WindowId,
        view_index: usize,
    },

    /// The requested parent is the node itself or one of its descendants.
    #[error("cannot move node {node_id} under {new_parent_id}: it would create a cycle")]
    Cycle {
        node_id: NodeId,
        new_parent_id: NodeId,
    },

    #[error("tab {tab_id} is not in window {window_id}")]
    TabNotInWindow { tab_id: TabId, window_id: WindowId },

    #[error("tab {0} is already in the tree")]
    DuplicateTab(TabId),

    #[error("node {0} is not a group")]
    NotAGroup(NodeId),

    #[error("group {node_id} still has {children} children")]
    GroupNotEmpty { node_id: NodeId, children: usize },

    #[error("window {0} must keep at least one view")]
    LastView(WindowId),

    /// A node references a tab the host no longer knows about.
    ///
    /// Never reported to the UI; the reconciler removes the ghost instead.
    #[error("tab {0} no longer exists")]
    StaleReference(TabId),
}

impl TreeError {
    /// Whether this is one of the "unknown id" failures
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            TreeError::NodeNotFound(_)
                | TreeError::TabNotFound(_)
                | TreeError::WindowNotFound(_)
                | TreeError::ViewNotFound { .. }
        )
    }
}

/// Failures reported by the host browser API.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HostError {
    #[error("host has no tab {0}")]
    TabNotFound(TabId),

    #[error("host has no window {0}")]
    WindowNotFound(WindowId),

    #[error("host API call failed: {0}")]
    Api(String),
}

/// Failures of the persistence layer.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage I/O error for key '{key}': {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize '{key}': {source}")]
    Serialize {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to parse '{key}': {source}")]
    Deserialize {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("stored tree uses schema version {found}, newest supported is {supported}")]
    UnsupportedVersion { found: u64, supported: u64 },
}

/// Everything that can fail while the engine processes one message.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Tree(#[from] TreeError),

    #[error("external API error: {0}")]
    Host(#[from] HostError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("no drag session in progress")]
    NoDragSession,

    #[error("engine has stopped")]
    EngineStopped,
}
