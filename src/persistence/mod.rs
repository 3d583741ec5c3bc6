//! Persisted tree types and the debounced persistence pipeline.
//!
//! The tree is stored under [`TREE_STATE_KEY`] as a versioned record
//! ([`PersistedTree`]); titles and favicons live under their own keys. Older
//! blobs are migrated on load by [`schema::decode_tree`].

pub mod backend;
pub mod capture;
pub mod gateway;
pub mod restore;
pub mod schema;

pub use backend::{FileStorage, MemoryStorage, StorageBackend};
pub use gateway::{LoadedState, PersistenceGateway};

use serde::{Deserialize, Serialize};
use tab_tree_config::{TabId, WindowId};

/// Key holding the tree blob
pub const TREE_STATE_KEY: &str = "tree_state";
/// Key holding `{tabId: title}`
pub const TITLES_KEY: &str = "tab_titles";
/// Key holding `{tabId: faviconUrl}`
pub const FAVICONS_KEY: &str = "tab_favicons";

/// Newest schema version this build reads and the one it writes
pub const SCHEMA_VERSION: u64 = 2;

fn default_expanded() -> bool {
    true
}

/// Top-level tree blob
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedTree {
    pub schema_version: u64,
    pub windows: Vec<PersistedWindow>,
}

impl Default for PersistedTree {
    fn default() -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            windows: Vec::new(),
        }
    }
}

impl PersistedTree {
    /// Number of tab entries across every window and view
    pub fn tab_count(&self) -> usize {
        fn count(nodes: &[PersistedNode]) -> usize {
            nodes.iter().map(|n| 1 + count(n.children())).sum()
        }
        self.windows
            .iter()
            .flat_map(|w| w.views.iter())
            .map(|v| count(&v.root_nodes))
            .sum()
    }
}

/// One window's views
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedWindow {
    pub window_id: WindowId,
    pub views: Vec<PersistedView>,
    #[serde(default)]
    pub active_view_index: usize,
    #[serde(default)]
    pub pinned_tab_ids: Vec<TabId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedView {
    pub name: String,
    pub color: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default)]
    pub root_nodes: Vec<PersistedNode>,
}

/// A tree entry, tagged by kind
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum PersistedNode {
    Tab(PersistedTab),
    Group(PersistedGroup),
}

impl PersistedNode {
    pub fn tab_id(&self) -> TabId {
        match self {
            PersistedNode::Tab(tab) => tab.tab_id,
            PersistedNode::Group(group) => group.tab_id,
        }
    }

    pub fn is_expanded(&self) -> bool {
        match self {
            PersistedNode::Tab(tab) => tab.is_expanded,
            PersistedNode::Group(group) => group.is_expanded,
        }
    }

    pub fn children(&self) -> &[PersistedNode] {
        match self {
            PersistedNode::Tab(tab) => &tab.children,
            PersistedNode::Group(group) => &group.children,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedTab {
    pub tab_id: TabId,
    #[serde(default = "default_expanded")]
    pub is_expanded: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<PersistedNode>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedGroup {
    pub tab_id: TabId,
    #[serde(default = "default_expanded")]
    pub is_expanded: bool,
    pub name: String,
    pub color: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<PersistedNode>,
}
