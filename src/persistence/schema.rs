//! Reading and migrating stored tree blobs.
//!
//! Version 1 blobs are a bare array of windows whose nodes carry an optional
//! `groupInfo` instead of a `kind` tag. They are upgraded to the current
//! layout on load and written back in it on the next save.

use super::{
    PersistedGroup, PersistedNode, PersistedTab, PersistedTree, PersistedView, PersistedWindow,
    SCHEMA_VERSION, TREE_STATE_KEY,
};
use crate::error::StorageError;
use serde::Deserialize;
use serde_json::Value;
use tab_tree_config::{GroupInfo, TabId, WindowId};

/// A decoded blob and whether it had to be migrated
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedTree {
    pub tree: PersistedTree,
    /// Schema version found in storage
    pub from_version: u64,
}

impl DecodedTree {
    pub fn migrated(&self) -> bool {
        self.from_version != SCHEMA_VERSION
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LegacyWindow {
    window_id: WindowId,
    #[serde(default)]
    views: Vec<LegacyView>,
    #[serde(default)]
    active_view_index: usize,
    #[serde(default)]
    pinned_tab_ids: Vec<TabId>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LegacyView {
    name: String,
    color: String,
    #[serde(default)]
    icon: Option<String>,
    #[serde(default)]
    root_nodes: Vec<LegacyNode>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LegacyNode {
    tab_id: TabId,
    #[serde(default = "super::default_expanded")]
    is_expanded: bool,
    #[serde(default)]
    group_info: Option<GroupInfo>,
    #[serde(default)]
    children: Vec<LegacyNode>,
}

/// Object form of a version 1 blob
#[derive(Debug, Deserialize)]
struct LegacyEnvelope {
    windows: Vec<LegacyWindow>,
}

/// Decode whatever is stored under the tree key
pub fn decode_tree(value: Value) -> Result<DecodedTree, StorageError> {
    let deserialize_err = |source| StorageError::Deserialize {
        key: TREE_STATE_KEY.to_string(),
        source,
    };

    if value.is_array() {
        let windows: Vec<LegacyWindow> = serde_json::from_value(value).map_err(deserialize_err)?;
        return Ok(DecodedTree {
            tree: migrate_v1(windows),
            from_version: 1,
        });
    }

    let version = value
        .get("schemaVersion")
        .and_then(Value::as_u64)
        .unwrap_or(1);
    match version {
        v if v > SCHEMA_VERSION => Err(StorageError::UnsupportedVersion {
            found: v,
            supported: SCHEMA_VERSION,
        }),
        SCHEMA_VERSION => {
            let tree: PersistedTree = serde_json::from_value(value).map_err(deserialize_err)?;
            Ok(DecodedTree {
                tree,
                from_version: SCHEMA_VERSION,
            })
        }
        _ => {
            let envelope: LegacyEnvelope =
                serde_json::from_value(value).map_err(deserialize_err)?;
            Ok(DecodedTree {
                tree: migrate_v1(envelope.windows),
                from_version: 1,
            })
        }
    }
}

/// Serialize at the current schema version
pub fn encode_tree(tree: &PersistedTree) -> Result<Value, StorageError> {
    serde_json::to_value(tree).map_err(|source| StorageError::Serialize {
        key: TREE_STATE_KEY.to_string(),
        source,
    })
}

fn migrate_v1(windows: Vec<LegacyWindow>) -> PersistedTree {
    log::info!("Migrating {} legacy windows to schema v{}", windows.len(), SCHEMA_VERSION);
    PersistedTree {
        schema_version: SCHEMA_VERSION,
        windows: windows
            .into_iter()
            .map(|window| PersistedWindow {
                window_id: window.window_id,
                views: window
                    .views
                    .into_iter()
                    .map(|view| PersistedView {
                        name: view.name,
                        color: view.color,
                        icon: view.icon,
                        root_nodes: view.root_nodes.into_iter().map(migrate_node).collect(),
                    })
                    .collect(),
                active_view_index: window.active_view_index,
                pinned_tab_ids: window.pinned_tab_ids,
            })
            .collect(),
    }
}

fn migrate_node(node: LegacyNode) -> PersistedNode {
    let children = node.children.into_iter().map(migrate_node).collect();
    match node.group_info {
        Some(info) => PersistedNode::Group(PersistedGroup {
            tab_id: node.tab_id,
            is_expanded: node.is_expanded,
            name: info.name,
            color: info.color,
            children,
        }),
        None => PersistedNode::Tab(PersistedTab {
            tab_id: node.tab_id,
            is_expanded: node.is_expanded,
            children,
        }),
    }
}
