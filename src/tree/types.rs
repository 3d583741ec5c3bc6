//! Plain data types for the tab tree: nodes, views, windows, tab metadata.
//!
//! These carry no behavior beyond small accessors; every mutation goes
//! through [`super::TreeStateStore`].

use serde::Serialize;
use std::collections::{BTreeSet, HashMap, HashSet};
use tab_tree_config::{GroupInfo, NodeId, TabId, WindowId};

/// One entry in the tab tree, wrapping a tab or a group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub id: NodeId,
    pub tab_id: TabId,
    pub parent_id: Option<NodeId>,
    /// Child node ids in display order
    pub children: Vec<NodeId>,
    /// 0 for roots, `parent.depth + 1` otherwise
    pub depth: usize,
    pub is_expanded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_info: Option<GroupInfo>,
    /// Window holding the node's whole subtree
    pub window_id: WindowId,
    /// View (within `window_id`) holding the node's whole subtree
    pub view_index: usize,
}

impl Node {
    pub(crate) fn new(id: NodeId, tab_id: TabId, window_id: WindowId, view_index: usize) -> Self {
        Self {
            id,
            tab_id,
            parent_id: None,
            children: Vec::new(),
            depth: 0,
            is_expanded: true,
            group_info: None,
            window_id,
            view_index,
        }
    }

    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }

    pub fn is_group(&self) -> bool {
        self.group_info.is_some()
    }
}

/// A named, colored partition of a window's tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct View {
    pub name: String,
    pub color: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    /// Root node ids in display order
    pub root_nodes: Vec<NodeId>,
}

impl View {
    pub fn new(name: impl Into<String>, color: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            color: color.into(),
            icon: None,
            root_nodes: Vec::new(),
        }
    }
}

/// Per-window tree state: its views, which one is shown, and pinned tabs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WindowState {
    pub window_id: WindowId,
    pub views: Vec<View>,
    pub active_view_index: usize,
    pub pinned_tab_ids: BTreeSet<TabId>,
    /// Last tab the host reported as active in this window
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active_tab_id: Option<TabId>,
}

impl WindowState {
    pub(crate) fn new(window_id: WindowId, first_view: View) -> Self {
        Self {
            window_id,
            views: vec![first_view],
            active_view_index: 0,
            pinned_tab_ids: BTreeSet::new(),
            active_tab_id: None,
        }
    }

    pub fn active_view(&self) -> &View {
        &self.views[self.active_view_index]
    }

    /// Number of nodes directly at view roots, across all views
    pub fn root_count(&self) -> usize {
        self.views.iter().map(|v| v.root_nodes.len()).sum()
    }
}

/// Side caches keyed by tab id, used to render before live metadata arrives.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TabMetadata {
    pub titles: HashMap<TabId, String>,
    pub favicons: HashMap<TabId, String>,
    /// Suspended tabs; still live as far as the tree is concerned
    pub discarded: HashSet<TabId>,
}

impl TabMetadata {
    /// Drop every cache entry for `tab_id`
    pub fn forget(&mut self, tab_id: TabId) {
        self.titles.remove(&tab_id);
        self.favicons.remove(&tab_id);
        self.discarded.remove(&tab_id);
    }
}

/// Name and color given to the first view of every new window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewTemplate {
    pub name: String,
    pub color: String,
}

impl Default for ViewTemplate {
    fn default() -> Self {
        Self {
            name: tab_tree_config::defaults::default_view_name(),
            color: tab_tree_config::defaults::default_view_color(),
        }
    }
}

impl ViewTemplate {
    pub fn build(&self) -> View {
        View::new(self.name.clone(), self.color.clone())
    }
}
