//! The authoritative in-memory tab tree.
//!
//! `TreeStateStore` owns every node, the tab→node index, per-window view
//! state and the title/favicon side caches. It is mutated only by the engine's
//! single event-processing task, so it needs no locking.
//!
//! Sub-modules add `impl TreeStateStore` blocks:
//! - [`mutation`]: add / remove / move / expand
//! - [`windows`]: window bookkeeping, cross-window relocation, tab metadata

mod mutation;
mod windows;

use super::types::{Node, TabMetadata, View, ViewTemplate, WindowState};
use crate::error::TreeError;
use std::collections::{BTreeMap, HashMap, HashSet};
use tab_tree_config::{NodeId, TabId, WindowId};

/// Where a node is (or will be) attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Placement {
    pub parent_id: Option<NodeId>,
    pub window_id: WindowId,
    pub view_index: usize,
    /// Position among the siblings; `None` appends
    pub index: Option<usize>,
}

/// Authoritative tab forest with a single-writer mutation API.
#[derive(Debug, Clone)]
pub struct TreeStateStore {
    pub(crate) nodes: HashMap<NodeId, Node>,
    /// Derived tab→node index, kept a bijection with `nodes`
    pub(crate) tab_index: HashMap<TabId, NodeId>,
    pub(crate) windows: BTreeMap<WindowId, WindowState>,
    pub(crate) metadata: TabMetadata,
    pub(crate) view_template: ViewTemplate,
    /// Counter for generating unique node IDs
    next_node_id: NodeId,
    /// Bumped after every successful mutation
    revision: u64,
}

impl Default for TreeStateStore {
    fn default() -> Self {
        Self::new(ViewTemplate::default())
    }
}

impl TreeStateStore {
    /// Create an empty store; new windows start with one view built from `view_template`
    pub fn new(view_template: ViewTemplate) -> Self {
        Self {
            nodes: HashMap::new(),
            tab_index: HashMap::new(),
            windows: BTreeMap::new(),
            metadata: TabMetadata::default(),
            view_template,
            next_node_id: 1,
            revision: 0,
        }
    }

    pub(crate) fn allocate_node_id(&mut self) -> NodeId {
        let id = self.next_node_id;
        self.next_node_id += 1;
        id
    }

    /// Record that the tree changed
    pub(crate) fn touch(&mut self) {
        self.revision += 1;
    }

    /// Monotonic change counter; differs whenever the state differs
    pub fn revision(&self) -> u64 {
        self.revision
    }

    // =========================================================================
    // Lookups
    // =========================================================================

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    pub fn node_by_tab(&self, tab_id: TabId) -> Option<&Node> {
        self.tab_index.get(&tab_id).and_then(|id| self.nodes.get(id))
    }

    pub fn node_id_for_tab(&self, tab_id: TabId) -> Option<NodeId> {
        self.tab_index.get(&tab_id).copied()
    }

    pub fn contains_tab(&self, tab_id: TabId) -> bool {
        self.tab_index.contains_key(&tab_id)
    }

    /// Every tab id referenced by the tree, in no particular order
    pub fn tab_ids(&self) -> impl Iterator<Item = TabId> + '_ {
        self.tab_index.keys().copied()
    }

    pub(crate) fn require_node(&self, id: NodeId) -> Result<&Node, TreeError> {
        self.nodes.get(&id).ok_or(TreeError::NodeNotFound(id))
    }

    pub(crate) fn require_tab(&self, tab_id: TabId) -> Result<&Node, TreeError> {
        self.node_by_tab(tab_id).ok_or(TreeError::TabNotFound(tab_id))
    }

    /// Whether `child_tab` is a direct child of `parent_tab`
    pub fn is_child_of(&self, child_tab: TabId, parent_tab: TabId) -> bool {
        match (self.node_by_tab(child_tab), self.node_id_for_tab(parent_tab)) {
            (Some(child), Some(parent_id)) => child.parent_id == Some(parent_id),
            _ => false,
        }
    }

    /// Depth of the node wrapping `tab_id`
    pub fn depth_of(&self, tab_id: TabId) -> Option<usize> {
        self.node_by_tab(tab_id).map(|n| n.depth)
    }

    /// Tab ids of the direct children of `tab_id`, in order
    pub fn child_tab_ids(&self, tab_id: TabId) -> Vec<TabId> {
        self.node_by_tab(tab_id)
            .map(|n| n.children.iter().map(|c| self.nodes[c].tab_id).collect())
            .unwrap_or_default()
    }

    /// Whether `node_id` is `ancestor_id` or lies somewhere below it
    pub fn is_same_or_descendant(&self, node_id: NodeId, ancestor_id: NodeId) -> bool {
        let mut current = Some(node_id);
        while let Some(id) = current {
            if id == ancestor_id {
                return true;
            }
            current = self.nodes.get(&id).and_then(|n| n.parent_id);
        }
        false
    }

    /// Node ids of a subtree in pre-order, starting with `node_id` itself
    pub fn subtree_node_ids(&self, node_id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![node_id];
        while let Some(id) = stack.pop() {
            let Some(node) = self.nodes.get(&id) else {
                continue;
            };
            out.push(id);
            stack.extend(node.children.iter().rev());
        }
        out
    }

    /// Tab ids of a subtree in pre-order, starting with `tab_id` itself
    pub fn subtree_tab_ids(&self, tab_id: TabId) -> Vec<TabId> {
        self.node_id_for_tab(tab_id)
            .map(|id| {
                self.subtree_node_ids(id)
                    .into_iter()
                    .map(|n| self.nodes[&n].tab_id)
                    .collect()
            })
            .unwrap_or_default()
    }

    // =========================================================================
    // Windows and views
    // =========================================================================

    pub fn window(&self, window_id: WindowId) -> Option<&WindowState> {
        self.windows.get(&window_id)
    }

    /// All windows, ordered by window id
    pub fn windows(&self) -> impl Iterator<Item = &WindowState> {
        self.windows.values()
    }

    pub fn window_ids(&self) -> Vec<WindowId> {
        self.windows.keys().copied().collect()
    }

    /// `getView(windowId, viewIndex)`
    pub fn get_view(&self, window_id: WindowId, view_index: usize) -> Result<&View, TreeError> {
        let window = self
            .windows
            .get(&window_id)
            .ok_or(TreeError::WindowNotFound(window_id))?;
        window.views.get(view_index).ok_or(TreeError::ViewNotFound {
            window_id,
            view_index,
        })
    }

    /// Tab ids at the roots of a view, in order
    pub fn root_tab_ids(&self, window_id: WindowId, view_index: usize) -> Vec<TabId> {
        self.get_view(window_id, view_index)
            .map(|view| {
                view.root_nodes
                    .iter()
                    .map(|id| self.nodes[id].tab_id)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Every tab in a window, view by view, each tree in pre-order
    pub fn tabs_in_window(&self, window_id: WindowId) -> Vec<TabId> {
        let Some(window) = self.windows.get(&window_id) else {
            return Vec::new();
        };
        window
            .views
            .iter()
            .flat_map(|view| view.root_nodes.iter())
            .flat_map(|root| self.subtree_node_ids(*root))
            .map(|id| self.nodes[&id].tab_id)
            .collect()
    }

    // =========================================================================
    // Metadata
    // =========================================================================

    pub fn metadata(&self) -> &TabMetadata {
        &self.metadata
    }

    pub fn title(&self, tab_id: TabId) -> Option<&str> {
        self.metadata.titles.get(&tab_id).map(String::as_str)
    }

    pub fn favicon(&self, tab_id: TabId) -> Option<&str> {
        self.metadata.favicons.get(&tab_id).map(String::as_str)
    }

    pub fn is_discarded(&self, tab_id: TabId) -> bool {
        self.metadata.discarded.contains(&tab_id)
    }

    // =========================================================================
    // Invariants
    // =========================================================================

    /// Walk the whole forest and check every structural invariant:
    /// parent/child links agree, depth is `parent.depth + 1` (roots 0), every
    /// node is reachable exactly once (so the forest is acyclic), window/view
    /// tags match the containing view, and the tab index is a bijection.
    pub fn validate(&self) -> Result<(), String> {
        let mut seen: HashSet<NodeId> = HashSet::new();

        for (window_id, window) in &self.windows {
            if window.window_id != *window_id {
                return Err(format!("window keyed {window_id} claims id {}", window.window_id));
            }
            if window.views.is_empty() {
                return Err(format!("window {window_id} has no views"));
            }
            if window.active_view_index >= window.views.len() {
                return Err(format!(
                    "window {window_id} active view {} out of range",
                    window.active_view_index
                ));
            }

            for (view_index, view) in window.views.iter().enumerate() {
                let mut stack: Vec<(NodeId, Option<NodeId>, usize)> =
                    view.root_nodes.iter().rev().map(|id| (*id, None, 0)).collect();

                while let Some((id, expected_parent, expected_depth)) = stack.pop() {
                    let node = self
                        .nodes
                        .get(&id)
                        .ok_or_else(|| format!("dangling node id {id}"))?;
                    if !seen.insert(id) {
                        return Err(format!("node {id} reachable twice (cycle or shared child)"));
                    }
                    if node.parent_id != expected_parent {
                        return Err(format!(
                            "node {id} parent {:?}, expected {:?}",
                            node.parent_id, expected_parent
                        ));
                    }
                    if node.depth != expected_depth {
                        return Err(format!(
                            "node {id} depth {}, expected {expected_depth}",
                            node.depth
                        ));
                    }
                    if node.window_id != *window_id || node.view_index != view_index {
                        return Err(format!(
                            "node {id} tagged window {} view {}, found in window {window_id} view {view_index}",
                            node.window_id, node.view_index
                        ));
                    }
                    for child in node.children.iter().rev() {
                        stack.push((*child, Some(id), expected_depth + 1));
                    }
                }
            }
        }

        if seen.len() != self.nodes.len() {
            return Err(format!(
                "{} nodes stored but {} reachable",
                self.nodes.len(),
                seen.len()
            ));
        }
        if self.tab_index.len() != self.nodes.len() {
            return Err(format!(
                "tab index has {} entries for {} nodes",
                self.tab_index.len(),
                self.nodes.len()
            ));
        }
        for (tab_id, node_id) in &self.tab_index {
            match self.nodes.get(node_id) {
                Some(node) if node.tab_id == *tab_id => {}
                _ => return Err(format!("tab index entry {tab_id} -> {node_id} is stale")),
            }
        }
        Ok(())
    }
}
