//! Structural mutations: add, remove, move, expand.
//!
//! Each public operation validates everything it needs before touching the
//! tree, so a returned error always means the tree is unchanged.

use super::{Placement, TreeStateStore};
use crate::error::TreeError;
use crate::tree::types::Node;
use tab_tree_config::{NodeId, TabId, WindowId};

impl TreeStateStore {
    /// `addNode(tabId, parentId?)`: append a node for `tab_id`.
    ///
    /// With a parent, the node becomes its last child (and lives in the
    /// parent's window); without one it becomes the last root of the
    /// window's active view, creating the window state if needed.
    pub fn add_node(
        &mut self,
        tab_id: TabId,
        window_id: WindowId,
        parent_id: Option<NodeId>,
    ) -> Result<NodeId, TreeError> {
        self.insert_node(tab_id, window_id, parent_id, None)
    }

    /// Like [`Self::add_node`] but at a specific sibling position
    pub fn insert_node(
        &mut self,
        tab_id: TabId,
        window_id: WindowId,
        parent_id: Option<NodeId>,
        index: Option<usize>,
    ) -> Result<NodeId, TreeError> {
        if self.tab_index.contains_key(&tab_id) {
            return Err(TreeError::DuplicateTab(tab_id));
        }

        let placement = match parent_id {
            Some(parent_id) => {
                let parent = self.require_node(parent_id)?;
                if parent.window_id != window_id {
                    log::debug!(
                        "tab {} created for window {} under parent in window {}; using parent's window",
                        tab_id,
                        window_id,
                        parent.window_id
                    );
                }
                Placement {
                    parent_id: Some(parent_id),
                    window_id: parent.window_id,
                    view_index: parent.view_index,
                    index,
                }
            }
            None => {
                let view_index = self.ensure_window(window_id).active_view_index;
                Placement {
                    parent_id: None,
                    window_id,
                    view_index,
                    index,
                }
            }
        };

        self.insert_at(tab_id, placement)
    }

    /// Create a node for `tab_id` at an explicit placement
    pub(crate) fn insert_at(&mut self, tab_id: TabId, placement: Placement) -> Result<NodeId, TreeError> {
        if self.tab_index.contains_key(&tab_id) {
            return Err(TreeError::DuplicateTab(tab_id));
        }

        let id = self.allocate_node_id();
        self.nodes.insert(
            id,
            Node::new(id, tab_id, placement.window_id, placement.view_index),
        );
        self.tab_index.insert(tab_id, id);

        if let Err(e) = self.attach(id, placement) {
            self.nodes.remove(&id);
            self.tab_index.remove(&tab_id);
            return Err(e);
        }

        self.touch();
        crate::debug_log!(
            "TREE",
            "Added node {} for tab {} (parent {:?}, window {})",
            id,
            tab_id,
            placement.parent_id,
            placement.window_id
        );
        Ok(id)
    }

    /// `removeNode(tabId)`: delete the node for `tab_id`.
    ///
    /// Its children take its place among its former siblings (or among the
    /// view roots when it had no parent), keeping their relative order, and
    /// their subtrees get their depth recomputed. The tab's side-cache entries
    /// go with it. Returns the removed node.
    pub fn remove_node(&mut self, tab_id: TabId) -> Result<Node, TreeError> {
        let node_id = self
            .node_id_for_tab(tab_id)
            .ok_or(TreeError::TabNotFound(tab_id))?;

        let position = self.detach(node_id)?;
        let node = self
            .nodes
            .remove(&node_id)
            .ok_or(TreeError::NodeNotFound(node_id))?;
        self.tab_index.remove(&tab_id);

        for (offset, child) in node.children.iter().enumerate() {
            self.attach(
                *child,
                Placement {
                    parent_id: node.parent_id,
                    window_id: node.window_id,
                    view_index: node.view_index,
                    index: Some(position + offset),
                },
            )?;
        }

        self.metadata.forget(tab_id);
        if let Some(window) = self.windows.get_mut(&node.window_id) {
            window.pinned_tab_ids.remove(&tab_id);
            if window.active_tab_id == Some(tab_id) {
                window.active_tab_id = None;
            }
        }

        self.touch();
        crate::debug_log!(
            "TREE",
            "Removed node {} for tab {}, promoted {} children",
            node_id,
            tab_id,
            node.children.len()
        );
        Ok(node)
    }

    /// `moveNode(nodeId, newParentId, index)`: reparent and/or reorder a node.
    ///
    /// `new_parent_id: None` moves the node to the roots of its current view.
    /// `index` is the position among the new siblings once the node has been
    /// taken out of its old place, clamped to the end. The whole subtree moves
    /// with the node. The new parent must be in the node's window; moving
    /// tabs between windows needs the host and goes through the drag API.
    pub fn move_node(
        &mut self,
        node_id: NodeId,
        new_parent_id: Option<NodeId>,
        index: usize,
    ) -> Result<(), TreeError> {
        let node = self.require_node(node_id)?;
        let placement = match new_parent_id {
            Some(parent_id) => {
                let parent = self.require_node(parent_id)?;
                if self.is_same_or_descendant(parent_id, node_id) {
                    return Err(TreeError::Cycle {
                        node_id,
                        new_parent_id: parent_id,
                    });
                }
                if parent.window_id != node.window_id {
                    return Err(TreeError::TabNotInWindow {
                        tab_id: node.tab_id,
                        window_id: parent.window_id,
                    });
                }
                Placement {
                    parent_id: Some(parent_id),
                    window_id: parent.window_id,
                    view_index: parent.view_index,
                    index: Some(index),
                }
            }
            None => Placement {
                parent_id: None,
                window_id: node.window_id,
                view_index: node.view_index,
                index: Some(index),
            },
        };

        self.reattach(node_id, placement)?;
        self.touch();
        Ok(())
    }

    /// `setExpanded(nodeId, bool)`
    pub fn set_expanded(&mut self, node_id: NodeId, expanded: bool) -> Result<(), TreeError> {
        let node = self
            .nodes
            .get_mut(&node_id)
            .ok_or(TreeError::NodeNotFound(node_id))?;
        if node.is_expanded != expanded {
            node.is_expanded = expanded;
            self.touch();
        }
        Ok(())
    }

    // =========================================================================
    // Internal helpers
    // =========================================================================

    /// Detach then attach; the caller has already validated `placement`.
    pub(crate) fn reattach(&mut self, node_id: NodeId, placement: Placement) -> Result<(), TreeError> {
        let old_position = self.detach(node_id)?;
        let (old_parent, old_window, old_view) = {
            let node = self.require_node(node_id)?;
            (node.parent_id, node.window_id, node.view_index)
        };
        if let Err(e) = self.attach(node_id, placement) {
            // Put it back where it was so the tree stays whole
            self.attach(
                node_id,
                Placement {
                    parent_id: old_parent,
                    window_id: old_window,
                    view_index: old_view,
                    index: Some(old_position),
                },
            )?;
            return Err(e);
        }
        Ok(())
    }

    /// The ordered sibling list a node with this parent/window/view lives in
    fn siblings_mut(
        &mut self,
        parent_id: Option<NodeId>,
        window_id: WindowId,
        view_index: usize,
    ) -> Result<&mut Vec<NodeId>, TreeError> {
        match parent_id {
            Some(parent_id) => self
                .nodes
                .get_mut(&parent_id)
                .map(|parent| &mut parent.children)
                .ok_or(TreeError::NodeNotFound(parent_id)),
            None => self
                .windows
                .get_mut(&window_id)
                .ok_or(TreeError::WindowNotFound(window_id))?
                .views
                .get_mut(view_index)
                .map(|view| &mut view.root_nodes)
                .ok_or(TreeError::ViewNotFound {
                    window_id,
                    view_index,
                }),
        }
    }

    /// Remove a node from its sibling list, returning the position it had.
    /// The node keeps its own children and stays in `nodes`.
    pub(crate) fn detach(&mut self, node_id: NodeId) -> Result<usize, TreeError> {
        let (parent_id, window_id, view_index) = {
            let node = self.require_node(node_id)?;
            (node.parent_id, node.window_id, node.view_index)
        };
        let siblings = self.siblings_mut(parent_id, window_id, view_index)?;
        let position = siblings
            .iter()
            .position(|id| *id == node_id)
            .ok_or(TreeError::NodeNotFound(node_id))?;
        siblings.remove(position);
        Ok(position)
    }

    /// Insert a detached node at `placement` and retag its whole subtree
    pub(crate) fn attach(&mut self, node_id: NodeId, placement: Placement) -> Result<(), TreeError> {
        let depth = match placement.parent_id {
            Some(parent_id) => self.require_node(parent_id)?.depth + 1,
            None => 0,
        };
        let siblings =
            self.siblings_mut(placement.parent_id, placement.window_id, placement.view_index)?;
        let index = placement
            .index
            .unwrap_or(siblings.len())
            .min(siblings.len());
        siblings.insert(index, node_id);

        if let Some(node) = self.nodes.get_mut(&node_id) {
            node.parent_id = placement.parent_id;
        }
        self.relocate_subtree(node_id, depth, placement.window_id, placement.view_index);
        Ok(())
    }

    /// Recompute depth and window/view tags for a subtree rooted at `node_id`
    pub(crate) fn relocate_subtree(
        &mut self,
        node_id: NodeId,
        depth: usize,
        window_id: WindowId,
        view_index: usize,
    ) {
        let mut stack = vec![(node_id, depth)];
        while let Some((id, depth)) = stack.pop() {
            let Some(node) = self.nodes.get_mut(&id) else {
                continue;
            };
            node.depth = depth;
            node.window_id = window_id;
            node.view_index = view_index;
            stack.extend(node.children.iter().map(|child| (*child, depth + 1)));
        }
    }
}
