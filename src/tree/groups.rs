//! Group containers: nodes carrying `GroupInfo` that own other tabs.
//!
//! A group is backed by its own tab (the host shows a placeholder page for
//! it), so it lives in the tree like any other node.

use super::store::Placement;
use super::TreeStateStore;
use crate::error::TreeError;
use tab_tree_config::{GroupDeletePolicy, GroupInfo, NodeId, TabId, WindowId};

/// Everything needed to create a group in one step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewGroup {
    /// Tab backing the group node; must not be in the tree yet
    pub group_tab_id: TabId,
    pub window_id: WindowId,
    pub info: GroupInfo,
    /// Tabs moved under the group, in this order
    pub member_tab_ids: Vec<TabId>,
    /// Explicit parent for the group; defaults to where the first member was
    pub parent_id: Option<NodeId>,
}

impl TreeStateStore {
    /// Create a group node and move `member_tab_ids` under it.
    ///
    /// Either the whole operation applies or the tree is left unchanged.
    pub fn create_group(&mut self, group: NewGroup) -> Result<NodeId, TreeError> {
        if self.contains_tab(group.group_tab_id) {
            return Err(TreeError::DuplicateTab(group.group_tab_id));
        }

        let mut member_nodes: Vec<NodeId> = Vec::with_capacity(group.member_tab_ids.len());
        for tab_id in &group.member_tab_ids {
            let node = self.require_tab(*tab_id)?;
            if node.window_id != group.window_id {
                return Err(TreeError::TabNotInWindow {
                    tab_id: *tab_id,
                    window_id: group.window_id,
                });
            }
            if !member_nodes.contains(&node.id) {
                member_nodes.push(node.id);
            }
        }

        let placement = self.group_placement(&group, &member_nodes)?;

        let mut staged = self.clone();
        let group_node = staged.insert_at(group.group_tab_id, placement)?;
        if let Some(node) = staged.nodes.get_mut(&group_node) {
            node.group_info = Some(group.info.clone());
        }
        for member in &member_nodes {
            staged.move_node(*member, Some(group_node), usize::MAX)?;
        }
        *self = staged;

        log::info!(
            "Created group '{}' (node {}) in window {} with {} members",
            group.info.name,
            group_node,
            group.window_id,
            member_nodes.len()
        );
        Ok(group_node)
    }

    /// Rename and/or recolor a group
    pub fn update_group(
        &mut self,
        node_id: NodeId,
        name: Option<String>,
        color: Option<String>,
    ) -> Result<(), TreeError> {
        let node = self
            .nodes
            .get_mut(&node_id)
            .ok_or(TreeError::NodeNotFound(node_id))?;
        let info = node
            .group_info
            .as_mut()
            .ok_or(TreeError::NotAGroup(node_id))?;
        if let Some(name) = name {
            info.name = name;
        }
        if let Some(color) = color {
            info.color = color;
        }
        self.touch();
        Ok(())
    }

    /// Delete a group node.
    ///
    /// Empty groups always go. A group with children is refused under
    /// [`GroupDeletePolicy::Reject`] and dissolved (children promoted into its
    /// place) under [`GroupDeletePolicy::PromoteChildren`]. Returns the removed
    /// node so the caller can close the backing tab.
    pub fn delete_group(
        &mut self,
        node_id: NodeId,
        policy: GroupDeletePolicy,
    ) -> Result<super::Node, TreeError> {
        let node = self.require_node(node_id)?;
        if !node.is_group() {
            return Err(TreeError::NotAGroup(node_id));
        }
        if !node.children.is_empty() && policy == GroupDeletePolicy::Reject {
            return Err(TreeError::GroupNotEmpty {
                node_id,
                children: node.children.len(),
            });
        }
        let tab_id = node.tab_id;
        self.remove_node(tab_id)
    }

    /// Where a new group goes: under the explicit parent, else where the
    /// first member sits, lifted out of any member's subtree.
    fn group_placement(
        &self,
        group: &NewGroup,
        member_nodes: &[NodeId],
    ) -> Result<Placement, TreeError> {
        if let Some(parent_id) = group.parent_id {
            let parent = self.require_node(parent_id)?;
            if parent.window_id != group.window_id {
                return Err(TreeError::TabNotInWindow {
                    tab_id: parent.tab_id,
                    window_id: group.window_id,
                });
            }
            if let Some(member) = member_nodes
                .iter()
                .find(|m| self.is_same_or_descendant(parent_id, **m))
            {
                return Err(TreeError::Cycle {
                    node_id: *member,
                    new_parent_id: parent_id,
                });
            }
            return Ok(Placement {
                parent_id: Some(parent_id),
                window_id: parent.window_id,
                view_index: parent.view_index,
                index: None,
            });
        }

        let Some(first) = member_nodes.first() else {
            let window = self
                .windows
                .get(&group.window_id)
                .ok_or(TreeError::WindowNotFound(group.window_id))?;
            return Ok(Placement {
                parent_id: None,
                window_id: group.window_id,
                view_index: window.active_view_index,
                index: None,
            });
        };

        // Climb until the anchor's parent is outside every member subtree
        let mut anchor = self.require_node(*first)?;
        while let Some(parent_id) = anchor.parent_id {
            let inside_member = member_nodes
                .iter()
                .any(|m| self.is_same_or_descendant(parent_id, *m));
            if !inside_member {
                break;
            }
            anchor = self.require_node(parent_id)?;
        }

        let siblings = match anchor.parent_id {
            Some(parent_id) => &self.require_node(parent_id)?.children,
            None => &self.get_view(anchor.window_id, anchor.view_index)?.root_nodes,
        };
        let index = siblings.iter().position(|id| *id == anchor.id);

        Ok(Placement {
            parent_id: anchor.parent_id,
            window_id: anchor.window_id,
            view_index: anchor.view_index,
            index,
        })
    }
}
