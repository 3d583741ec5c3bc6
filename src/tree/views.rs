//! View partitioning of a window's tree.
//!
//! Every window owns an ordered list of views with exactly one active index.
//! Switching views only changes that index; moving a tab between views
//! relocates its whole subtree into the target view's roots.

use super::store::Placement;
use super::types::View;
use super::TreeStateStore;
use crate::error::TreeError;
use tab_tree_config::{NodeId, TabId, WindowId};

/// Partial update for a view; `None` fields are left alone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ViewUpdate {
    pub name: Option<String>,
    pub color: Option<String>,
    /// `Some(None)` clears the icon
    pub icon: Option<Option<String>>,
}

impl TreeStateStore {
    /// Append a view to a window. Returns its index.
    pub fn add_view(&mut self, window_id: WindowId, view: View) -> Result<usize, TreeError> {
        let window = self
            .windows
            .get_mut(&window_id)
            .ok_or(TreeError::WindowNotFound(window_id))?;
        // Nodes are only ever placed through the store
        window.views.push(View {
            root_nodes: Vec::new(),
            ..view
        });
        let index = window.views.len() - 1;
        self.touch();
        log::info!("Added view {} to window {}", index, window_id);
        Ok(index)
    }

    /// Remove a view; its trees move to the end of view 0.
    ///
    /// A window always keeps at least one view.
    pub fn remove_view(&mut self, window_id: WindowId, view_index: usize) -> Result<View, TreeError> {
        let window = self
            .windows
            .get_mut(&window_id)
            .ok_or(TreeError::WindowNotFound(window_id))?;
        if view_index >= window.views.len() {
            return Err(TreeError::ViewNotFound {
                window_id,
                view_index,
            });
        }
        if window.views.len() == 1 {
            return Err(TreeError::LastView(window_id));
        }

        let removed = window.views.remove(view_index);
        if window.active_view_index == view_index {
            window.active_view_index = 0;
        } else if window.active_view_index > view_index {
            window.active_view_index -= 1;
        }
        window.views[0]
            .root_nodes
            .extend(removed.root_nodes.iter().copied());

        // View indices after the removed one shifted down; retag everything
        let roots: Vec<(usize, NodeId)> = window
            .views
            .iter()
            .enumerate()
            .flat_map(|(i, view)| view.root_nodes.iter().map(move |root| (i, *root)))
            .collect();
        for (index, root) in roots {
            self.relocate_subtree(root, 0, window_id, index);
        }

        self.touch();
        log::info!(
            "Removed view {} ('{}') from window {}, {} trees moved to view 0",
            view_index,
            removed.name,
            window_id,
            removed.root_nodes.len()
        );
        Ok(removed)
    }

    pub fn update_view(
        &mut self,
        window_id: WindowId,
        view_index: usize,
        update: ViewUpdate,
    ) -> Result<(), TreeError> {
        let view = self.view_mut(window_id, view_index)?;
        if let Some(name) = update.name {
            view.name = name;
        }
        if let Some(color) = update.color {
            view.color = color;
        }
        if let Some(icon) = update.icon {
            view.icon = icon;
        }
        self.touch();
        Ok(())
    }

    /// Make `view_index` the active view. No node is touched.
    pub fn switch_view(&mut self, window_id: WindowId, view_index: usize) -> Result<(), TreeError> {
        self.get_view(window_id, view_index)?;
        if let Some(window) = self.windows.get_mut(&window_id) {
            if window.active_view_index != view_index {
                window.active_view_index = view_index;
                self.touch();
            }
        }
        Ok(())
    }

    /// `moveTabToView(tabId, windowId, viewIndex)`: move a tab's subtree to
    /// the roots of another view of the same window, at `index` (or the end).
    pub fn move_tab_to_view(
        &mut self,
        tab_id: TabId,
        window_id: WindowId,
        view_index: usize,
        index: Option<usize>,
    ) -> Result<(), TreeError> {
        let node = self.require_tab(tab_id)?;
        if node.window_id != window_id {
            return Err(TreeError::TabNotInWindow { tab_id, window_id });
        }
        let node_id = node.id;
        self.get_view(window_id, view_index)?;

        self.reattach(
            node_id,
            Placement {
                parent_id: None,
                window_id,
                view_index,
                index,
            },
        )?;
        self.touch();
        crate::debug_log!(
            "TREE",
            "Tab {} moved to view {} of window {}",
            tab_id,
            view_index,
            window_id
        );
        Ok(())
    }

    /// Append a root node for `tab_id` to a specific view, active or not
    pub fn add_root_to_view(
        &mut self,
        tab_id: TabId,
        window_id: WindowId,
        view_index: usize,
    ) -> Result<NodeId, TreeError> {
        self.get_view(window_id, view_index)?;
        self.insert_at(
            tab_id,
            Placement {
                parent_id: None,
                window_id,
                view_index,
                index: None,
            },
        )
    }

    fn view_mut(&mut self, window_id: WindowId, view_index: usize) -> Result<&mut View, TreeError> {
        self.windows
            .get_mut(&window_id)
            .ok_or(TreeError::WindowNotFound(window_id))?
            .views
            .get_mut(view_index)
            .ok_or(TreeError::ViewNotFound {
                window_id,
                view_index,
            })
    }
}
