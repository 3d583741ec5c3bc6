//! Window bookkeeping, cross-window relocation and per-tab metadata.

use super::{Placement, TreeStateStore};
use crate::error::TreeError;
use crate::tree::types::WindowState;
use std::collections::HashSet;
use tab_tree_config::{NodeId, TabId, WindowId};

impl TreeStateStore {
    /// Get the window state, creating it with one default view when unknown
    pub fn ensure_window(&mut self, window_id: WindowId) -> &mut WindowState {
        if !self.windows.contains_key(&window_id) {
            log::debug!("Tracking new window {}", window_id);
            self.touch();
        }
        let template = &self.view_template;
        self.windows
            .entry(window_id)
            .or_insert_with(|| WindowState::new(window_id, template.build()))
    }

    /// Drop a window and every node still in it. Returns the removed tab ids.
    pub fn remove_window(&mut self, window_id: WindowId) -> Vec<TabId> {
        let removed = self.tabs_in_window(window_id);
        if self.windows.remove(&window_id).is_none() {
            return removed;
        }

        for tab_id in &removed {
            if let Some(node_id) = self.tab_index.remove(tab_id) {
                self.nodes.remove(&node_id);
            }
            self.metadata.forget(*tab_id);
        }

        self.touch();
        log::info!(
            "Removed window {} with {} remaining tabs",
            window_id,
            removed.len()
        );
        removed
    }

    /// Drop window states that are not live and hold no nodes.
    /// Returns the dropped window ids.
    pub fn prune_windows(&mut self, live_windows: &HashSet<WindowId>) -> Vec<WindowId> {
        let dead: Vec<WindowId> = self
            .windows
            .values()
            .filter(|w| !live_windows.contains(&w.window_id) && w.root_count() == 0)
            .map(|w| w.window_id)
            .collect();
        for window_id in &dead {
            self.windows.remove(window_id);
        }
        if !dead.is_empty() {
            self.touch();
        }
        dead
    }

    /// A single tab now lives in `window_id` (host attach event).
    ///
    /// The tab's children stay behind, promoted in its old position, and the
    /// tab becomes a root of the target window's active view. Returns
    /// `Ok(false)` when the tab already lives in that window.
    pub fn relocate_tab_to_window(
        &mut self,
        tab_id: TabId,
        window_id: WindowId,
        index: Option<usize>,
    ) -> Result<bool, TreeError> {
        let node = self.require_tab(tab_id)?;
        if node.window_id == window_id {
            return Ok(false);
        }
        let node_id = node.id;
        let old = Placement {
            parent_id: node.parent_id,
            window_id: node.window_id,
            view_index: node.view_index,
            index: None,
        };

        let position = self.detach(node_id)?;
        let children = self
            .nodes
            .get_mut(&node_id)
            .map(|n| std::mem::take(&mut n.children))
            .unwrap_or_default();
        for (offset, child) in children.iter().enumerate() {
            self.attach(
                *child,
                Placement {
                    index: Some(position + offset),
                    ..old
                },
            )?;
        }

        let view_index = self.ensure_window(window_id).active_view_index;
        self.attach(
            node_id,
            Placement {
                parent_id: None,
                window_id,
                view_index,
                index,
            },
        )?;

        let was_pinned = self
            .windows
            .get_mut(&old.window_id)
            .is_some_and(|w| w.pinned_tab_ids.remove(&tab_id));
        if was_pinned {
            self.ensure_window(window_id).pinned_tab_ids.insert(tab_id);
        }

        self.touch();
        crate::debug_info!(
            "TREE",
            "Tab {} relocated from window {} to window {}",
            tab_id,
            old.window_id,
            window_id
        );
        Ok(true)
    }

    /// Move a whole subtree to the roots of `window_id`'s active view.
    pub fn move_subtree_to_window(
        &mut self,
        node_id: NodeId,
        window_id: WindowId,
        index: Option<usize>,
    ) -> Result<(), TreeError> {
        let source_window = self.require_node(node_id)?.window_id;
        let view_index = self.ensure_window(window_id).active_view_index;
        self.reattach(
            node_id,
            Placement {
                parent_id: None,
                window_id,
                view_index,
                index,
            },
        )?;

        // Pinned flags travel with their tabs
        let moved: Vec<TabId> = self
            .subtree_node_ids(node_id)
            .into_iter()
            .filter_map(|id| self.nodes.get(&id).map(|n| n.tab_id))
            .collect();
        if source_window != window_id {
            let mut carried = Vec::new();
            if let Some(source) = self.windows.get_mut(&source_window) {
                carried.extend(
                    moved
                        .iter()
                        .copied()
                        .filter(|t| source.pinned_tab_ids.remove(t)),
                );
            }
            if let Some(target) = self.windows.get_mut(&window_id) {
                target.pinned_tab_ids.extend(carried);
            }
        }

        self.touch();
        log::info!(
            "Moved subtree of node {} ({} tabs) from window {} to window {}",
            node_id,
            moved.len(),
            source_window,
            window_id
        );
        Ok(())
    }

    // =========================================================================
    // Per-window flags
    // =========================================================================

    /// Returns whether anything changed
    pub fn set_pinned(&mut self, window_id: WindowId, tab_id: TabId, pinned: bool) -> bool {
        let Some(window) = self.windows.get_mut(&window_id) else {
            return false;
        };
        let changed = if pinned {
            window.pinned_tab_ids.insert(tab_id)
        } else {
            window.pinned_tab_ids.remove(&tab_id)
        };
        if changed {
            self.touch();
        }
        changed
    }

    pub fn set_active_tab(&mut self, window_id: WindowId, tab_id: TabId) {
        let window = self.ensure_window(window_id);
        if window.active_tab_id != Some(tab_id) {
            window.active_tab_id = Some(tab_id);
            self.touch();
        }
    }

    // =========================================================================
    // Side caches
    // =========================================================================

    /// Cache a title for a tab in the tree; unknown tabs are ignored
    pub fn set_title(&mut self, tab_id: TabId, title: impl Into<String>) -> bool {
        if !self.contains_tab(tab_id) {
            return false;
        }
        let title = title.into();
        if self.metadata.titles.get(&tab_id) == Some(&title) {
            return false;
        }
        self.metadata.titles.insert(tab_id, title);
        self.touch();
        true
    }

    /// Cache a favicon URL for a tab in the tree; unknown tabs are ignored
    pub fn set_favicon(&mut self, tab_id: TabId, url: impl Into<String>) -> bool {
        if !self.contains_tab(tab_id) {
            return false;
        }
        let url = url.into();
        if self.metadata.favicons.get(&tab_id) == Some(&url) {
            return false;
        }
        self.metadata.favicons.insert(tab_id, url);
        self.touch();
        true
    }

    pub fn set_discarded(&mut self, tab_id: TabId, discarded: bool) -> bool {
        if !self.contains_tab(tab_id) {
            return false;
        }
        let changed = if discarded {
            self.metadata.discarded.insert(tab_id)
        } else {
            self.metadata.discarded.remove(&tab_id)
        };
        if changed {
            self.touch();
        }
        changed
    }

    /// Drop cache entries and pinned flags for tabs the tree no longer holds
    pub fn prune_side_caches(&mut self) -> usize {
        let index = &self.tab_index;
        let before = self.metadata.titles.len()
            + self.metadata.favicons.len()
            + self.metadata.discarded.len();
        self.metadata.titles.retain(|tab, _| index.contains_key(tab));
        self.metadata.favicons.retain(|tab, _| index.contains_key(tab));
        self.metadata.discarded.retain(|tab| index.contains_key(tab));
        let after = self.metadata.titles.len()
            + self.metadata.favicons.len()
            + self.metadata.discarded.len();

        let mut pruned = before - after;
        for window in self.windows.values_mut() {
            let pinned_before = window.pinned_tab_ids.len();
            window.pinned_tab_ids.retain(|tab| index.contains_key(tab));
            pruned += pinned_before - window.pinned_tab_ids.len();
            if window.active_tab_id.is_some_and(|tab| !index.contains_key(&tab)) {
                window.active_tab_id = None;
            }
        }
        if pruned > 0 {
            self.touch();
        }
        pruned
    }
}

#[cfg(test)]
mod tests {
    use crate::error::TreeError;
    use crate::tree::TreeStateStore;
    use std::collections::HashSet;

    #[test]
    fn test_ensure_window_creates_default_view() {
        let mut store = TreeStateStore::default();
        let window = store.ensure_window(4);
        assert_eq!(window.views.len(), 1);
        assert_eq!(window.views[0].name, "Default");
        assert_eq!(window.active_view_index, 0);
        assert_eq!(store.revision(), 1);

        store.ensure_window(4);
        assert_eq!(store.revision(), 1);
    }

    #[test]
    fn test_remove_window_drops_its_nodes_only() {
        let mut store = TreeStateStore::default();
        let a = store.add_node(1, 1, None).unwrap();
        store.add_node(2, 1, Some(a)).unwrap();
        store.add_node(3, 2, None).unwrap();
        store.set_title(2, "child");

        let mut removed = store.remove_window(1);
        removed.sort();
        assert_eq!(removed, vec![1, 2]);
        assert!(store.window(1).is_none());
        assert!(store.contains_tab(3));
        assert!(store.title(2).is_none());
        store.validate().unwrap();
    }

    #[test]
    fn test_relocate_tab_leaves_children_behind() {
        let mut store = TreeStateStore::default();
        let p = store.add_node(1, 1, None).unwrap();
        store.add_node(2, 1, Some(p)).unwrap();
        store.add_node(3, 1, Some(p)).unwrap();
        store.set_pinned(1, 1, true);

        assert!(store.relocate_tab_to_window(1, 9, None).unwrap());

        assert_eq!(store.root_tab_ids(1, 0), vec![2, 3]);
        assert_eq!(store.root_tab_ids(9, 0), vec![1]);
        assert!(store.child_tab_ids(1).is_empty());
        assert!(store.window(9).unwrap().pinned_tab_ids.contains(&1));
        assert!(store.window(1).unwrap().pinned_tab_ids.is_empty());
        store.validate().unwrap();

        // Already there
        assert!(!store.relocate_tab_to_window(1, 9, None).unwrap());
    }

    #[test]
    fn test_move_subtree_to_window_keeps_structure() {
        let mut store = TreeStateStore::default();
        store.add_node(10, 1, None).unwrap();
        let p = store.add_node(1, 1, None).unwrap();
        let c = store.add_node(2, 1, Some(p)).unwrap();
        store.add_node(3, 1, Some(c)).unwrap();
        store.add_node(4, 2, None).unwrap();

        store.move_subtree_to_window(p, 2, Some(0)).unwrap();

        assert_eq!(store.root_tab_ids(2, 0), vec![1, 4]);
        assert_eq!(store.root_tab_ids(1, 0), vec![10]);
        assert_eq!(store.subtree_tab_ids(1), vec![1, 2, 3]);
        assert_eq!(store.depth_of(3), Some(2));
        for tab in [1, 2, 3] {
            assert_eq!(store.node_by_tab(tab).unwrap().window_id, 2);
        }
        store.validate().unwrap();
    }

    #[test]
    fn test_relocate_unknown_tab() {
        let mut store = TreeStateStore::default();
        assert_eq!(
            store.relocate_tab_to_window(5, 1, None).unwrap_err(),
            TreeError::TabNotFound(5)
        );
    }

    #[test]
    fn test_prune_windows_keeps_live_or_populated() {
        let mut store = TreeStateStore::default();
        store.ensure_window(1);
        store.ensure_window(2);
        store.add_node(7, 3, None).unwrap();

        let live: HashSet<u64> = [2].into_iter().collect();
        assert_eq!(store.prune_windows(&live), vec![1]);
        assert_eq!(store.window_ids(), vec![2, 3]);
    }

    #[test]
    fn test_metadata_setters_ignore_unknown_tabs() {
        let mut store = TreeStateStore::default();
        store.add_node(1, 1, None).unwrap();

        assert!(store.set_title(1, "a"));
        assert!(!store.set_title(1, "a"));
        assert!(!store.set_title(2, "b"));
        assert!(store.set_discarded(1, true));
        assert!(store.is_discarded(1));
        assert!(!store.set_favicon(2, "x"));
        assert!(store.title(2).is_none());
    }

    #[test]
    fn test_prune_side_caches() {
        let mut store = TreeStateStore::default();
        store.add_node(1, 1, None).unwrap();
        store.metadata.titles.insert(2, "gone".into());
        store.metadata.favicons.insert(2, "gone.ico".into());
        store.set_title(1, "kept");

        assert_eq!(store.prune_side_caches(), 2);
        assert_eq!(store.title(1), Some("kept"));
        assert!(store.favicon(2).is_none());
    }
}
