//! Ghost cleanup: prune tree entries whose tab no longer exists.
//!
//! [`reconcile`] is a pure function over a tree snapshot. The engine runs it
//! at startup, on a `RECONCILE` request and on the optional periodic timer,
//! then swaps the result in.

use crate::tree::TreeStateStore;
use serde::Serialize;
use std::collections::HashSet;
use tab_tree_config::{TabId, WindowId};

/// Result of one reconciliation pass
#[derive(Debug, Clone)]
pub struct Reconciliation {
    pub tree: TreeStateStore,
    /// Ghost tab ids that were dropped, ascending
    pub removed_tab_ids: Vec<TabId>,
}

/// What a reconciliation run changed, as reported to callers
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileReport {
    pub removed_tab_ids: Vec<TabId>,
    pub pruned_window_ids: Vec<WindowId>,
}

impl ReconcileReport {
    pub fn is_empty(&self) -> bool {
        self.removed_tab_ids.is_empty() && self.pruned_window_ids.is_empty()
    }
}

/// Drop every node whose tab is not in `live_tab_ids`.
///
/// A ghost's live descendants are promoted exactly as `remove_node` promotes
/// children; its ghost descendants go too. Title/favicon/pinned entries for
/// removed tabs are pruned with them. Running it twice with the same live set
/// changes nothing the second time. Discarded tabs must be part of
/// `live_tab_ids`.
pub fn reconcile(live_tab_ids: &HashSet<TabId>, tree: &TreeStateStore) -> Reconciliation {
    let mut removed_tab_ids: Vec<TabId> = tree
        .tab_ids()
        .filter(|tab| !live_tab_ids.contains(tab))
        .collect();
    removed_tab_ids.sort_unstable();

    if removed_tab_ids.is_empty() {
        let mut tree = tree.clone();
        tree.prune_side_caches();
        return Reconciliation {
            tree,
            removed_tab_ids,
        };
    }

    let mut pruned = tree.clone();
    for tab_id in &removed_tab_ids {
        if let Err(e) = pruned.remove_node(*tab_id) {
            // Only possible if the tree was already inconsistent
            log::error!("Reconcile could not remove ghost tab {}: {}", tab_id, e);
        }
    }
    pruned.prune_side_caches();

    log::info!(
        "Reconciled tree: removed {} ghost tabs {:?}",
        removed_tab_ids.len(),
        removed_tab_ids
    );
    Reconciliation {
        tree: pruned,
        removed_tab_ids,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn live(ids: &[TabId]) -> HashSet<TabId> {
        ids.iter().copied().collect()
    }

    #[test]
    fn test_ghost_removed_everything_else_intact() {
        let mut tree = TreeStateStore::default();
        let a = tree.add_node(1, 1, None).unwrap();
        tree.add_node(2, 1, Some(a)).unwrap();
        tree.add_node(99999, 1, None).unwrap();
        tree.add_node(3, 1, None).unwrap();
        tree.set_title(99999, "ghost");
        tree.set_title(1, "real");

        let result = reconcile(&live(&[1, 2, 3]), &tree);

        assert_eq!(result.removed_tab_ids, vec![99999]);
        let pruned = &result.tree;
        assert!(!pruned.contains_tab(99999));
        assert!(pruned.title(99999).is_none());
        assert_eq!(pruned.root_tab_ids(1, 0), vec![1, 3]);
        assert!(pruned.is_child_of(2, 1));
        assert_eq!(pruned.title(1), Some("real"));
        pruned.validate().unwrap();

        // Input untouched
        assert!(tree.contains_tab(99999));
    }

    #[test]
    fn test_live_descendants_of_ghosts_are_promoted() {
        // 1 -> ghost 50 -> [2, ghost 51 -> 3]
        let mut tree = TreeStateStore::default();
        let one = tree.add_node(1, 1, None).unwrap();
        let ghost = tree.add_node(50, 1, Some(one)).unwrap();
        tree.add_node(2, 1, Some(ghost)).unwrap();
        let ghost2 = tree.add_node(51, 1, Some(ghost)).unwrap();
        tree.add_node(3, 1, Some(ghost2)).unwrap();

        let result = reconcile(&live(&[1, 2, 3]), &tree);

        assert_eq!(result.removed_tab_ids, vec![50, 51]);
        assert_eq!(result.tree.child_tab_ids(1), vec![2, 3]);
        assert_eq!(result.tree.depth_of(3), Some(1));
        result.tree.validate().unwrap();
    }

    #[test]
    fn test_reconcile_is_idempotent() {
        let mut tree = TreeStateStore::default();
        let root = tree.add_node(7, 1, None).unwrap();
        tree.add_node(8, 1, Some(root)).unwrap();
        tree.add_node(9, 1, None).unwrap();

        let live = live(&[8, 9]);
        let once = reconcile(&live, &tree);
        let twice = reconcile(&live, &once.tree);

        assert!(twice.removed_tab_ids.is_empty());
        assert_eq!(twice.tree.root_tab_ids(1, 0), once.tree.root_tab_ids(1, 0));
        assert_eq!(twice.tree.revision(), once.tree.revision());
        for tab in twice.tree.tab_ids() {
            assert!(live.contains(&tab));
        }
    }

    #[test]
    fn test_empty_live_set_empties_tree() {
        let mut tree = TreeStateStore::default();
        tree.add_node(1, 1, None).unwrap();
        tree.add_node(2, 2, None).unwrap();

        let result = reconcile(&HashSet::new(), &tree);
        assert!(result.tree.is_empty());
        assert_eq!(result.removed_tab_ids, vec![1, 2]);
        result.tree.validate().unwrap();
    }

    #[test]
    fn test_report_is_empty() {
        assert!(ReconcileReport::default().is_empty());
        let report = ReconcileReport {
            removed_tab_ids: vec![1],
            pruned_window_ids: vec![],
        };
        assert!(!report.is_empty());
    }
}
