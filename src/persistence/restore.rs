//! Rebuild the live tree from persisted state

use super::{PersistedNode, PersistedTree};
use crate::tree::{TreeStateStore, View, ViewTemplate, ViewUpdate};
use std::collections::BTreeMap;
use tab_tree_config::{GroupInfo, NodeId, TabId, WindowId};

/// Build a store from a decoded tree blob and its side maps.
///
/// Entries that would break the tree (a tab id seen twice) are skipped with a
/// warning rather than failing the whole load. Cache entries for tabs absent
/// from the tree are dropped.
pub fn restore(
    tree: &PersistedTree,
    titles: &BTreeMap<TabId, String>,
    favicons: &BTreeMap<TabId, String>,
    template: ViewTemplate,
) -> TreeStateStore {
    let mut store = TreeStateStore::new(template);

    for window in &tree.windows {
        let window_id = window.window_id;
        store.ensure_window(window_id);

        for (view_index, view) in window.views.iter().enumerate() {
            let result = if view_index == 0 {
                store.update_view(
                    window_id,
                    0,
                    ViewUpdate {
                        name: Some(view.name.clone()),
                        color: Some(view.color.clone()),
                        icon: Some(view.icon.clone()),
                    },
                )
            } else {
                let mut restored = View::new(view.name.clone(), view.color.clone());
                restored.icon = view.icon.clone();
                store.add_view(window_id, restored).map(|_| ())
            };
            if let Err(e) = result {
                log::warn!("Skipping view {} of window {}: {}", view_index, window_id, e);
                continue;
            }

            for root in &view.root_nodes {
                restore_subtree(&mut store, window_id, view_index, root);
            }
        }

        let view_count = store.window(window_id).map(|w| w.views.len()).unwrap_or(1);
        let active = window.active_view_index.min(view_count.saturating_sub(1));
        if let Err(e) = store.switch_view(window_id, active) {
            log::warn!("Could not restore active view of window {}: {}", window_id, e);
        }

        for tab_id in &window.pinned_tab_ids {
            if store.contains_tab(*tab_id) {
                store.set_pinned(window_id, *tab_id, true);
            }
        }
    }

    for (tab_id, title) in titles {
        store.set_title(*tab_id, title.clone());
    }
    for (tab_id, url) in favicons {
        store.set_favicon(*tab_id, url.clone());
    }

    log::info!(
        "Restored {} tabs in {} windows",
        store.len(),
        store.window_ids().len()
    );
    store
}

fn restore_subtree(
    store: &mut TreeStateStore,
    window_id: WindowId,
    view_index: usize,
    root: &PersistedNode,
) {
    // Pre-order, children appended in order
    let mut stack: Vec<(Option<NodeId>, &PersistedNode)> = vec![(None, root)];
    while let Some((parent_id, entry)) = stack.pop() {
        let added = match parent_id {
            Some(parent_id) => store.add_node(entry.tab_id(), window_id, Some(parent_id)),
            None => store.add_root_to_view(entry.tab_id(), window_id, view_index),
        };
        let node_id = match added {
            Ok(id) => id,
            Err(e) => {
                log::warn!(
                    "Skipping persisted tab {} and its subtree: {}",
                    entry.tab_id(),
                    e
                );
                continue;
            }
        };

        if let PersistedNode::Group(group) = entry
            && let Some(node) = store.nodes.get_mut(&node_id)
        {
            node.group_info = Some(GroupInfo::new(group.name.clone(), group.color.clone()));
        }
        if !entry.is_expanded() {
            let _ = store.set_expanded(node_id, false);
        }

        for child in entry.children().iter().rev() {
            stack.push((Some(node_id), child));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::capture::capture;
    use crate::persistence::schema::decode_tree;
    use crate::tree::NewGroup;
    use serde_json::json;

    #[test]
    fn test_capture_restore_preserves_structure() {
        let mut store = TreeStateStore::default();
        let a = store.add_node(1, 1, None).unwrap();
        let b = store.add_node(2, 1, Some(a)).unwrap();
        store.add_node(3, 1, Some(b)).unwrap();
        store.add_node(4, 1, Some(a)).unwrap();
        store.add_view(1, View::new("Side", "#0f0")).unwrap();
        store.switch_view(1, 1).unwrap();
        store.add_node(5, 1, None).unwrap();
        store
            .create_group(NewGroup {
                group_tab_id: 50,
                window_id: 1,
                info: GroupInfo::new("G", "#123"),
                member_tab_ids: vec![5],
                parent_id: None,
            })
            .unwrap();
        store.set_expanded(b, false).unwrap();
        store.add_node(6, 2, None).unwrap();
        store.set_pinned(2, 6, true);
        store.set_title(3, "three");
        store.set_favicon(6, "six.ico");

        let snapshot = capture(&store);
        let restored = restore(
            &snapshot.tree,
            &snapshot.titles,
            &snapshot.favicons,
            ViewTemplate::default(),
        );

        restored.validate().unwrap();
        assert_eq!(restored.len(), store.len());
        assert_eq!(restored.subtree_tab_ids(1), vec![1, 2, 3, 4]);
        assert_eq!(restored.depth_of(3), Some(2));
        assert!(!restored.node_by_tab(2).unwrap().is_expanded);
        assert_eq!(restored.root_tab_ids(1, 1), vec![50]);
        assert!(restored.node_by_tab(50).unwrap().is_group());
        assert_eq!(restored.window(1).unwrap().active_view_index, 1);
        assert_eq!(restored.get_view(1, 1).unwrap().name, "Side");
        assert!(restored.window(2).unwrap().pinned_tab_ids.contains(&6));
        assert_eq!(restored.title(3), Some("three"));
        assert_eq!(restored.favicon(6), Some("six.ico"));
        assert_eq!(capture(&restored), snapshot);
    }

    #[test]
    fn test_duplicate_tab_entries_are_skipped() {
        let decoded = decode_tree(json!({
            "schemaVersion": 2,
            "windows": [{
                "windowId": 1,
                "views": [{"name": "A", "color": "#000", "rootNodes": [
                    {"kind": "tab", "tabId": 1, "children": [{"kind": "tab", "tabId": 2}]},
                    {"kind": "tab", "tabId": 1, "children": [{"kind": "tab", "tabId": 3}]}
                ]}]
            }]
        }))
        .unwrap();

        let store = restore(
            &decoded.tree,
            &BTreeMap::new(),
            &BTreeMap::new(),
            ViewTemplate::default(),
        );

        store.validate().unwrap();
        assert_eq!(store.root_tab_ids(1, 0), vec![1]);
        assert!(!store.contains_tab(3));
    }

    #[test]
    fn test_orphan_cache_entries_dropped() {
        let tree = PersistedTree::default();
        let titles: BTreeMap<TabId, String> = [(9, "orphan".to_string())].into_iter().collect();
        let store = restore(&tree, &titles, &BTreeMap::new(), ViewTemplate::default());
        assert!(store.title(9).is_none());
    }

    #[test]
    fn test_active_view_clamped() {
        let decoded = decode_tree(json!({
            "schemaVersion": 2,
            "windows": [{
                "windowId": 4,
                "views": [{"name": "Only", "color": "#000"}],
                "activeViewIndex": 7
            }]
        }))
        .unwrap();
        let store = restore(
            &decoded.tree,
            &BTreeMap::new(),
            &BTreeMap::new(),
            ViewTemplate::default(),
        );
        assert_eq!(store.window(4).unwrap().active_view_index, 0);
        assert_eq!(store.get_view(4, 0).unwrap().name, "Only");
    }
}
