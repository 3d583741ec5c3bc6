//! Capture persisted state from the live tree

use super::{
    PersistedGroup, PersistedNode, PersistedTab, PersistedTree, PersistedView, PersistedWindow,
    SCHEMA_VERSION,
};
use crate::tree::TreeStateStore;
use std::collections::{BTreeMap, HashMap};
use tab_tree_config::{NodeId, TabId};

/// Everything the gateway writes, one entry per storage key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub tree: PersistedTree,
    pub titles: BTreeMap<TabId, String>,
    pub favicons: BTreeMap<TabId, String>,
}

/// Capture the tree and its side caches
pub fn capture(store: &TreeStateStore) -> Snapshot {
    Snapshot {
        tree: capture_tree(store),
        titles: sorted(&store.metadata().titles),
        favicons: sorted(&store.metadata().favicons),
    }
}

/// Capture the tree blob alone
pub fn capture_tree(store: &TreeStateStore) -> PersistedTree {
    let windows = store
        .windows()
        .map(|window| PersistedWindow {
            window_id: window.window_id,
            views: window
                .views
                .iter()
                .map(|view| PersistedView {
                    name: view.name.clone(),
                    color: view.color.clone(),
                    icon: view.icon.clone(),
                    root_nodes: view
                        .root_nodes
                        .iter()
                        .filter_map(|id| capture_node(store, *id))
                        .collect(),
                })
                .collect(),
            active_view_index: window.active_view_index,
            pinned_tab_ids: window.pinned_tab_ids.iter().copied().collect(),
        })
        .collect();

    PersistedTree {
        schema_version: SCHEMA_VERSION,
        windows,
    }
}

fn capture_node(store: &TreeStateStore, node_id: NodeId) -> Option<PersistedNode> {
    let node = store.node(node_id)?;
    let children = node
        .children
        .iter()
        .filter_map(|child| capture_node(store, *child))
        .collect();

    Some(match &node.group_info {
        Some(info) => PersistedNode::Group(PersistedGroup {
            tab_id: node.tab_id,
            is_expanded: node.is_expanded,
            name: info.name.clone(),
            color: info.color.clone(),
            children,
        }),
        None => PersistedNode::Tab(PersistedTab {
            tab_id: node.tab_id,
            is_expanded: node.is_expanded,
            children,
        }),
    })
}

fn sorted(map: &HashMap<TabId, String>) -> BTreeMap<TabId, String> {
    map.iter().map(|(k, v)| (*k, v.clone())).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::NewGroup;
    use tab_tree_config::GroupInfo;

    #[test]
    fn test_capture_nested_tree_and_groups() {
        let mut store = TreeStateStore::default();
        let root = store.add_node(1, 1, None).unwrap();
        store.add_node(2, 1, Some(root)).unwrap();
        store.add_node(3, 1, None).unwrap();
        store
            .create_group(NewGroup {
                group_tab_id: 100,
                window_id: 1,
                info: GroupInfo::new("Later", "#333"),
                member_tab_ids: vec![3],
                parent_id: None,
            })
            .unwrap();
        store.set_expanded(root, false).unwrap();
        store.set_pinned(1, 1, true);
        store.set_title(2, "Child");

        let snapshot = capture(&store);

        assert_eq!(snapshot.tree.tab_count(), 4);
        let window = &snapshot.tree.windows[0];
        assert_eq!(window.pinned_tab_ids, vec![1]);
        let roots = &window.views[0].root_nodes;
        assert_eq!(roots.len(), 2);
        assert!(!roots[0].is_expanded());
        assert_eq!(roots[0].children()[0].tab_id(), 2);
        assert!(matches!(&roots[1], PersistedNode::Group(g) if g.children[0].tab_id() == 3));
        assert_eq!(snapshot.titles.get(&2).map(String::as_str), Some("Child"));
        assert!(snapshot.favicons.is_empty());
    }
}
