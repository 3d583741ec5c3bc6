//! Nested, render-ready view of the tree returned by `GET_STATE`.

use crate::drag::DragSession;
use crate::tree::TreeStateStore;
use serde::Serialize;
use tab_tree_config::{GroupInfo, NodeId, TabId, WindowId};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StateSnapshot {
    pub revision: u64,
    pub windows: Vec<WindowSnapshot>,
    pub drag_session: Option<DragSession>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WindowSnapshot {
    pub window_id: WindowId,
    pub active_view_index: usize,
    pub pinned_tab_ids: Vec<TabId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active_tab_id: Option<TabId>,
    pub views: Vec<ViewSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewSnapshot {
    pub name: String,
    pub color: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    pub root_nodes: Vec<NodeSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeSnapshot {
    pub node_id: NodeId,
    pub tab_id: TabId,
    pub depth: usize,
    pub is_expanded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_info: Option<GroupInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fav_icon_url: Option<String>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub discarded: bool,
    pub children: Vec<NodeSnapshot>,
}

impl StateSnapshot {
    pub fn capture(store: &TreeStateStore, drag_session: Option<&DragSession>) -> Self {
        Self {
            revision: store.revision(),
            windows: store
                .windows()
                .map(|window| WindowSnapshot {
                    window_id: window.window_id,
                    active_view_index: window.active_view_index,
                    pinned_tab_ids: window.pinned_tab_ids.iter().copied().collect(),
                    active_tab_id: window.active_tab_id,
                    views: window
                        .views
                        .iter()
                        .map(|view| ViewSnapshot {
                            name: view.name.clone(),
                            color: view.color.clone(),
                            icon: view.icon.clone(),
                            root_nodes: view
                                .root_nodes
                                .iter()
                                .filter_map(|id| node_snapshot(store, *id))
                                .collect(),
                        })
                        .collect(),
                })
                .collect(),
            drag_session: drag_session.cloned(),
        }
    }

    /// Total nodes across every window
    pub fn node_count(&self) -> usize {
        fn count(nodes: &[NodeSnapshot]) -> usize {
            nodes.iter().map(|n| 1 + count(&n.children)).sum()
        }
        self.windows
            .iter()
            .flat_map(|w| &w.views)
            .map(|v| count(&v.root_nodes))
            .sum()
    }
}

fn node_snapshot(store: &TreeStateStore, node_id: NodeId) -> Option<NodeSnapshot> {
    let node = store.node(node_id)?;
    Some(NodeSnapshot {
        node_id,
        tab_id: node.tab_id,
        depth: node.depth,
        is_expanded: node.is_expanded,
        group_info: node.group_info.clone(),
        title: store.title(node.tab_id).map(str::to_string),
        fav_icon_url: store.favicon(node.tab_id).map(str::to_string),
        discarded: store.is_discarded(node.tab_id),
        children: node
            .children
            .iter()
            .filter_map(|child| node_snapshot(store, *child))
            .collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_nests_children_with_metadata() {
        let mut store = TreeStateStore::default();
        let p = store.add_node(1, 1, None).unwrap();
        store.add_node(2, 1, Some(p)).unwrap();
        store.set_title(2, "Child");
        store.set_discarded(2, true);

        let snapshot = StateSnapshot::capture(&store, None);
        assert_eq!(snapshot.node_count(), 2);

        let json = serde_json::to_value(&snapshot).unwrap();
        let root = &json["windows"][0]["views"][0]["rootNodes"][0];
        assert_eq!(root["tabId"], 1);
        assert_eq!(root["nodeId"], p);
        assert!(root.get("discarded").is_none());
        let child = &root["children"][0];
        assert_eq!(child["depth"], 1);
        assert_eq!(child["title"], "Child");
        assert_eq!(child["discarded"], true);
        assert!(json["dragSession"].is_null());
    }
}
