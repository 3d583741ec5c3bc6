//! Dispatch of UI control requests.

use super::Engine;
use super::state::StateSnapshot;
use crate::drag::create_window_with_subtree;
use crate::error::{EngineError, HostError, TreeError};
use crate::protocol::{ControlRequest, ControlResponse};
use crate::tree::{NewGroup, View, ViewUpdate};
use serde_json::json;
use tab_tree_config::{GroupInfo, TabId};

impl Engine {
    /// Run one request. Never fails: errors become `{success: false}`.
    pub(super) async fn handle_control(&mut self, request: ControlRequest) -> ControlResponse {
        let name = request.name();
        crate::debug_log!("CONTROL", "{}", name);

        match self.dispatch(request).await {
            Ok(response) => response,
            Err(EngineError::Host(HostError::TabNotFound(tab_id))) => {
                self.drop_ghost(tab_id);
                log::info!("{} referenced closed tab {}", name, tab_id);
                ControlResponse::failure(TreeError::TabNotFound(tab_id).to_string())
            }
            Err(e) => {
                log::warn!("{} failed: {}", name, e);
                ControlResponse::failure(e.to_string())
            }
        }
    }

    /// The host no longer knows `tab_id`; forget it instead of reporting a
    /// stale reference
    fn drop_ghost(&mut self, tab_id: TabId) {
        if self.store.remove_node(tab_id).is_ok() {
            log::info!("Removed ghost tab {} from the tree", tab_id);
        }
    }

    async fn dispatch(&mut self, request: ControlRequest) -> Result<ControlResponse, EngineError> {
        match request {
            ControlRequest::StartDragSession {
                tab_id,
                window_id,
                tree_data,
            } => Ok(ControlResponse::ok_with(
                self.drag.start(tab_id, window_id, tree_data),
            )),

            ControlRequest::GetDragSession => Ok(ControlResponse::ok_with(&self.drag.get())),

            ControlRequest::BeginCrossWindowMove { target_window_id } => {
                let session = self
                    .drag
                    .begin_cross_window_move(&mut self.store, self.host.as_ref(), target_window_id)
                    .await?;
                Ok(ControlResponse::ok_with(&session))
            }

            ControlRequest::EndDragSession { reason } => {
                let ended = self.drag.end(&reason);
                Ok(ControlResponse::ok_with(&ended))
            }

            ControlRequest::CreateWindowWithSubtree {
                tab_id,
                source_window_id,
            } => {
                let moved = create_window_with_subtree(
                    &mut self.store,
                    self.host.as_ref(),
                    tab_id,
                    source_window_id,
                    self.settings.auto_close_empty_source_window,
                )
                .await?;
                Ok(ControlResponse::ok_with(&moved))
            }

            ControlRequest::UpdateTree {
                node_id,
                new_parent_id,
                index,
            } => {
                self.store.move_node(node_id, new_parent_id, index)?;
                Ok(ControlResponse::ok_empty())
            }

            ControlRequest::ActivateTab { tab_id } => {
                let window_id = self.store.require_tab(tab_id)?.window_id;
                self.host.activate_tab(tab_id).await?;
                self.store.set_active_tab(window_id, tab_id);
                Ok(ControlResponse::ok_empty())
            }

            ControlRequest::GetState => Ok(ControlResponse::ok_with(&StateSnapshot::capture(
                &self.store,
                self.drag.get(),
            ))),

            ControlRequest::SetExpanded { node_id, expanded } => {
                self.store.set_expanded(node_id, expanded)?;
                Ok(ControlResponse::ok_empty())
            }

            ControlRequest::MoveTabToView {
                tab_id,
                window_id,
                view_index,
                index,
            } => {
                self.store
                    .move_tab_to_view(tab_id, window_id, view_index, index)?;
                Ok(ControlResponse::ok_empty())
            }

            ControlRequest::SwitchView {
                window_id,
                view_index,
            } => {
                self.store.switch_view(window_id, view_index)?;
                Ok(ControlResponse::ok_empty())
            }

            ControlRequest::AddView {
                window_id,
                name,
                color,
                icon,
            } => {
                let view_index = self.store.add_view(
                    window_id,
                    View {
                        icon,
                        ..View::new(name, color)
                    },
                )?;
                Ok(ControlResponse::ok(json!({ "viewIndex": view_index })))
            }

            ControlRequest::RemoveView {
                window_id,
                view_index,
            } => {
                self.store.remove_view(window_id, view_index)?;
                Ok(ControlResponse::ok_empty())
            }

            ControlRequest::UpdateView {
                window_id,
                view_index,
                name,
                color,
                icon,
            } => {
                let icon = icon.map(|icon| Some(icon).filter(|i| !i.is_empty()));
                self.store
                    .update_view(window_id, view_index, ViewUpdate { name, color, icon })?;
                Ok(ControlResponse::ok_empty())
            }

            ControlRequest::CreateGroup {
                group_tab_id,
                window_id,
                name,
                color,
                member_tab_ids,
                parent_id,
            } => {
                // The backing tab usually arrived as a plain tab through the
                // host feed already; it becomes the group node
                let mut staged = self.store.clone();
                if staged.node_by_tab(group_tab_id).is_some_and(|n| !n.is_group()) {
                    staged.remove_node(group_tab_id)?;
                }
                let node_id = staged.create_group(NewGroup {
                    group_tab_id,
                    window_id,
                    info: GroupInfo::new(name, color),
                    member_tab_ids,
                    parent_id,
                })?;
                self.store = staged;
                Ok(ControlResponse::ok(json!({ "nodeId": node_id })))
            }

            ControlRequest::UpdateGroup {
                node_id,
                name,
                color,
            } => {
                self.store.update_group(node_id, name, color)?;
                Ok(ControlResponse::ok_empty())
            }

            ControlRequest::DeleteGroup { node_id } => {
                let removed = self
                    .store
                    .delete_group(node_id, self.settings.group_delete_policy)?;
                if let Err(e) = self.host.remove_tab(removed.tab_id).await {
                    log::warn!(
                        "Group node {} deleted but closing its tab {} failed: {}",
                        node_id,
                        removed.tab_id,
                        e
                    );
                }
                Ok(ControlResponse::ok_empty())
            }

            ControlRequest::Reconcile => {
                let report = self.run_reconcile().await?;
                Ok(ControlResponse::ok_with(&report))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{Engine, EngineSettings, RunningEngine};
    use crate::host::{HostFailure, InMemoryHost};
    use crate::persistence::MemoryStorage;
    use crate::protocol::DragEndReason;
    use std::sync::Arc;
    use tab_tree_config::GroupDeletePolicy;

    async fn start(host: &Arc<InMemoryHost>, settings: EngineSettings) -> RunningEngine {
        Engine::start(settings, host.clone(), Arc::new(MemoryStorage::new()))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_update_tree_cycle_is_reported() {
        let host = Arc::new(InMemoryHost::with_windows(&[2]));
        let engine = start(&host, EngineSettings::default()).await;
        let handle = &engine.handle;
        let store = handle.snapshot().await.unwrap();
        let a = store.node_id_for_tab(1).unwrap();
        let b = store.node_id_for_tab(2).unwrap();

        let ok = handle
            .request(ControlRequest::UpdateTree {
                node_id: b,
                new_parent_id: Some(a),
                index: 0,
            })
            .await
            .unwrap();
        assert!(ok.success);

        let cycle = handle
            .request(ControlRequest::UpdateTree {
                node_id: a,
                new_parent_id: Some(b),
                index: 0,
            })
            .await
            .unwrap();
        assert!(!cycle.success);
        assert!(cycle.error.unwrap().contains("cycle"));
        assert!(handle.snapshot().await.unwrap().is_child_of(2, 1));
    }

    #[tokio::test]
    async fn test_activate_ghost_is_cleaned_up() {
        let host = Arc::new(InMemoryHost::with_windows(&[2]));
        let engine = start(&host, EngineSettings::default()).await;
        // Closed in the host, but the event never reached the engine
        host.close_tab(2).unwrap();
        host.take_events();

        let response = engine
            .handle
            .request(ControlRequest::ActivateTab { tab_id: 2 })
            .await
            .unwrap();
        assert!(!response.success);
        assert!(!response.error.unwrap().contains("no longer exists"));
        assert!(!engine.handle.snapshot().await.unwrap().contains_tab(2));
    }

    #[tokio::test]
    async fn test_activate_tab_tracks_active() {
        let host = Arc::new(InMemoryHost::with_windows(&[2]));
        let engine = start(&host, EngineSettings::default()).await;
        let response = engine
            .handle
            .request(ControlRequest::ActivateTab { tab_id: 2 })
            .await
            .unwrap();
        assert!(response.success);
        assert_eq!(host.active_tab(1), Some(2));
        let store = engine.handle.snapshot().await.unwrap();
        assert_eq!(store.window(1).unwrap().active_tab_id, Some(2));
    }

    #[tokio::test]
    async fn test_cross_window_failure_keeps_session_state() {
        let host = Arc::new(InMemoryHost::with_windows(&[1, 1]));
        let engine = start(&host, EngineSettings::default()).await;
        let handle = &engine.handle;

        handle
            .request(ControlRequest::StartDragSession {
                tab_id: 1,
                window_id: 1,
                tree_data: json!({}),
            })
            .await
            .unwrap();
        host.fail(HostFailure::MoveTab(1));

        let response = handle
            .request(ControlRequest::BeginCrossWindowMove {
                target_window_id: 2,
            })
            .await
            .unwrap();
        assert!(!response.success);
        assert!(response.error.unwrap().starts_with("external API error"));

        let session = handle.request(ControlRequest::GetDragSession).await.unwrap();
        let data = session.data.unwrap();
        assert_eq!(data["state"], "dragging_local");
        assert_eq!(data["isLocked"], false);
        assert_eq!(data["currentWindowId"], 1);

        let store = handle.snapshot().await.unwrap();
        assert_eq!(store.node_by_tab(1).unwrap().window_id, 1);
    }

    #[tokio::test]
    async fn test_end_drag_without_session_returns_null() {
        let host = Arc::new(InMemoryHost::with_windows(&[1]));
        let engine = start(&host, EngineSettings::default()).await;
        let response = engine
            .handle
            .request(ControlRequest::EndDragSession {
                reason: DragEndReason::Completed,
            })
            .await
            .unwrap();
        assert!(response.success);
        assert_eq!(response.data, Some(serde_json::Value::Null));
    }

    #[tokio::test]
    async fn test_create_group_adopts_placeholder_tab() {
        let host = Arc::new(InMemoryHost::with_windows(&[2]));
        let engine = start(&host, EngineSettings::default()).await;
        let placeholder = host.open_tab(1).unwrap();
        engine.handle.send_events(host.take_events()).await.unwrap();

        let response = engine
            .handle
            .request(ControlRequest::CreateGroup {
                group_tab_id: placeholder,
                window_id: 1,
                name: "Work".into(),
                color: "#f00".into(),
                member_tab_ids: vec![1, 2],
                parent_id: None,
            })
            .await
            .unwrap();
        assert!(response.success, "{:?}", response.error);

        let store = engine.handle.snapshot().await.unwrap();
        let group = store.node_by_tab(placeholder).unwrap();
        assert!(group.is_group());
        assert_eq!(response.data.unwrap()["nodeId"], group.id);
        assert_eq!(store.child_tab_ids(placeholder), vec![1, 2]);
        store.validate().unwrap();
    }

    #[tokio::test]
    async fn test_delete_group_follows_policy() {
        let host = Arc::new(InMemoryHost::with_windows(&[2]));
        let group_tab = host.open_tab(1).unwrap();
        host.take_events();

        for (policy, expect_success) in [
            (GroupDeletePolicy::Reject, false),
            (GroupDeletePolicy::PromoteChildren, true),
        ] {
            let settings = EngineSettings {
                group_delete_policy: policy,
                ..EngineSettings::default()
            };
            let engine = start(&host, settings).await;
            let created = engine
                .handle
                .request(ControlRequest::CreateGroup {
                    group_tab_id: group_tab,
                    window_id: 1,
                    name: "G".into(),
                    color: "#000".into(),
                    member_tab_ids: vec![1],
                    parent_id: None,
                })
                .await
                .unwrap();
            let node_id = created.data.unwrap()["nodeId"].as_u64().unwrap();

            let deleted = engine
                .handle
                .request(ControlRequest::DeleteGroup { node_id })
                .await
                .unwrap();
            assert_eq!(deleted.success, expect_success);

            let store = engine.handle.snapshot().await.unwrap();
            assert!(store.contains_tab(1));
            assert_eq!(store.node_by_tab(group_tab).is_some(), !expect_success);
            engine.handle.shutdown().await.unwrap();
        }
        // The promoted run closed the backing tab in the host
        assert!(host.window_of(group_tab).is_none());
    }

    #[tokio::test]
    async fn test_views_through_requests() {
        let host = Arc::new(InMemoryHost::with_windows(&[2]));
        let engine = start(&host, EngineSettings::default()).await;
        let handle = &engine.handle;

        let missing = handle
            .request(ControlRequest::SwitchView {
                window_id: 1,
                view_index: 1,
            })
            .await
            .unwrap();
        assert!(!missing.success);

        let moved = handle
            .request(ControlRequest::MoveTabToView {
                tab_id: 2,
                window_id: 1,
                view_index: 0,
                index: Some(0),
            })
            .await
            .unwrap();
        assert!(moved.success);
        assert_eq!(handle.snapshot().await.unwrap().root_tab_ids(1, 0), vec![2, 1]);
    }

    #[tokio::test]
    async fn test_set_expanded_unknown_node_fails() {
        let host = Arc::new(InMemoryHost::with_windows(&[1]));
        let engine = start(&host, EngineSettings::default()).await;
        let response = engine
            .handle
            .request(ControlRequest::SetExpanded {
                node_id: 999,
                expanded: false,
            })
            .await
            .unwrap();
        assert!(!response.success);
        assert_eq!(response.error.as_deref(), Some("node 999 not found"));
    }

    #[tokio::test]
    async fn test_view_requests_manage_views() {
        let host = Arc::new(InMemoryHost::with_windows(&[2]));
        let engine = start(&host, EngineSettings::default()).await;
        let handle = &engine.handle;

        let added = handle
            .request(ControlRequest::AddView {
                window_id: 1,
                name: "Later".into(),
                color: "#999".into(),
                icon: Some("clock".into()),
            })
            .await
            .unwrap();
        assert!(added.success, "{:?}", added.error);
        assert_eq!(added.data.unwrap()["viewIndex"], 1);

        handle
            .request(ControlRequest::MoveTabToView {
                tab_id: 2,
                window_id: 1,
                view_index: 1,
                index: None,
            })
            .await
            .unwrap();
        let updated = handle
            .request(ControlRequest::UpdateView {
                window_id: 1,
                view_index: 1,
                name: Some("Someday".into()),
                color: None,
                icon: Some(String::new()),
            })
            .await
            .unwrap();
        assert!(updated.success);
        let store = handle.snapshot().await.unwrap();
        let view = store.get_view(1, 1).unwrap();
        assert_eq!(view.name, "Someday");
        assert_eq!(view.color, "#999");
        assert_eq!(view.icon, None);

        let removed = handle
            .request(ControlRequest::RemoveView {
                window_id: 1,
                view_index: 1,
            })
            .await
            .unwrap();
        assert!(removed.success);
        let store = handle.snapshot().await.unwrap();
        assert_eq!(store.window(1).unwrap().views.len(), 1);
        assert_eq!(store.root_tab_ids(1, 0), vec![1, 2]);
        store.validate().unwrap();

        let last = handle
            .request(ControlRequest::RemoveView {
                window_id: 1,
                view_index: 0,
            })
            .await
            .unwrap();
        assert!(!last.success);
    }

    #[tokio::test]
    async fn test_update_group_renames_group() {
        let host = Arc::new(InMemoryHost::with_windows(&[1]));
        let engine = start(&host, EngineSettings::default()).await;
        let group_tab = host.open_tab(1).unwrap();
        engine.handle.send_events(host.take_events()).await.unwrap();
        let created = engine
            .handle
            .request(ControlRequest::CreateGroup {
                group_tab_id: group_tab,
                window_id: 1,
                name: "G".into(),
                color: "#000".into(),
                member_tab_ids: vec![1],
                parent_id: None,
            })
            .await
            .unwrap();
        let node_id = created.data.unwrap()["nodeId"].as_u64().unwrap();

        let response = engine
            .handle
            .request(ControlRequest::UpdateGroup {
                node_id,
                name: Some("Reading".into()),
                color: None,
            })
            .await
            .unwrap();
        assert!(response.success);
        let store = engine.handle.snapshot().await.unwrap();
        let info = store.node_by_tab(group_tab).unwrap().group_info.clone().unwrap();
        assert_eq!(info.name, "Reading");
        assert_eq!(info.color, "#000");

        // Plain tabs are not groups
        let plain = store.node_id_for_tab(1).unwrap();
        let response = engine
            .handle
            .request(ControlRequest::UpdateGroup {
                node_id: plain,
                name: Some("x".into()),
                color: None,
            })
            .await
            .unwrap();
        assert!(!response.success);
    }
}
