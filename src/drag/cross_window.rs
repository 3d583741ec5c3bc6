//! Moves that cross a window boundary and therefore need the host API.
//!
//! Both operations call the host first and then mirror in the tree exactly
//! what the host did. When a host call fails part way through a subtree, the
//! tabs that already moved are moved in the tree too and the rest stay in the
//! source window, so tree and browser agree when the error is reported.

use super::{DragSession, DragSessionManager, DragState};
use crate::error::EngineError;
use crate::host::{TabHost, TabQuery};
use crate::tree::TreeStateStore;
use serde::Serialize;
use tab_tree_config::{NodeId, TabId, WindowId};

impl DragSessionManager {
    /// `BEGIN_CROSS_WINDOW_MOVE`: relocate the dragged tab and its subtree into
    /// `target_window_id`.
    ///
    /// On success the session points at the target window in state
    /// `dragging_cross_window`. On failure the session keeps its prior state
    /// and the error is returned; nothing is retried.
    pub async fn begin_cross_window_move(
        &mut self,
        store: &mut TreeStateStore,
        host: &dyn TabHost,
        target_window_id: WindowId,
    ) -> Result<DragSession, EngineError> {
        let session = self.get_mut().ok_or(EngineError::NoDragSession)?;
        let node = store.require_tab(session.tab_id)?;
        let node_id = node.id;
        let source_window_id = node.window_id;
        let already_there = source_window_id == target_window_id;
        let tabs = store.subtree_tab_ids(session.tab_id);

        session.is_locked = true;
        if !already_there {
            for (moved, tab_id) in tabs.iter().enumerate() {
                if let Err(e) = host.move_tab(*tab_id, target_window_id, None).await {
                    session.is_locked = false;
                    log::warn!(
                        "Cross-window move of tab {} to window {} failed: {}",
                        tab_id,
                        target_window_id,
                        e
                    );
                    apply_partial_move(
                        store,
                        node_id,
                        &tabs,
                        moved,
                        source_window_id,
                        target_window_id,
                    );
                    return Err(e.into());
                }
            }
            if let Err(e) = store.move_subtree_to_window(node_id, target_window_id, None) {
                session.is_locked = false;
                return Err(e.into());
            }
        }

        session.current_window_id = target_window_id;
        session.state = DragState::DraggingCrossWindow;
        session.is_locked = false;
        session.touch();
        crate::debug_info!(
            "DRAG",
            "Session {} now in window {} ({} tabs moved)",
            session.session_id,
            target_window_id,
            if already_there { 0 } else { tabs.len() }
        );
        Ok(session.clone())
    }
}

/// Outcome of [`create_window_with_subtree`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WindowSubtreeMove {
    pub window_id: WindowId,
    /// Moved tabs, subtree root first
    pub tab_ids: Vec<TabId>,
    /// Whether the emptied source window was closed
    pub closed_source_window: bool,
}

/// `CREATE_WINDOW_WITH_SUBTREE`: open a new window for `tab_id` and bring its
/// subtree along.
///
/// When `source_window_id` is given, `auto_close` is on and that window is
/// left without tabs, it is closed. Anything going wrong with that close is
/// logged and swallowed: the move itself still succeeded.
pub async fn create_window_with_subtree(
    store: &mut TreeStateStore,
    host: &dyn TabHost,
    tab_id: TabId,
    source_window_id: Option<WindowId>,
    auto_close: bool,
) -> Result<WindowSubtreeMove, EngineError> {
    let node = store.require_tab(tab_id)?;
    let node_id = node.id;
    let origin_window_id = node.window_id;
    let tabs = store.subtree_tab_ids(tab_id);

    let window = host.create_window(tab_id).await?;
    for (moved, descendant) in tabs.iter().enumerate().skip(1) {
        if let Err(e) = host.move_tab(*descendant, window.id, None).await {
            log::warn!(
                "Moving tab {} into new window {} failed: {}",
                descendant,
                window.id,
                e
            );
            apply_partial_move(store, node_id, &tabs, moved, origin_window_id, window.id);
            return Err(e.into());
        }
    }
    store.move_subtree_to_window(node_id, window.id, None)?;
    log::info!(
        "Moved subtree of tab {} ({} tabs) into new window {}",
        tab_id,
        tabs.len(),
        window.id
    );

    let closed_source_window = match source_window_id {
        Some(source) if auto_close && source != window.id => {
            close_if_empty(store, host, source).await
        }
        _ => false,
    };

    Ok(WindowSubtreeMove {
        window_id: window.id,
        tab_ids: tabs,
        closed_source_window,
    })
}

/// The host moved `tabs[..moved]` (a pre-order prefix of the subtree rooted
/// at `node_id`) into `target` and then failed.
///
/// The whole subtree moves first; then each tab the host did not move goes
/// back to `source` with its own subtree. Descendants of an unmoved tab come
/// later in pre-order, so they are unmoved too and travel back with it.
fn apply_partial_move(
    store: &mut TreeStateStore,
    node_id: NodeId,
    tabs: &[TabId],
    moved: usize,
    source: WindowId,
    target: WindowId,
) {
    if moved == 0 {
        return;
    }
    if let Err(e) = store.move_subtree_to_window(node_id, target, None) {
        log::warn!("Could not mirror partial move of node {}: {}", node_id, e);
        return;
    }
    for tab_id in &tabs[moved..] {
        let Some(node) = store.node_by_tab(*tab_id) else {
            continue;
        };
        if node.window_id != target {
            continue;
        }
        let unmoved = node.id;
        if let Err(e) = store.move_subtree_to_window(unmoved, source, None) {
            log::warn!("Could not return tab {} to window {}: {}", tab_id, source, e);
        }
    }
    log::info!(
        "Partial move: {} of {} tabs reached window {}",
        moved,
        tabs.len(),
        target
    );
}

/// Close `window_id` when the host reports no tabs left in it.
/// Every failure here is swallowed.
async fn close_if_empty(store: &mut TreeStateStore, host: &dyn TabHost, window_id: WindowId) -> bool {
    let remaining = match host.query_tabs(TabQuery::in_window(window_id)).await {
        Ok(tabs) => tabs.len(),
        Err(e) => {
            log::debug!("Source window {} not queryable, not closing: {}", window_id, e);
            return false;
        }
    };
    if remaining > 0 {
        log::debug!(
            "Source window {} still has {} tabs, leaving it open",
            window_id,
            remaining
        );
        return false;
    }

    match host.remove_window(window_id).await {
        Ok(()) => {
            store.remove_window(window_id);
            log::info!("Closed empty source window {}", window_id);
            true
        }
        Err(e) => {
            log::warn!("Failed to close empty source window {}: {}", window_id, e);
            false
        }
    }
}
