//! Drag/move session state machine.
//!
//! At most one [`DragSession`] exists at a time. It moves through
//! `idle → dragging_local → dragging_cross_window → idle`; starting a new
//! session while one is active replaces it. Sessions have no expiry: they
//! live until ended or replaced.
//!
//! Cross-window moves and new-window moves need the host API and live in
//! [`cross_window`].

pub mod cross_window;

use crate::protocol::DragEndReason;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tab_tree_config::{TabId, WindowId};
use uuid::Uuid;

pub use cross_window::{WindowSubtreeMove, create_window_with_subtree};

/// Where a drag stands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DragState {
    Idle,
    DraggingLocal,
    DraggingCrossWindow,
}

/// One in-flight interactive move
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DragSession {
    pub session_id: Uuid,
    pub tab_id: TabId,
    pub source_window_id: WindowId,
    pub current_window_id: WindowId,
    pub state: DragState,
    /// Whatever the UI sent at drag start; opaque to the engine
    pub tree_snapshot: serde_json::Value,
    /// Set while a host move for this session is in flight
    pub is_locked: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DragSession {
    fn new(tab_id: TabId, window_id: WindowId, tree_snapshot: serde_json::Value) -> Self {
        let now = Utc::now();
        Self {
            session_id: Uuid::new_v4(),
            tab_id,
            source_window_id: window_id,
            current_window_id: window_id,
            state: DragState::DraggingLocal,
            tree_snapshot,
            is_locked: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether a window other than the one holding the drag is observing it
    pub fn is_cross_window_drag(&self, observer_window_id: WindowId) -> bool {
        self.current_window_id != observer_window_id
    }

    pub(crate) fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// Owner of the single optional drag session.
#[derive(Debug, Default)]
pub struct DragSessionManager {
    current: Option<DragSession>,
}

impl DragSessionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// `START_DRAG_SESSION`: begin a local drag, replacing any existing one
    pub fn start(
        &mut self,
        tab_id: TabId,
        window_id: WindowId,
        tree_snapshot: serde_json::Value,
    ) -> &DragSession {
        if let Some(old) = self.current.take() {
            log::warn!(
                "Drag session {} for tab {} replaced by a new session for tab {}",
                old.session_id,
                old.tab_id,
                tab_id
            );
        }
        let session = DragSession::new(tab_id, window_id, tree_snapshot);
        crate::debug_info!(
            "DRAG",
            "Started drag session {} for tab {} in window {}",
            session.session_id,
            tab_id,
            window_id
        );
        self.current.insert(session)
    }

    /// `GET_DRAG_SESSION`
    pub fn get(&self) -> Option<&DragSession> {
        self.current.as_ref()
    }

    pub(crate) fn get_mut(&mut self) -> Option<&mut DragSession> {
        self.current.as_mut()
    }

    /// `END_DRAG_SESSION`: back to idle whatever the prior state was.
    /// Returns the ended session, if there was one.
    pub fn end(&mut self, reason: &DragEndReason) -> Option<DragSession> {
        let ended = self.current.take();
        match &ended {
            Some(session) => crate::debug_info!(
                "DRAG",
                "Ended drag session {} ({:?}) reason={}",
                session.session_id,
                session.state,
                reason
            ),
            None => log::debug!("END_DRAG_SESSION with no active session (reason={})", reason),
        }
        ended
    }

    /// Idle when there is no session
    pub fn state(&self) -> DragState {
        self.current
            .as_ref()
            .map(|s| s.state)
            .unwrap_or(DragState::Idle)
    }

    pub fn is_cross_window_drag(&self, observer_window_id: WindowId) -> bool {
        self.current
            .as_ref()
            .is_some_and(|s| s.is_cross_window_drag(observer_window_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_start_creates_local_session() {
        let mut manager = DragSessionManager::new();
        assert_eq!(manager.state(), DragState::Idle);

        let session = manager.start(5, 2, json!({"nodes": []})).clone();

        assert_eq!(session.source_window_id, 2);
        assert_eq!(session.current_window_id, 2);
        assert_eq!(session.state, DragState::DraggingLocal);
        assert!(!session.is_locked);
        assert_eq!(manager.get(), Some(&session));
    }

    #[test]
    fn test_new_session_replaces_old() {
        let mut manager = DragSessionManager::new();
        let first = manager.start(1, 1, json!(null)).session_id;
        let second = manager.start(2, 1, json!(null)).session_id;

        assert_ne!(first, second);
        assert_eq!(manager.get().unwrap().session_id, second);
        assert_eq!(manager.get().unwrap().tab_id, 2);
    }

    #[test]
    fn test_end_returns_to_idle() {
        let mut manager = DragSessionManager::new();
        manager.start(1, 1, json!(null));

        let ended = manager.end(&DragEndReason::Completed);
        assert!(ended.is_some());
        assert!(manager.get().is_none());
        assert_eq!(manager.state(), DragState::Idle);

        // Ending again is harmless
        assert!(manager.end(&DragEndReason::Cancelled).is_none());
    }

    #[test]
    fn test_cross_window_flag_is_derived() {
        let mut manager = DragSessionManager::new();
        assert!(!manager.is_cross_window_drag(1));

        manager.start(1, 1, json!(null));
        assert!(!manager.is_cross_window_drag(1));
        assert!(manager.is_cross_window_drag(2));
    }

    #[test]
    fn test_session_serializes_camel_case() {
        let mut manager = DragSessionManager::new();
        let session = manager.start(3, 4, json!({"a": 1}));
        let value = serde_json::to_value(session).unwrap();
        assert_eq!(value["tabId"], 3);
        assert_eq!(value["sourceWindowId"], 4);
        assert_eq!(value["state"], "dragging_local");
        assert_eq!(value["treeSnapshot"], json!({"a": 1}));
        assert_eq!(value["isLocked"], false);
    }
}
