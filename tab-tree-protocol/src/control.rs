//! Control messages sent by the UI layer and the engine's responses.
//!
//! Requests are tagged with `type` in SCREAMING_SNAKE_CASE and carry camelCase
//! fields, e.g. `{"type":"START_DRAG_SESSION","tabId":3,"windowId":1,"treeData":{}}`.

use serde::{Deserialize, Serialize};
use std::fmt;
use tab_tree_config::{NodeId, TabId, WindowId};

/// A request from the UI layer to the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    rename_all = "SCREAMING_SNAKE_CASE",
    rename_all_fields = "camelCase"
)]
pub enum ControlRequest {
    /// Begin an interactive drag of `tab_id`, replacing any session in flight.
    StartDragSession {
        tab_id: TabId,
        window_id: WindowId,
        /// Opaque tree snapshot captured by the UI when the drag started.
        #[serde(default)]
        tree_data: serde_json::Value,
    },

    /// Read the current drag session (`data` is null when idle).
    GetDragSession,

    /// Move the dragged tab and its subtree into another window.
    BeginCrossWindowMove { target_window_id: WindowId },

    /// Finish the drag session, whatever state it is in.
    EndDragSession { reason: DragEndReason },

    /// Move a tab and its subtree into a brand new window.
    CreateWindowWithSubtree {
        tab_id: TabId,
        /// Window the subtree leaves; closed afterwards if it ends up empty.
        #[serde(default)]
        source_window_id: Option<WindowId>,
    },

    /// Reparent / reorder a node. `new_parent_id: null` means the view root.
    UpdateTree {
        node_id: NodeId,
        #[serde(default)]
        new_parent_id: Option<NodeId>,
        index: usize,
    },

    /// Focus a tab in the browser.
    ActivateTab { tab_id: TabId },

    /// Read the whole tree state.
    GetState,

    /// Expand or collapse a node.
    SetExpanded { node_id: NodeId, expanded: bool },

    /// Move a tab (with its subtree) into another view of a window.
    MoveTabToView {
        tab_id: TabId,
        window_id: WindowId,
        view_index: usize,
        /// Position among the view's root nodes; appended when absent.
        #[serde(default)]
        index: Option<usize>,
    },

    /// Change the active view of a window.
    SwitchView {
        window_id: WindowId,
        view_index: usize,
    },

    /// Append a view to a window.
    AddView {
        window_id: WindowId,
        name: String,
        color: String,
        #[serde(default)]
        icon: Option<String>,
    },

    /// Remove a view; its trees move to the end of the first view.
    RemoveView {
        window_id: WindowId,
        view_index: usize,
    },

    /// Rename, recolor or re-icon a view. Absent fields are left alone;
    /// an empty `icon` clears it.
    UpdateView {
        window_id: WindowId,
        view_index: usize,
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        color: Option<String>,
        #[serde(default)]
        icon: Option<String>,
    },

    /// Wrap tabs in a group node backed by `group_tab_id`.
    CreateGroup {
        group_tab_id: TabId,
        window_id: WindowId,
        name: String,
        color: String,
        #[serde(default)]
        member_tab_ids: Vec<TabId>,
        #[serde(default)]
        parent_id: Option<NodeId>,
    },

    /// Rename and/or recolor a group node.
    UpdateGroup {
        node_id: NodeId,
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        color: Option<String>,
    },

    /// Delete a group node according to the configured policy.
    DeleteGroup { node_id: NodeId },

    /// Prune ghost nodes against the live tab set now.
    Reconcile,
}

impl ControlRequest {
    /// Wire name of the request, for logging
    pub fn name(&self) -> &'static str {
        match self {
            ControlRequest::StartDragSession { .. } => "START_DRAG_SESSION",
            ControlRequest::GetDragSession => "GET_DRAG_SESSION",
            ControlRequest::BeginCrossWindowMove { .. } => "BEGIN_CROSS_WINDOW_MOVE",
            ControlRequest::EndDragSession { .. } => "END_DRAG_SESSION",
            ControlRequest::CreateWindowWithSubtree { .. } => "CREATE_WINDOW_WITH_SUBTREE",
            ControlRequest::UpdateTree { .. } => "UPDATE_TREE",
            ControlRequest::ActivateTab { .. } => "ACTIVATE_TAB",
            ControlRequest::GetState => "GET_STATE",
            ControlRequest::SetExpanded { .. } => "SET_EXPANDED",
            ControlRequest::MoveTabToView { .. } => "MOVE_TAB_TO_VIEW",
            ControlRequest::SwitchView { .. } => "SWITCH_VIEW",
            ControlRequest::AddView { .. } => "ADD_VIEW",
            ControlRequest::RemoveView { .. } => "REMOVE_VIEW",
            ControlRequest::UpdateView { .. } => "UPDATE_VIEW",
            ControlRequest::CreateGroup { .. } => "CREATE_GROUP",
            ControlRequest::UpdateGroup { .. } => "UPDATE_GROUP",
            ControlRequest::DeleteGroup { .. } => "DELETE_GROUP",
            ControlRequest::Reconcile => "RECONCILE",
        }
    }

    /// Whether the request only reads state
    pub fn is_read_only(&self) -> bool {
        matches!(
            self,
            ControlRequest::GetDragSession | ControlRequest::GetState
        )
    }
}

/// Why a drag session ended. Purely informational.
///
/// Serialized as a plain string: `"COMPLETED"`, `"CANCELLED"`, or any
/// caller-supplied diagnostic text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum DragEndReason {
    Completed,
    Cancelled,
    Other(String),
}

impl From<String> for DragEndReason {
    fn from(value: String) -> Self {
        match value.as_str() {
            "COMPLETED" => DragEndReason::Completed,
            "CANCELLED" => DragEndReason::Cancelled,
            _ => DragEndReason::Other(value),
        }
    }
}

impl From<DragEndReason> for String {
    fn from(reason: DragEndReason) -> Self {
        match reason {
            DragEndReason::Completed => "COMPLETED".to_string(),
            DragEndReason::Cancelled => "CANCELLED".to_string(),
            DragEndReason::Other(text) => text,
        }
    }
}

impl fmt::Display for DragEndReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DragEndReason::Completed => f.write_str("COMPLETED"),
            DragEndReason::Cancelled => f.write_str("CANCELLED"),
            DragEndReason::Other(text) => f.write_str(text),
        }
    }
}

/// The engine's answer to a [`ControlRequest`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ControlResponse {
    /// Successful response carrying `data`
    pub fn ok(data: serde_json::Value) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    /// Successful response without a payload
    pub fn ok_empty() -> Self {
        Self {
            success: true,
            data: None,
            error: None,
        }
    }

    /// Successful response carrying any serializable value.
    ///
    /// Falls back to a failed response if `value` cannot be serialized.
    pub fn ok_with<T: Serialize>(value: &T) -> Self {
        match serde_json::to_value(value) {
            Ok(data) => Self::ok(data),
            Err(e) => Self::failure(format!("failed to serialize response: {e}")),
        }
    }

    /// Failed response with a human-readable message
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}
