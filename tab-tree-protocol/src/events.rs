//! Tab/window lifecycle events delivered by the host browser.
//!
//! The feed is at-least-once and ordered per tab. Events are tagged with
//! `event` in snake_case, e.g. `{"event":"tab_removed","tabId":4,"windowId":1}`.

use serde::{Deserialize, Serialize};
use tab_tree_config::{TabId, WindowId};

/// One event from the host's tab/window feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "event",
    rename_all = "snake_case",
    rename_all_fields = "camelCase"
)]
pub enum TabEvent {
    TabCreated {
        tab_id: TabId,
        window_id: WindowId,
        /// Tab that opened this one; becomes the tree parent when known.
        #[serde(default)]
        opener_tab_id: Option<TabId>,
        #[serde(default)]
        index: Option<usize>,
        #[serde(default)]
        title: Option<String>,
        #[serde(default)]
        pinned: bool,
    },
    TabRemoved {
        tab_id: TabId,
        window_id: WindowId,
        #[serde(default)]
        is_window_closing: bool,
    },
    TabUpdated {
        tab_id: TabId,
        change: TabChange,
    },
    TabActivated {
        tab_id: TabId,
        window_id: WindowId,
    },
    TabMoved {
        tab_id: TabId,
        window_id: WindowId,
        from_index: usize,
        to_index: usize,
    },
    TabAttached {
        tab_id: TabId,
        new_window_id: WindowId,
        new_position: usize,
    },
    TabDetached {
        tab_id: TabId,
        old_window_id: WindowId,
        old_position: usize,
    },
    WindowCreated {
        window_id: WindowId,
    },
    WindowRemoved {
        window_id: WindowId,
    },
}

impl TabEvent {
    /// Tab the event is about, if any
    pub fn tab_id(&self) -> Option<TabId> {
        match self {
            TabEvent::TabCreated { tab_id, .. }
            | TabEvent::TabRemoved { tab_id, .. }
            | TabEvent::TabUpdated { tab_id, .. }
            | TabEvent::TabActivated { tab_id, .. }
            | TabEvent::TabMoved { tab_id, .. }
            | TabEvent::TabAttached { tab_id, .. }
            | TabEvent::TabDetached { tab_id, .. } => Some(*tab_id),
            TabEvent::WindowCreated { .. } | TabEvent::WindowRemoved { .. } => None,
        }
    }

    /// Event name, for logging
    pub fn kind(&self) -> &'static str {
        match self {
            TabEvent::TabCreated { .. } => "tab_created",
            TabEvent::TabRemoved { .. } => "tab_removed",
            TabEvent::TabUpdated { .. } => "tab_updated",
            TabEvent::TabActivated { .. } => "tab_activated",
            TabEvent::TabMoved { .. } => "tab_moved",
            TabEvent::TabAttached { .. } => "tab_attached",
            TabEvent::TabDetached { .. } => "tab_detached",
            TabEvent::WindowCreated { .. } => "window_created",
            TabEvent::WindowRemoved { .. } => "window_removed",
        }
    }
}

/// Fields changed by a `tab_updated` event. Absent fields did not change.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TabChange {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fav_icon_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<TabStatus>,
    /// Discarded tabs are suspended but still exist.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discarded: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pinned: Option<bool>,
}

/// Loading status reported by the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TabStatus {
    Loading,
    Complete,
    Unloaded,
}
