//! Boundary to the host browser's tab/window API.
//!
//! The engine never touches browser state directly; it asks a [`TabHost`]
//! and learns about changes through the ordered [`crate::protocol::TabEvent`]
//! feed. [`InMemoryHost`] is a deterministic implementation for tests and the
//! CLI `simulate` command.

mod memory;

pub use memory::{HostFailure, InMemoryHost};

use crate::error::HostError;
use async_trait::async_trait;
use serde::Serialize;
use std::collections::HashSet;
use tab_tree_config::{TabId, WindowId};

/// A live tab as reported by the host
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TabInfo {
    pub id: TabId,
    pub window_id: WindowId,
    /// Position in the host's flat tab strip
    pub index: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fav_icon_url: Option<String>,
    pub discarded: bool,
    pub pinned: bool,
    pub active: bool,
}

/// A live window as reported by the host
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WindowInfo {
    pub id: WindowId,
    pub focused: bool,
}

/// Filter for [`TabHost::query_tabs`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TabQuery {
    pub window_id: Option<WindowId>,
}

impl TabQuery {
    /// Every tab in every window, discarded ones included
    pub fn all() -> Self {
        Self::default()
    }

    pub fn in_window(window_id: WindowId) -> Self {
        Self {
            window_id: Some(window_id),
        }
    }

    pub fn matches(&self, tab: &TabInfo) -> bool {
        self.window_id.is_none_or(|w| w == tab.window_id)
    }
}

/// Imperative calls into the host browser.
#[async_trait]
pub trait TabHost: Send + Sync {
    /// Open a new blank tab at the end of `window_id`
    async fn create_tab(&self, window_id: WindowId) -> Result<TabInfo, HostError>;

    async fn remove_tab(&self, tab_id: TabId) -> Result<(), HostError>;

    /// Move a tab into `window_id` at `index` (`None` appends)
    async fn move_tab(
        &self,
        tab_id: TabId,
        window_id: WindowId,
        index: Option<usize>,
    ) -> Result<TabInfo, HostError>;

    async fn query_tabs(&self, query: TabQuery) -> Result<Vec<TabInfo>, HostError>;

    async fn list_windows(&self) -> Result<Vec<WindowInfo>, HostError>;

    async fn remove_window(&self, window_id: WindowId) -> Result<(), HostError>;

    /// Open a new window holding `tab_id`, moved out of its current window
    async fn create_window(&self, tab_id: TabId) -> Result<WindowInfo, HostError>;

    async fn activate_tab(&self, tab_id: TabId) -> Result<(), HostError>;

    /// Ids of every live tab. Discarded tabs count as live.
    async fn live_tab_ids(&self) -> Result<HashSet<TabId>, HostError> {
        Ok(self
            .query_tabs(TabQuery::all())
            .await?
            .into_iter()
            .map(|tab| tab.id)
            .collect())
    }

    async fn live_window_ids(&self) -> Result<HashSet<WindowId>, HostError> {
        Ok(self
            .list_windows()
            .await?
            .into_iter()
            .map(|window| window.id)
            .collect())
    }
}
