//! Deterministic in-process browser model.
//!
//! Windows are only closed explicitly, never because their last tab left, so
//! callers can observe the engine's own auto-close. Every state change queues
//! the [`TabEvent`] a real browser would emit; drain them with
//! [`InMemoryHost::take_events`] and feed them back to the engine.

use super::{TabHost, TabInfo, TabQuery, WindowInfo};
use crate::error::HostError;
use crate::protocol::{TabChange, TabEvent};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap, HashSet};
use tab_tree_config::{TabId, WindowId};

/// Failures the host can be told to produce
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HostFailure {
    /// `move_tab` for this tab fails
    MoveTab(TabId),
    /// `remove_window` for this window fails
    RemoveWindow(WindowId),
    CreateWindow,
    QueryTabs,
}

#[derive(Debug, Clone)]
struct HostTab {
    title: Option<String>,
    fav_icon_url: Option<String>,
    discarded: bool,
    pinned: bool,
}

#[derive(Debug, Default)]
struct HostState {
    /// Tab order per window
    windows: BTreeMap<WindowId, Vec<TabId>>,
    tabs: HashMap<TabId, HostTab>,
    active: HashMap<WindowId, TabId>,
    focused: Option<WindowId>,
    next_tab_id: TabId,
    next_window_id: WindowId,
    failures: HashSet<HostFailure>,
    events: Vec<TabEvent>,
}

impl HostState {
    fn window_of(&self, tab_id: TabId) -> Option<WindowId> {
        self.windows
            .iter()
            .find(|(_, tabs)| tabs.contains(&tab_id))
            .map(|(window_id, _)| *window_id)
    }

    fn info(&self, tab_id: TabId) -> Option<TabInfo> {
        let tab = self.tabs.get(&tab_id)?;
        let window_id = self.window_of(tab_id)?;
        let index = self.windows.get(&window_id)?.iter().position(|t| *t == tab_id)?;
        Some(TabInfo {
            id: tab_id,
            window_id,
            index,
            title: tab.title.clone(),
            fav_icon_url: tab.fav_icon_url.clone(),
            discarded: tab.discarded,
            pinned: tab.pinned,
            active: self.active.get(&window_id) == Some(&tab_id),
        })
    }

    fn open_window(&mut self) -> WindowId {
        self.next_window_id += 1;
        let window_id = self.next_window_id;
        self.windows.insert(window_id, Vec::new());
        self.focused = Some(window_id);
        self.events.push(TabEvent::WindowCreated { window_id });
        window_id
    }

    fn open_tab(&mut self, window_id: WindowId, opener_tab_id: Option<TabId>) -> Result<TabInfo, HostError> {
        let tabs = self
            .windows
            .get_mut(&window_id)
            .ok_or(HostError::WindowNotFound(window_id))?;
        self.next_tab_id += 1;
        let tab_id = self.next_tab_id;
        tabs.push(tab_id);
        let index = tabs.len() - 1;
        self.tabs.insert(
            tab_id,
            HostTab {
                title: None,
                fav_icon_url: None,
                discarded: false,
                pinned: false,
            },
        );
        self.events.push(TabEvent::TabCreated {
            tab_id,
            window_id,
            opener_tab_id,
            index: Some(index),
            title: None,
            pinned: false,
        });
        self.info(tab_id).ok_or(HostError::TabNotFound(tab_id))
    }

    fn detach(&mut self, tab_id: TabId) -> Result<(WindowId, usize), HostError> {
        let window_id = self.window_of(tab_id).ok_or(HostError::TabNotFound(tab_id))?;
        let tabs = self
            .windows
            .get_mut(&window_id)
            .ok_or(HostError::WindowNotFound(window_id))?;
        let position = tabs
            .iter()
            .position(|t| *t == tab_id)
            .ok_or(HostError::TabNotFound(tab_id))?;
        tabs.remove(position);
        if self.active.get(&window_id) == Some(&tab_id) {
            self.active.remove(&window_id);
        }
        Ok((window_id, position))
    }

    fn check(&self, failure: HostFailure) -> Result<(), HostError> {
        if self.failures.contains(&failure) {
            return Err(HostError::Api(format!("injected failure: {failure:?}")));
        }
        Ok(())
    }
}

/// Thread-safe fake browser implementing [`TabHost`].
#[derive(Debug, Default)]
pub struct InMemoryHost {
    state: Mutex<HostState>,
}

impl InMemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a host with one window per entry, each holding that many tabs
    pub fn with_windows(tab_counts: &[usize]) -> Self {
        let host = Self::new();
        for count in tab_counts {
            let window_id = host.open_window();
            for _ in 0..*count {
                // Window was just created
                let _ = host.open_tab(window_id);
            }
        }
        host.take_events();
        host
    }

    pub fn open_window(&self) -> WindowId {
        self.state.lock().open_window()
    }

    pub fn open_tab(&self, window_id: WindowId) -> Result<TabId, HostError> {
        self.state.lock().open_tab(window_id, None).map(|t| t.id)
    }

    /// Open a tab as if a link in `opener_tab_id` spawned it
    pub fn open_tab_from(&self, opener_tab_id: TabId) -> Result<TabId, HostError> {
        let mut state = self.state.lock();
        let window_id = state
            .window_of(opener_tab_id)
            .ok_or(HostError::TabNotFound(opener_tab_id))?;
        state.open_tab(window_id, Some(opener_tab_id)).map(|t| t.id)
    }

    /// Close a tab the way the user would (emits `TabRemoved`)
    pub fn close_tab(&self, tab_id: TabId) -> Result<(), HostError> {
        let mut state = self.state.lock();
        let (window_id, _) = state.detach(tab_id)?;
        state.tabs.remove(&tab_id);
        state.events.push(TabEvent::TabRemoved {
            tab_id,
            window_id,
            is_window_closing: false,
        });
        Ok(())
    }

    pub fn set_title(&self, tab_id: TabId, title: &str) {
        let mut state = self.state.lock();
        if let Some(tab) = state.tabs.get_mut(&tab_id) {
            tab.title = Some(title.to_string());
            state.events.push(TabEvent::TabUpdated {
                tab_id,
                change: TabChange {
                    title: Some(title.to_string()),
                    ..TabChange::default()
                },
            });
        }
    }

    /// Suspend or wake a tab; a discarded tab stays live
    pub fn set_discarded(&self, tab_id: TabId, discarded: bool) {
        let mut state = self.state.lock();
        if let Some(tab) = state.tabs.get_mut(&tab_id) {
            tab.discarded = discarded;
            state.events.push(TabEvent::TabUpdated {
                tab_id,
                change: TabChange {
                    discarded: Some(discarded),
                    ..TabChange::default()
                },
            });
        }
    }

    pub fn fail(&self, failure: HostFailure) {
        self.state.lock().failures.insert(failure);
    }

    pub fn clear_failures(&self) {
        self.state.lock().failures.clear();
    }

    /// Drain the events produced since the last call
    pub fn take_events(&self) -> Vec<TabEvent> {
        std::mem::take(&mut self.state.lock().events)
    }

    pub fn has_window(&self, window_id: WindowId) -> bool {
        self.state.lock().windows.contains_key(&window_id)
    }

    pub fn window_ids(&self) -> Vec<WindowId> {
        self.state.lock().windows.keys().copied().collect()
    }

    /// Tab ids of a window in strip order
    pub fn tabs_in_window(&self, window_id: WindowId) -> Vec<TabId> {
        self.state
            .lock()
            .windows
            .get(&window_id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn window_of(&self, tab_id: TabId) -> Option<WindowId> {
        self.state.lock().window_of(tab_id)
    }

    pub fn active_tab(&self, window_id: WindowId) -> Option<TabId> {
        self.state.lock().active.get(&window_id).copied()
    }
}

#[async_trait]
impl TabHost for InMemoryHost {
    async fn create_tab(&self, window_id: WindowId) -> Result<TabInfo, HostError> {
        self.state.lock().open_tab(window_id, None)
    }

    async fn remove_tab(&self, tab_id: TabId) -> Result<(), HostError> {
        self.close_tab(tab_id)
    }

    async fn move_tab(
        &self,
        tab_id: TabId,
        window_id: WindowId,
        index: Option<usize>,
    ) -> Result<TabInfo, HostError> {
        let mut state = self.state.lock();
        state.check(HostFailure::MoveTab(tab_id))?;
        if !state.windows.contains_key(&window_id) {
            return Err(HostError::WindowNotFound(window_id));
        }
        let (old_window_id, old_position) = state.detach(tab_id)?;

        let tabs = state
            .windows
            .get_mut(&window_id)
            .ok_or(HostError::WindowNotFound(window_id))?;
        let position = index.unwrap_or(tabs.len()).min(tabs.len());
        tabs.insert(position, tab_id);

        if old_window_id == window_id {
            state.events.push(TabEvent::TabMoved {
                tab_id,
                window_id,
                from_index: old_position,
                to_index: position,
            });
        } else {
            state.events.push(TabEvent::TabDetached {
                tab_id,
                old_window_id,
                old_position,
            });
            state.events.push(TabEvent::TabAttached {
                tab_id,
                new_window_id: window_id,
                new_position: position,
            });
        }
        state.info(tab_id).ok_or(HostError::TabNotFound(tab_id))
    }

    async fn query_tabs(&self, query: TabQuery) -> Result<Vec<TabInfo>, HostError> {
        let state = self.state.lock();
        state.check(HostFailure::QueryTabs)?;
        if let Some(window_id) = query.window_id
            && !state.windows.contains_key(&window_id)
        {
            return Err(HostError::WindowNotFound(window_id));
        }
        Ok(state
            .windows
            .values()
            .flatten()
            .filter_map(|tab_id| state.info(*tab_id))
            .filter(|tab| query.matches(tab))
            .collect())
    }

    async fn list_windows(&self) -> Result<Vec<WindowInfo>, HostError> {
        let state = self.state.lock();
        Ok(state
            .windows
            .keys()
            .map(|id| WindowInfo {
                id: *id,
                focused: state.focused == Some(*id),
            })
            .collect())
    }

    async fn remove_window(&self, window_id: WindowId) -> Result<(), HostError> {
        let mut state = self.state.lock();
        state.check(HostFailure::RemoveWindow(window_id))?;
        let tabs = state
            .windows
            .remove(&window_id)
            .ok_or(HostError::WindowNotFound(window_id))?;
        for tab_id in tabs {
            state.tabs.remove(&tab_id);
            state.events.push(TabEvent::TabRemoved {
                tab_id,
                window_id,
                is_window_closing: true,
            });
        }
        state.active.remove(&window_id);
        if state.focused == Some(window_id) {
            state.focused = None;
        }
        state.events.push(TabEvent::WindowRemoved { window_id });
        Ok(())
    }

    async fn create_window(&self, tab_id: TabId) -> Result<WindowInfo, HostError> {
        let mut state = self.state.lock();
        state.check(HostFailure::CreateWindow)?;
        let (old_window_id, old_position) = state.detach(tab_id)?;
        let window_id = state.open_window();
        if let Some(tabs) = state.windows.get_mut(&window_id) {
            tabs.push(tab_id);
        }
        state.active.insert(window_id, tab_id);
        state.events.push(TabEvent::TabDetached {
            tab_id,
            old_window_id,
            old_position,
        });
        state.events.push(TabEvent::TabAttached {
            tab_id,
            new_window_id: window_id,
            new_position: 0,
        });
        Ok(WindowInfo {
            id: window_id,
            focused: true,
        })
    }

    async fn activate_tab(&self, tab_id: TabId) -> Result<(), HostError> {
        let mut state = self.state.lock();
        let window_id = state.window_of(tab_id).ok_or(HostError::TabNotFound(tab_id))?;
        state.active.insert(window_id, tab_id);
        state.events.push(TabEvent::TabActivated { tab_id, window_id });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_with_windows_layout() {
        let host = InMemoryHost::with_windows(&[2, 1]);
        assert_eq!(host.window_ids(), vec![1, 2]);
        assert_eq!(host.tabs_in_window(1), vec![1, 2]);
        assert_eq!(host.tabs_in_window(2), vec![3]);
        assert!(host.take_events().is_empty());

        let all = host.query_tabs(TabQuery::all()).await.unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[1].index, 1);
    }

    #[tokio::test]
    async fn test_move_tab_between_windows_emits_attach() {
        let host = InMemoryHost::with_windows(&[2, 1]);

        let info = host.move_tab(1, 2, Some(0)).await.unwrap();

        assert_eq!(info.window_id, 2);
        assert_eq!(info.index, 0);
        assert_eq!(host.tabs_in_window(2), vec![1, 3]);
        let events = host.take_events();
        assert_eq!(
            events,
            vec![
                TabEvent::TabDetached {
                    tab_id: 1,
                    old_window_id: 1,
                    old_position: 0,
                },
                TabEvent::TabAttached {
                    tab_id: 1,
                    new_window_id: 2,
                    new_position: 0,
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_last_tab_leaving_keeps_window_open() {
        let host = InMemoryHost::with_windows(&[1, 1]);
        host.move_tab(1, 2, None).await.unwrap();
        assert!(host.has_window(1));
        assert!(host.query_tabs(TabQuery::in_window(1)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_injected_failures() {
        let host = InMemoryHost::with_windows(&[2]);
        host.fail(HostFailure::MoveTab(1));
        host.fail(HostFailure::RemoveWindow(1));

        assert!(matches!(
            host.move_tab(1, 1, Some(1)).await,
            Err(HostError::Api(_))
        ));
        assert!(host.remove_window(1).await.is_err());
        assert!(host.move_tab(2, 1, Some(0)).await.is_ok());

        host.clear_failures();
        host.remove_window(1).await.unwrap();
        assert!(!host.has_window(1));
    }

    #[tokio::test]
    async fn test_create_window_moves_tab() {
        let host = InMemoryHost::with_windows(&[2]);
        let window = host.create_window(2).await.unwrap();
        assert_eq!(host.tabs_in_window(window.id), vec![2]);
        assert_eq!(host.tabs_in_window(1), vec![1]);
        assert_eq!(host.active_tab(window.id), Some(2));
    }

    #[tokio::test]
    async fn test_discarded_tabs_are_live() {
        let host = InMemoryHost::with_windows(&[2]);
        host.set_discarded(2, true);
        let live = host.live_tab_ids().await.unwrap();
        assert!(live.contains(&2));
    }

    #[tokio::test]
    async fn test_unknown_ids() {
        let host = InMemoryHost::with_windows(&[1]);
        assert_eq!(
            host.move_tab(99, 1, None).await.unwrap_err(),
            HostError::TabNotFound(99)
        );
        assert_eq!(
            host.move_tab(1, 42, None).await.unwrap_err(),
            HostError::WindowNotFound(42)
        );
        assert_eq!(
            host.activate_tab(99).await.unwrap_err(),
            HostError::TabNotFound(99)
        );
    }
}
