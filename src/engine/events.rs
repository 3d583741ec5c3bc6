//! Applying the host's tab/window feed to the tree.
//!
//! The feed is at-least-once, so every handler tolerates repeats: a second
//! create for a known tab, or a remove for a tab already gone, does nothing.

use super::{Engine, EngineSettings};
use crate::error::TreeError;
use crate::protocol::{TabChange, TabEvent};
use crate::tree::TreeStateStore;
use tab_tree_config::{TabId, WindowId};

impl Engine {
    pub(super) fn apply_event(&mut self, event: TabEvent) {
        let kind = event.kind();
        crate::debug_trace!("EVENT", "{:?}", event);
        match apply_event(&mut self.store, &self.settings, event) {
            Ok(()) => {}
            Err(e) if e.is_not_found() => log::debug!("Ignoring {} event: {}", kind, e),
            Err(e) => log::warn!("Failed to apply {} event: {}", kind, e),
        }
    }
}

/// Apply one host event to `store`
pub(crate) fn apply_event(
    store: &mut TreeStateStore,
    settings: &EngineSettings,
    event: TabEvent,
) -> Result<(), TreeError> {
    match event {
        TabEvent::TabCreated {
            tab_id,
            window_id,
            opener_tab_id,
            title,
            pinned,
            ..
        } => tab_created(store, settings, tab_id, window_id, opener_tab_id, title, pinned),
        TabEvent::TabRemoved {
            tab_id,
            is_window_closing,
            ..
        } => {
            if !store.contains_tab(tab_id) {
                return Ok(());
            }
            store.remove_node(tab_id)?;
            crate::debug_log!(
                "EVENT",
                "Tab {} removed (window closing: {})",
                tab_id,
                is_window_closing
            );
            Ok(())
        }
        TabEvent::TabUpdated { tab_id, change } => {
            tab_updated(store, tab_id, change);
            Ok(())
        }
        TabEvent::TabActivated { tab_id, window_id } => {
            if store.contains_tab(tab_id) {
                store.set_active_tab(window_id, tab_id);
            }
            Ok(())
        }
        TabEvent::TabAttached {
            tab_id,
            new_window_id,
            ..
        } => {
            store.relocate_tab_to_window(tab_id, new_window_id, None)?;
            Ok(())
        }
        // Strip order is the host's business; the tree keeps its own
        TabEvent::TabMoved { .. } | TabEvent::TabDetached { .. } => Ok(()),
        TabEvent::WindowCreated { window_id } => {
            store.ensure_window(window_id);
            Ok(())
        }
        TabEvent::WindowRemoved { window_id } => {
            store.remove_window(window_id);
            Ok(())
        }
    }
}

fn tab_created(
    store: &mut TreeStateStore,
    settings: &EngineSettings,
    tab_id: TabId,
    window_id: WindowId,
    opener_tab_id: Option<TabId>,
    title: Option<String>,
    pinned: bool,
) -> Result<(), TreeError> {
    if store.contains_tab(tab_id) {
        log::debug!("Duplicate create for tab {}, ignoring", tab_id);
        return Ok(());
    }

    // Openers in another window do not adopt the tab
    let parent_id = opener_tab_id
        .and_then(|opener| store.node_by_tab(opener))
        .filter(|opener| opener.window_id == window_id)
        .map(|opener| opener.id);

    store.add_node(tab_id, window_id, parent_id)?;
    if let Some(parent_id) = parent_id
        && settings.expand_parent_on_new_child
    {
        store.set_expanded(parent_id, true)?;
    }
    if let Some(title) = title {
        store.set_title(tab_id, title);
    }
    if pinned {
        store.set_pinned(window_id, tab_id, true);
    }
    Ok(())
}

fn tab_updated(store: &mut TreeStateStore, tab_id: TabId, change: TabChange) {
    let Some(window_id) = store.node_by_tab(tab_id).map(|n| n.window_id) else {
        return;
    };
    if let Some(title) = change.title {
        store.set_title(tab_id, title);
    }
    if let Some(url) = change.fav_icon_url {
        store.set_favicon(tab_id, url);
    }
    if let Some(discarded) = change.discarded {
        store.set_discarded(tab_id, discarded);
    }
    if let Some(pinned) = change.pinned {
        store.set_pinned(window_id, tab_id, pinned);
    }
}
