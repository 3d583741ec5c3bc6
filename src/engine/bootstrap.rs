//! Startup: bring persisted state in line with the live browser.

use crate::error::{EngineError, StorageError};
use crate::host::{TabHost, TabInfo, TabQuery};
use crate::persistence::PersistenceGateway;
use crate::reconcile::{Reconciliation, reconcile};
use crate::tree::{TreeStateStore, ViewTemplate};
use serde::Serialize;
use std::collections::HashSet;
use tab_tree_config::{TabId, WindowId};

/// What startup found and fixed
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BootstrapReport {
    /// Tabs read back from storage
    pub restored_tabs: usize,
    /// Stored schema version, `None` when storage was empty or unreadable
    pub from_version: Option<u64>,
    pub removed_tab_ids: Vec<TabId>,
    pub pruned_window_ids: Vec<WindowId>,
    /// Live tabs the stored tree did not know about
    pub adopted_tab_ids: Vec<TabId>,
}

/// Load, reconcile against the live tabs, then adopt unknown live tabs.
///
/// A stored tree that cannot be parsed is logged and replaced by an empty
/// one. A tree from a newer schema is an error: it must not be overwritten.
pub(super) async fn bootstrap(
    host: &dyn TabHost,
    gateway: &PersistenceGateway,
    template: ViewTemplate,
) -> Result<(TreeStateStore, BootstrapReport), EngineError> {
    let (store, from_version) = match gateway.load(template.clone()).await {
        Ok(loaded) => (loaded.store, loaded.from_version),
        Err(e @ StorageError::Deserialize { .. }) => {
            log::error!("Stored tree state is corrupt, starting empty: {}", e);
            (TreeStateStore::new(template), None)
        }
        Err(e) => return Err(e.into()),
    };
    let restored_tabs = store.len();

    let mut live_tabs = host.query_tabs(TabQuery::all()).await?;
    live_tabs.sort_by_key(|tab| (tab.window_id, tab.index));
    let live_tab_ids: HashSet<TabId> = live_tabs.iter().map(|tab| tab.id).collect();
    let live_window_ids = host.live_window_ids().await?;

    let Reconciliation {
        tree: mut store,
        removed_tab_ids,
    } = reconcile(&live_tab_ids, &store);
    let pruned_window_ids = store.prune_windows(&live_window_ids);

    for window_id in &live_window_ids {
        store.ensure_window(*window_id);
    }
    let adopted_tab_ids = adopt_live_tabs(&mut store, &live_tabs);

    let report = BootstrapReport {
        restored_tabs,
        from_version,
        removed_tab_ids,
        pruned_window_ids,
        adopted_tab_ids,
    };
    log::info!(
        "Bootstrap: restored {} tabs, removed {} ghosts, adopted {} live tabs",
        report.restored_tabs,
        report.removed_tab_ids.len(),
        report.adopted_tab_ids.len()
    );
    Ok((store, report))
}

/// Add unknown live tabs as roots, move known ones into the window the
/// browser reports, and refresh metadata for all of them
fn adopt_live_tabs(store: &mut TreeStateStore, live_tabs: &[TabInfo]) -> Vec<TabId> {
    let mut adopted = Vec::new();
    for tab in live_tabs {
        if !store.contains_tab(tab.id) {
            match store.add_node(tab.id, tab.window_id, None) {
                Ok(_) => adopted.push(tab.id),
                Err(e) => {
                    log::warn!("Could not adopt live tab {}: {}", tab.id, e);
                    continue;
                }
            }
        } else {
            match store.relocate_tab_to_window(tab.id, tab.window_id, None) {
                Ok(true) => log::info!(
                    "Restored tab {} now lives in window {}, relocated",
                    tab.id,
                    tab.window_id
                ),
                Ok(false) => {}
                Err(e) => log::warn!("Could not relocate restored tab {}: {}", tab.id, e),
            }
        }
        if let Some(title) = &tab.title {
            store.set_title(tab.id, title.clone());
        }
        if let Some(url) = &tab.fav_icon_url {
            store.set_favicon(tab.id, url.clone());
        }
        store.set_discarded(tab.id, tab.discarded);
        store.set_pinned(tab.window_id, tab.id, tab.pinned);
        if tab.active {
            store.set_active_tab(tab.window_id, tab.id);
        }
    }
    adopted
}
