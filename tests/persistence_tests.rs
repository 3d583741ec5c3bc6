//! Storage backends and schema migration through the public API.

mod common;

use common::{TestContext, persisted_tree};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tab_tree::EngineSettings;
use tab_tree::host::InMemoryHost;
use tab_tree::persistence::{
    FAVICONS_KEY, FileStorage, MemoryStorage, PersistenceGateway, SCHEMA_VERSION, StorageBackend,
    TITLES_KEY, TREE_STATE_KEY,
};
use tab_tree::tree::ViewTemplate;
use tempfile::tempdir;

#[tokio::test]
async fn test_file_storage_round_trip_through_engine() {
    let dir = tempdir().unwrap();
    let storage = Arc::new(FileStorage::new(dir.path().join("state")));
    let host = Arc::new(InMemoryHost::with_windows(&[2]));
    host.set_title(1, "Inbox");

    let ctx = TestContext::start_with(host.clone(), storage.clone(), EngineSettings::default()).await;
    ctx.sync_host().await;
    ctx.shutdown().await;

    for key in [TREE_STATE_KEY, TITLES_KEY, FAVICONS_KEY] {
        assert!(storage.path_for(key).exists(), "{key} not written");
    }
    assert_eq!(
        storage.get(TITLES_KEY).await.unwrap(),
        Some(json!({"1": "Inbox"}))
    );

    let gateway = PersistenceGateway::new(storage, Duration::from_millis(10));
    let loaded = gateway.load(ViewTemplate::default()).await.unwrap();
    assert_eq!(loaded.store.root_tab_ids(1, 0), vec![1, 2]);
    assert_eq!(loaded.store.title(1), Some("Inbox"));
}

#[tokio::test]
async fn test_legacy_blob_is_migrated_on_next_save() {
    let legacy = json!([{
        "windowId": 1,
        "views": [{
            "name": "Main",
            "color": "#123456",
            "rootNodes": [{
                "tabId": 1,
                "isExpanded": false,
                "children": [{"tabId": 2, "isExpanded": true, "children": []}]
            }]
        }],
        "activeViewIndex": 0,
        "pinnedTabIds": [1]
    }]);
    let storage = Arc::new(MemoryStorage::new().with_entry(TREE_STATE_KEY, legacy));

    let ctx = TestContext::start_with(
        Arc::new(InMemoryHost::with_windows(&[2])),
        storage.clone(),
        EngineSettings::default(),
    )
    .await;
    assert_eq!(ctx.engine.bootstrap.from_version, Some(1));

    let store = ctx.store().await;
    assert!(store.is_child_of(2, 1));
    assert!(!store.node_by_tab(1).unwrap().is_expanded);
    // Pinned state follows the live browser, which has nothing pinned
    assert!(store.window(1).unwrap().pinned_tab_ids.is_empty());
    assert_eq!(store.get_view(1, 0).unwrap().name, "Main");
    ctx.shutdown().await;

    let saved = storage.peek(TREE_STATE_KEY).unwrap();
    assert_eq!(saved["schemaVersion"], SCHEMA_VERSION);
    let root = &saved["windows"][0]["views"][0]["rootNodes"][0];
    assert_eq!(root["kind"], "tab");
    assert_eq!(root["isExpanded"], false);
    assert_eq!(root["children"][0]["tabId"], 2);
}

#[tokio::test]
async fn test_newer_schema_blocks_startup() {
    let storage = Arc::new(MemoryStorage::new().with_entry(
        TREE_STATE_KEY,
        json!({"schemaVersion": 99, "windows": []}),
    ));
    let result = tab_tree::Engine::start(
        EngineSettings::default(),
        Arc::new(InMemoryHost::with_windows(&[1])),
        storage.clone(),
    )
    .await;

    assert!(matches!(
        result,
        Err(tab_tree::EngineError::Storage(
            tab_tree::StorageError::UnsupportedVersion { found: 99, .. }
        ))
    ));
    // Left untouched for the newer build
    assert_eq!(storage.write_count(), 0);
}

#[tokio::test]
async fn test_groups_and_views_persist() {
    let storage = Arc::new(MemoryStorage::new().with_entry(
        TREE_STATE_KEY,
        persisted_tree(json!([{
            "windowId": 1,
            "views": [
                {"name": "Default", "color": "#4a90d9", "rootNodes": [
                    {"kind": "group", "tabId": 3, "name": "Reading", "color": "#0f0",
                     "children": [{"kind": "tab", "tabId": 1}]}
                ]},
                {"name": "Later", "color": "#999", "icon": "clock", "rootNodes": [
                    {"kind": "tab", "tabId": 2}
                ]}
            ],
            "activeViewIndex": 1,
            "pinnedTabIds": []
        }])),
    ));
    let ctx = TestContext::start_with(
        Arc::new(InMemoryHost::with_windows(&[3])),
        storage.clone(),
        EngineSettings::default(),
    )
    .await;

    let store = ctx.store().await;
    let group = store.node_by_tab(3).unwrap();
    assert_eq!(group.group_info.as_ref().unwrap().name, "Reading");
    assert!(store.is_child_of(1, 3));
    assert_eq!(store.root_tab_ids(1, 1), vec![2]);
    assert_eq!(store.window(1).unwrap().active_view_index, 1);
    assert_eq!(store.get_view(1, 1).unwrap().icon.as_deref(), Some("clock"));
    ctx.shutdown().await;

    let saved = storage.peek(TREE_STATE_KEY).unwrap();
    assert_eq!(saved["windows"][0]["views"][0]["rootNodes"][0]["kind"], "group");
    assert_eq!(saved["windows"][0]["views"][1]["icon"], "clock");
}

#[tokio::test]
async fn test_missing_keys_start_empty() {
    let storage: Arc<dyn StorageBackend> = Arc::new(MemoryStorage::new());
    let ctx = TestContext::start_with(
        Arc::new(InMemoryHost::with_windows(&[1])),
        storage,
        EngineSettings::default(),
    )
    .await;
    assert_eq!(ctx.engine.bootstrap.from_version, None);
    assert_eq!(ctx.engine.bootstrap.restored_tabs, 0);
    assert_eq!(ctx.engine.bootstrap.adopted_tab_ids, vec![1]);
}
