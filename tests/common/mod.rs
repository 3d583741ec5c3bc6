//! Shared integration test helpers for tab-tree.
//!
//! # Usage
//!
//! ```ignore
//! mod common;
//! use common::TestContext;
//! ```
//!
//! Note: Rust integration tests use `mod common;` (not `use`) to bring in
//! helpers from `tests/common/mod.rs`. The `#[allow(dead_code)]` attribute
//! suppresses warnings when only a subset of helpers are used per file.

#![allow(dead_code)]

use serde_json::{Value, json};
use std::sync::Arc;
use tab_tree::host::InMemoryHost;
use tab_tree::persistence::{MemoryStorage, StorageBackend};
use tab_tree::protocol::{ControlRequest, ControlResponse};
use tab_tree::{Engine, EngineHandle, EngineSettings, RunningEngine, TreeStateStore};

/// A running engine wired to an in-memory browser and storage.
pub struct TestContext {
    pub host: Arc<InMemoryHost>,
    pub storage: Arc<dyn StorageBackend>,
    pub engine: RunningEngine,
}

impl TestContext {
    /// One window per entry of `tab_counts`, default settings, empty storage
    pub async fn start(tab_counts: &[usize]) -> Self {
        Self::start_with(
            Arc::new(InMemoryHost::with_windows(tab_counts)),
            Arc::new(MemoryStorage::new()),
            EngineSettings::default(),
        )
        .await
    }

    pub async fn start_with(
        host: Arc<InMemoryHost>,
        storage: Arc<dyn StorageBackend>,
        settings: EngineSettings,
    ) -> Self {
        let engine = Engine::start(settings, host.clone(), storage.clone())
            .await
            .expect("engine failed to start");
        Self {
            host,
            storage,
            engine,
        }
    }

    pub fn handle(&self) -> &EngineHandle {
        &self.engine.handle
    }

    /// Deliver every event the host produced since the last sync
    pub async fn sync_host(&self) {
        self.handle()
            .send_events(self.host.take_events())
            .await
            .expect("engine stopped");
    }

    pub async fn request(&self, request: ControlRequest) -> ControlResponse {
        self.handle().request(request).await.expect("engine stopped")
    }

    /// Request that must succeed; returns its data (null when empty)
    pub async fn request_ok(&self, request: ControlRequest) -> Value {
        let name = request.name();
        let response = self.request(request).await;
        assert!(
            response.success,
            "{} failed: {:?}",
            name,
            response.error
        );
        response.data.unwrap_or(Value::Null)
    }

    pub async fn store(&self) -> TreeStateStore {
        self.handle().snapshot().await.expect("engine stopped")
    }

    pub async fn node_id(&self, tab_id: u64) -> u64 {
        self.store()
            .await
            .node_id_for_tab(tab_id)
            .unwrap_or_else(|| panic!("tab {tab_id} not in tree"))
    }

    pub async fn shutdown(self) {
        self.handle().shutdown().await.expect("engine stopped");
    }
}

/// A current-schema tree blob holding `windows`
pub fn persisted_tree(windows: Value) -> Value {
    json!({ "schemaVersion": 2, "windows": windows })
}

/// A single-view window blob
pub fn persisted_window(window_id: u64, root_nodes: Value) -> Value {
    json!({
        "windowId": window_id,
        "views": [{ "name": "Default", "color": "#4a90d9", "rootNodes": root_nodes }],
        "activeViewIndex": 0,
        "pinnedTabIds": []
    })
}

/// Let spawned tasks (engine loop, storage writer) catch up
pub async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}
