//! Subcommand implementations

use super::RuntimeOptions;
use crate::engine::{Engine, EngineSettings, StateSnapshot};
use crate::host::InMemoryHost;
use crate::persistence::schema::{decode_tree, encode_tree};
use crate::persistence::{FileStorage, MemoryStorage, PersistenceGateway, StorageBackend, TREE_STATE_KEY};
use crate::protocol::{ControlRequest, TabEvent};
use crate::reconcile::reconcile;
use crate::tree::{TreeStateStore, ViewTemplate};
use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use tab_tree_config::{Config, NodeId, TabId};

/// Load and validate the config, then apply its log level
fn load_config(options: &RuntimeOptions) -> Result<Config> {
    let config = match &options.config_path {
        Some(path) => Config::load_from(path)
            .with_context(|| format!("Failed to load config from {:?}", path))?,
        None => Config::load().context("Failed to load config")?,
    };
    config.validate().context("Invalid config")?;
    crate::debug::apply_log_level(config.log_level, options.log_level.is_some());
    Ok(config)
}

fn file_storage(options: &RuntimeOptions, config: &Config) -> FileStorage {
    FileStorage::new(
        options
            .storage_dir
            .clone()
            .unwrap_or_else(|| config.effective_storage_dir()),
    )
}

fn view_template(config: &Config) -> ViewTemplate {
    EngineSettings::from_config(config).view_template
}

/// `tab-tree show`
pub async fn show_cli(options: &RuntimeOptions, json: bool) -> Result<()> {
    let config = load_config(options)?;
    let storage = Arc::new(file_storage(options, &config));
    let gateway = PersistenceGateway::new(storage.clone(), config.persistence_debounce());
    let loaded = gateway
        .load(view_template(&config))
        .await
        .with_context(|| format!("Failed to load tree state from {:?}", storage.dir()))?;

    if json {
        let snapshot = StateSnapshot::capture(&loaded.store, None);
        println!(
            "{}",
            serde_json::to_string_pretty(&snapshot).context("Failed to serialize state")?
        );
    } else if loaded.store.window_ids().is_empty() {
        println!("No tree state stored in {}", storage.dir().display());
    } else {
        print!("{}", render_outline(&loaded.store));
    }
    Ok(())
}

/// `tab-tree reconcile --live <ids>`
pub async fn reconcile_cli(options: &RuntimeOptions, live: &[TabId]) -> Result<()> {
    let config = load_config(options)?;
    let storage = Arc::new(file_storage(options, &config));
    let mut gateway = PersistenceGateway::new(storage.clone(), config.persistence_debounce());
    let loaded = gateway
        .load(view_template(&config))
        .await
        .with_context(|| format!("Failed to load tree state from {:?}", storage.dir()))?;

    let live: HashSet<TabId> = live.iter().copied().collect();
    let mut result = reconcile(&live, &loaded.store);
    // No live window list here: only windows left without tabs go
    let pruned_windows = result.tree.prune_windows(&HashSet::new());

    if result.removed_tab_ids.is_empty() && pruned_windows.is_empty() && !loaded.migrated() {
        println!("Nothing to prune; {} tabs all live", result.tree.len());
        return Ok(());
    }

    gateway
        .flush_and_wait(&result.tree)
        .await
        .context("Failed to save reconciled tree")?;
    println!(
        "Removed {} ghost tabs {:?} and {} empty windows {:?}",
        result.removed_tab_ids.len(),
        result.removed_tab_ids,
        pruned_windows.len(),
        pruned_windows
    );
    Ok(())
}

/// `tab-tree migrate`
pub async fn migrate_cli(options: &RuntimeOptions) -> Result<()> {
    let config = load_config(options)?;
    let storage = file_storage(options, &config);

    let Some(value) = storage
        .get(TREE_STATE_KEY)
        .await
        .context("Failed to read tree state")?
    else {
        println!("No tree state stored in {}", storage.dir().display());
        return Ok(());
    };

    let decoded = decode_tree(value).context("Failed to decode tree state")?;
    if !decoded.migrated() {
        println!(
            "Tree state is already at schema v{}",
            decoded.tree.schema_version
        );
        return Ok(());
    }

    let encoded = encode_tree(&decoded.tree)?;
    storage
        .set(TREE_STATE_KEY, encoded)
        .await
        .context("Failed to write migrated tree state")?;
    println!(
        "Migrated tree state from schema v{} to v{} ({} tabs)",
        decoded.from_version,
        decoded.tree.schema_version,
        decoded.tree.tab_count()
    );
    Ok(())
}

/// One line of a simulation script
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ScriptStep {
    Event(TabEvent),
    Control(ControlRequest),
}

/// `tab-tree simulate <script>`
///
/// Host events go straight to the engine. Control requests print their
/// response, after which the events the simulated browser produced while
/// serving them are fed back in.
pub async fn simulate_cli(options: &RuntimeOptions, script: &Path, windows: &[usize]) -> Result<()> {
    let config = load_config(options)?;
    let contents = tokio::fs::read_to_string(script)
        .await
        .with_context(|| format!("Failed to read script {:?}", script))?;

    let host = Arc::new(InMemoryHost::with_windows(windows));
    let engine = Engine::start(
        EngineSettings::from_config(&config),
        host.clone(),
        Arc::new(MemoryStorage::new()),
    )
    .await
    .context("Failed to start engine")?;
    let handle = engine.handle;

    for (number, line) in contents.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let step: ScriptStep = serde_json::from_str(line).with_context(|| {
            format!(
                "{}:{}: not a host event or control request",
                script.display(),
                number + 1
            )
        })?;
        match step {
            ScriptStep::Event(event) => handle.send_event(event).await?,
            ScriptStep::Control(request) => {
                let name = request.name();
                let response = handle.request(request).await?;
                println!("{} {}", name, serde_json::to_string(&response)?);
                handle.send_events(host.take_events()).await?;
            }
        }
    }

    let state = handle.request(ControlRequest::GetState).await?;
    println!("{}", serde_json::to_string_pretty(&state.data)?);
    handle.shutdown().await?;
    Ok(())
}

/// Indented text outline of every window, view and node
pub fn render_outline(store: &TreeStateStore) -> String {
    let mut lines = Vec::new();
    for window in store.windows() {
        lines.push(format!("Window {}", window.window_id));
        for (index, view) in window.views.iter().enumerate() {
            let marker = if index == window.active_view_index { "*" } else { " " };
            lines.push(format!(
                "{} View {}: {} ({})",
                marker, index, view.name, view.color
            ));
            for root in &view.root_nodes {
                outline_node(store, *root, &window.pinned_tab_ids, &mut lines);
            }
        }
    }
    let mut out = lines.join("\n");
    out.push('\n');
    out
}

fn outline_node(
    store: &TreeStateStore,
    node_id: NodeId,
    pinned: &std::collections::BTreeSet<TabId>,
    lines: &mut Vec<String>,
) {
    let Some(node) = store.node(node_id) else {
        return;
    };
    let mut line = format!("{}- tab {}", "  ".repeat(node.depth + 2), node.tab_id);
    if let Some(group) = &node.group_info {
        line.push_str(&format!(" [group {}]", group.name));
    }
    if let Some(title) = store.title(node.tab_id) {
        line.push_str(&format!(" {:?}", title));
    }
    if pinned.contains(&node.tab_id) {
        line.push_str(" (pinned)");
    }
    if !node.is_expanded && !node.children.is_empty() {
        line.push_str(" (collapsed)");
    }
    lines.push(line);
    for child in &node.children {
        outline_node(store, *child, pinned, lines);
    }
}
