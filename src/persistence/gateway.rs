//! Debounced persistence of the authoritative tree.
//!
//! The engine calls [`PersistenceGateway::mark_dirty`] after every mutation and
//! [`PersistenceGateway::flush`] once [`PersistenceGateway::deadline`] passes.
//! A burst of mutations therefore turns into one write per changed key after a
//! quiet period, capped so a steady stream cannot postpone saving forever.
//!
//! Writes run on a dedicated task fed by an ordered channel, so the event loop
//! never waits on storage and later snapshots always land after earlier ones.

use super::backend::StorageBackend;
use super::capture::{Snapshot, capture};
use super::restore::restore;
use super::schema::{decode_tree, encode_tree};
use super::{FAVICONS_KEY, TITLES_KEY, TREE_STATE_KEY};
use crate::error::StorageError;
use crate::tree::{TreeStateStore, ViewTemplate};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tab_tree_config::TabId;
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;

/// A dirty store is written at the latest this many debounce windows after
/// it first became dirty
const MAX_DELAY_FACTOR: u32 = 10;

/// Result of [`PersistenceGateway::load`]
#[derive(Debug)]
pub struct LoadedState {
    pub store: TreeStateStore,
    /// Schema version found in storage; `None` when nothing was stored
    pub from_version: Option<u64>,
}

impl LoadedState {
    /// Whether the stored blob was written by an older schema
    pub fn migrated(&self) -> bool {
        self.from_version
            .is_some_and(|v| v != super::SCHEMA_VERSION)
    }
}

enum WriterCommand {
    Write(Vec<(&'static str, Value)>),
    Flush(oneshot::Sender<()>),
}

/// Last value handed to the writer, per key. The writer drops an entry
/// whose write failed so the next flush queues that key again.
type Queued = Arc<Mutex<HashMap<&'static str, Value>>>;

pub struct PersistenceGateway {
    backend: Arc<dyn StorageBackend>,
    debounce: Duration,
    dirty_since: Option<Instant>,
    deadline: Option<Instant>,
    queued: Queued,
    writer: mpsc::UnboundedSender<WriterCommand>,
}

impl PersistenceGateway {
    /// Create the gateway and spawn its writer task. Needs a tokio runtime.
    pub fn new(backend: Arc<dyn StorageBackend>, debounce: Duration) -> Self {
        let (writer, rx) = mpsc::unbounded_channel();
        let queued: Queued = Arc::default();
        tokio::spawn(run_writer(Arc::clone(&backend), Arc::clone(&queued), rx));
        Self {
            backend,
            debounce,
            dirty_since: None,
            deadline: None,
            queued,
            writer,
        }
    }

    /// Read every key and rebuild the tree. Missing keys read as empty.
    pub async fn load(&self, template: ViewTemplate) -> Result<LoadedState, StorageError> {
        let titles = self.load_map(TITLES_KEY).await?;
        let favicons = self.load_map(FAVICONS_KEY).await?;

        let Some(value) = self.backend.get(TREE_STATE_KEY).await? else {
            log::info!("No persisted tree found, starting empty");
            return Ok(LoadedState {
                store: TreeStateStore::new(template),
                from_version: None,
            });
        };

        let decoded = decode_tree(value)?;
        if decoded.migrated() {
            log::info!(
                "Persisted tree is schema v{}, will be rewritten at the current version",
                decoded.from_version
            );
        }
        Ok(LoadedState {
            store: restore(&decoded.tree, &titles, &favicons, template),
            from_version: Some(decoded.from_version),
        })
    }

    async fn load_map(&self, key: &'static str) -> Result<BTreeMap<TabId, String>, StorageError> {
        match self.backend.get(key).await? {
            None => Ok(BTreeMap::new()),
            Some(value) => {
                serde_json::from_value(value).map_err(|source| StorageError::Deserialize {
                    key: key.to_string(),
                    source,
                })
            }
        }
    }

    /// Note a mutation; pushes the deadline out by one debounce window
    pub fn mark_dirty(&mut self) {
        let now = Instant::now();
        let since = *self.dirty_since.get_or_insert(now);
        let latest = since + self.debounce * MAX_DELAY_FACTOR;
        self.deadline = Some((now + self.debounce).min(latest));
    }

    pub fn is_dirty(&self) -> bool {
        self.deadline.is_some()
    }

    /// When the pending write is due, if any
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Queue a write of every key whose value differs from the last one
    /// queued, even if that one has not reached storage yet. Returns the
    /// number of keys queued.
    pub fn flush(&mut self, store: &TreeStateStore) -> Result<usize, StorageError> {
        self.dirty_since = None;
        self.deadline = None;

        let mut batch = Vec::new();
        {
            let mut queued = self.queued.lock();
            for (key, value) in encode_entries(&capture(store))? {
                if queued.get(key) != Some(&value) {
                    queued.insert(key, value.clone());
                    batch.push((key, value));
                }
            }
        }

        let count = batch.len();
        if count > 0 {
            crate::debug_info!("PERSIST", "Queued write of {} keys", count);
            if let Err(mpsc::error::SendError(WriterCommand::Write(lost))) =
                self.writer.send(WriterCommand::Write(batch))
            {
                log::error!("Persistence writer has stopped; state not saved");
                let mut queued = self.queued.lock();
                for (key, _) in lost {
                    queued.remove(key);
                }
            }
        }
        Ok(count)
    }

    /// Flush and wait until every queued write has reached the backend
    pub async fn flush_and_wait(&mut self, store: &TreeStateStore) -> Result<usize, StorageError> {
        let count = self.flush(store)?;
        let (tx, rx) = oneshot::channel();
        if self.writer.send(WriterCommand::Flush(tx)).is_ok() {
            let _ = rx.await;
        }
        Ok(count)
    }

}

/// One JSON value per storage key
fn encode_entries(snapshot: &Snapshot) -> Result<[(&'static str, Value); 3], StorageError> {
    let serialize = |key: &'static str| {
        move |source: serde_json::Error| StorageError::Serialize {
            key: key.to_string(),
            source,
        }
    };
    Ok([
        (TREE_STATE_KEY, encode_tree(&snapshot.tree)?),
        (
            TITLES_KEY,
            serde_json::to_value(&snapshot.titles).map_err(serialize(TITLES_KEY))?,
        ),
        (
            FAVICONS_KEY,
            serde_json::to_value(&snapshot.favicons).map_err(serialize(FAVICONS_KEY))?,
        ),
    ])
}

async fn run_writer(
    backend: Arc<dyn StorageBackend>,
    queued: Queued,
    mut rx: mpsc::UnboundedReceiver<WriterCommand>,
) {
    while let Some(command) = rx.recv().await {
        match command {
            WriterCommand::Write(batch) => {
                for (key, value) in batch {
                    if let Err(e) = backend.set(key, value.clone()).await {
                        log::error!("Failed to persist '{}': {}", key, e);
                        // A newer value queued behind this one will be written anyway
                        let mut queued = queued.lock();
                        if queued.get(key) == Some(&value) {
                            queued.remove(key);
                        }
                    }
                }
            }
            WriterCommand::Flush(ack) => {
                let _ = ack.send(());
            }
        }
    }
    log::debug!("Persistence writer stopped");
}
