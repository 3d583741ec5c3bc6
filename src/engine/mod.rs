//! The event loop that owns the tree.
//!
//! Host events and UI control requests share one ordered queue and are
//! handled one at a time by a single task, so every mutation of the
//! [`TreeStateStore`] happens synchronously inside one step. Reads are served
//! from memory; persistence trails behind through the debounced
//! [`PersistenceGateway`].
//!
//! ```text
//! host feed ──┐                 ┌── TreeStateStore
//!             ├─▶ mpsc ─▶ loop ─┼── DragSessionManager
//! UI control ─┘                 ├── TabHost (async calls)
//!                               └── PersistenceGateway ─▶ StorageBackend
//! ```

mod bootstrap;
mod control;
mod events;
pub mod state;

pub use bootstrap::BootstrapReport;
pub use state::{NodeSnapshot, StateSnapshot, ViewSnapshot, WindowSnapshot};

use crate::drag::{DragSessionManager, DragState};
use crate::error::EngineError;
use crate::host::TabHost;
use crate::persistence::{PersistenceGateway, StorageBackend};
use crate::protocol::{ControlRequest, ControlResponse, TabEvent};
use crate::reconcile::{ReconcileReport, Reconciliation, reconcile};
use crate::tree::{TreeStateStore, ViewTemplate};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tab_tree_config::{Config, GroupDeletePolicy};
use uuid::Uuid;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior};

/// Queue depth between handles and the loop
const QUEUE_CAPACITY: usize = 256;

/// Buffered notifications per subscriber before it starts lagging
const NOTIFY_CAPACITY: usize = 64;

/// Behavior knobs, usually taken from [`Config`]
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub debounce: Duration,
    pub reconcile_interval: Option<Duration>,
    pub auto_close_empty_source_window: bool,
    pub expand_parent_on_new_child: bool,
    pub group_delete_policy: GroupDeletePolicy,
    pub view_template: ViewTemplate,
}

impl EngineSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            debounce: config.persistence_debounce(),
            reconcile_interval: config.reconcile_interval(),
            auto_close_empty_source_window: config.auto_close_empty_source_window,
            expand_parent_on_new_child: config.expand_parent_on_new_child,
            group_delete_policy: config.group_delete_policy,
            view_template: ViewTemplate {
                name: config.default_view_name.clone(),
                color: config.default_view_color.clone(),
            },
        }
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Pushed to subscribers after the loop changes state
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(
    tag = "type",
    rename_all = "SCREAMING_SNAKE_CASE",
    rename_all_fields = "camelCase"
)]
pub enum EngineNotification {
    /// The tree changed; `revision` is the store revision after the change
    StateChanged { revision: u64 },
    /// A drag session started, changed state or ended. Not persisted.
    DragSessionChanged { state: DragState },
}

enum EngineMessage {
    HostEvent(TabEvent),
    Control(ControlRequest, oneshot::Sender<ControlResponse>),
    Inspect(oneshot::Sender<TreeStateStore>),
    Shutdown(oneshot::Sender<()>),
}

/// Cloneable entry point to a running engine.
#[derive(Clone)]
pub struct EngineHandle {
    tx: mpsc::Sender<EngineMessage>,
    notify: broadcast::Sender<EngineNotification>,
}

impl EngineHandle {
    /// Send a control request and wait for its response
    pub async fn request(&self, request: ControlRequest) -> Result<ControlResponse, EngineError> {
        let (reply, rx) = oneshot::channel();
        self.send(EngineMessage::Control(request, reply)).await?;
        rx.await.map_err(|_| EngineError::EngineStopped)
    }

    /// Queue a host event. Returns once queued, not once applied.
    pub async fn send_event(&self, event: TabEvent) -> Result<(), EngineError> {
        self.send(EngineMessage::HostEvent(event)).await
    }

    /// Queue several host events in order
    pub async fn send_events(
        &self,
        events: impl IntoIterator<Item = TabEvent>,
    ) -> Result<(), EngineError> {
        for event in events {
            self.send_event(event).await?;
        }
        Ok(())
    }

    /// Run a reconciliation pass now
    pub async fn reconcile(&self) -> Result<ControlResponse, EngineError> {
        self.request(ControlRequest::Reconcile).await
    }

    /// Copy of the store as of every message queued before this call
    pub async fn snapshot(&self) -> Result<TreeStateStore, EngineError> {
        let (reply, rx) = oneshot::channel();
        self.send(EngineMessage::Inspect(reply)).await?;
        rx.await.map_err(|_| EngineError::EngineStopped)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EngineNotification> {
        self.notify.subscribe()
    }

    /// Flush pending state to storage and stop the loop
    pub async fn shutdown(&self) -> Result<(), EngineError> {
        let (reply, rx) = oneshot::channel();
        self.send(EngineMessage::Shutdown(reply)).await?;
        rx.await.map_err(|_| EngineError::EngineStopped)
    }

    async fn send(&self, message: EngineMessage) -> Result<(), EngineError> {
        self.tx
            .send(message)
            .await
            .map_err(|_| EngineError::EngineStopped)
    }
}

/// A started engine: the handle plus what bootstrap found
pub struct RunningEngine {
    pub handle: EngineHandle,
    pub bootstrap: BootstrapReport,
    pub task: JoinHandle<()>,
}

pub struct Engine {
    store: TreeStateStore,
    drag: DragSessionManager,
    host: Arc<dyn TabHost>,
    gateway: PersistenceGateway,
    settings: EngineSettings,
    notify: broadcast::Sender<EngineNotification>,
    last_revision: u64,
    /// Session id and state as of the last notification
    last_drag: Option<(Uuid, DragState)>,
}

impl Engine {
    /// Load persisted state, sync it with the host and spawn the loop.
    ///
    /// Fails only when storage holds something this build must not
    /// overwrite (a newer schema) or cannot be read at all.
    pub async fn start(
        settings: EngineSettings,
        host: Arc<dyn TabHost>,
        backend: Arc<dyn StorageBackend>,
    ) -> Result<RunningEngine, EngineError> {
        let mut gateway = PersistenceGateway::new(backend, settings.debounce);
        let (store, report) =
            bootstrap::bootstrap(host.as_ref(), &gateway, settings.view_template.clone()).await?;
        gateway.mark_dirty();

        let (tx, rx) = mpsc::channel(QUEUE_CAPACITY);
        let (notify, _) = broadcast::channel(NOTIFY_CAPACITY);
        let engine = Engine {
            last_revision: store.revision(),
            store,
            drag: DragSessionManager::new(),
            host,
            gateway,
            settings,
            notify: notify.clone(),
            last_drag: None,
        };
        let task = tokio::spawn(engine.run(rx));

        Ok(RunningEngine {
            handle: EngineHandle { tx, notify },
            bootstrap: report,
            task,
        })
    }

    async fn run(mut self, mut rx: mpsc::Receiver<EngineMessage>) {
        log::info!("Tab tree engine started with {} tabs", self.store.len());
        let mut reconcile_timer = self.settings.reconcile_interval.map(|period| {
            let mut timer = tokio::time::interval_at(Instant::now() + period, period);
            timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
            timer
        });

        loop {
            let deadline = self.gateway.deadline();
            tokio::select! {
                message = rx.recv() => {
                    let Some(message) = message else {
                        log::debug!("All engine handles dropped");
                        break;
                    };
                    if let EngineMessage::Shutdown(ack) = message {
                        self.flush_all().await;
                        let _ = ack.send(());
                        log::info!("Tab tree engine stopped");
                        return;
                    }
                    self.handle(message).await;
                }
                () = wait_until(deadline) => {
                    if let Err(e) = self.gateway.flush(&self.store) {
                        log::error!("Failed to save tree state: {}", e);
                    }
                }
                () = next_tick(&mut reconcile_timer) => {
                    match self.run_reconcile().await {
                        Ok(report) if !report.is_empty() => log::info!(
                            "Periodic reconcile removed {} tabs and {} windows",
                            report.removed_tab_ids.len(),
                            report.pruned_window_ids.len()
                        ),
                        Ok(_) => {}
                        Err(e) => log::warn!("Periodic reconcile failed: {}", e),
                    }
                }
            }
            self.publish_changes();
        }

        self.flush_all().await;
        log::info!("Tab tree engine stopped");
    }

    async fn handle(&mut self, message: EngineMessage) {
        match message {
            EngineMessage::HostEvent(event) => self.apply_event(event),
            EngineMessage::Control(request, reply) => {
                let response = self.handle_control(request).await;
                let _ = reply.send(response);
            }
            EngineMessage::Inspect(reply) => {
                let _ = reply.send(self.store.clone());
            }
            EngineMessage::Shutdown(ack) => {
                let _ = ack.send(());
            }
        }
    }

    /// Schedule a save and notify subscribers if the last step changed the
    /// tree, and notify them if it moved the drag session along
    fn publish_changes(&mut self) {
        // No subscribers is fine
        let revision = self.store.revision();
        if revision != self.last_revision {
            self.last_revision = revision;
            self.gateway.mark_dirty();
            let _ = self.notify.send(EngineNotification::StateChanged { revision });
        }

        let drag = self.drag.get().map(|s| (s.session_id, s.state));
        if drag != self.last_drag {
            self.last_drag = drag;
            let _ = self.notify.send(EngineNotification::DragSessionChanged {
                state: self.drag.state(),
            });
        }
    }

    async fn flush_all(&mut self) {
        match self.gateway.flush_and_wait(&self.store).await {
            Ok(0) => {}
            Ok(count) => log::debug!("Final flush wrote {} keys", count),
            Err(e) => log::error!("Final save failed: {}", e),
        }
    }

    /// Prune ghosts against the host's live tabs and drop dead empty windows
    async fn run_reconcile(&mut self) -> Result<ReconcileReport, EngineError> {
        let live_tabs = self.host.live_tab_ids().await?;
        let live_windows = self.host.live_window_ids().await?;

        let Reconciliation {
            tree,
            removed_tab_ids,
        } = reconcile(&live_tabs, &self.store);
        self.store = tree;
        let pruned_window_ids = self.store.prune_windows(&live_windows);

        if let Some(session) = self.drag.get()
            && !self.store.contains_tab(session.tab_id)
        {
            log::info!(
                "Ending drag session {}: tab {} no longer exists",
                session.session_id,
                session.tab_id
            );
            self.drag.end(&crate::protocol::DragEndReason::Cancelled);
        }

        Ok(ReconcileReport {
            removed_tab_ids,
            pruned_window_ids,
        })
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

async fn next_tick(timer: &mut Option<Interval>) {
    match timer {
        Some(timer) => {
            timer.tick().await;
        }
        None => std::future::pending().await,
    }
}
