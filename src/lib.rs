// Library exports for the engine, its CLI and integration tests
//
// # Concurrency Policy
//
// All tree state is owned by the engine task and mutated only from inside its
// event loop; nothing else holds a lock on it. Two lock types remain:
//
//   - `parking_lot::Mutex`: sync-only state shared with async code. The
//     guard is never held across an `.await` (storage maps, the in-memory
//     host, the gateway's written-value cache).
//
//   - `tokio::sync` channels: anything crossing the task boundary. Requests
//     and host events go through mpsc, replies through oneshot, change
//     notifications through broadcast.

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[macro_use]
pub mod debug;

pub mod cli;
pub mod drag;
pub mod engine;
pub mod error;
pub mod host;
pub mod persistence;
pub mod reconcile;
pub mod tree;

pub use tab_tree_config as config;
pub use tab_tree_protocol as protocol;

pub use engine::{Engine, EngineHandle, EngineNotification, EngineSettings, RunningEngine};
pub use error::{EngineError, HostError, StorageError, TreeError};
pub use tree::TreeStateStore;
