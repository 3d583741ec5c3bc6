//! Tab tree model and its authoritative store.
//!
//! - [`types`]: plain data: nodes, views, window state, tab metadata
//! - [`TreeStateStore`]: the single-writer forest with its mutation API
//! - views and groups: view partitioning and group containers, as further
//!   `impl TreeStateStore` blocks

mod groups;
mod store;
pub mod types;
mod views;

pub use groups::NewGroup;
pub use store::TreeStateStore;
pub use types::{Node, TabMetadata, View, ViewTemplate, WindowState};
pub use views::ViewUpdate;
