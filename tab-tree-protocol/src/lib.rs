//! JSON protocol types for the tab-tree engine.
//!
//! Two directions are covered:
//!
//! - [`control`]: request/response messages exchanged with the UI layer.
//!   Every request is answered with a [`ControlResponse`] shaped
//!   `{success, data?, error?}`.
//! - [`events`]: the tab/window lifecycle feed delivered by the host browser.

pub mod control;
pub mod events;

pub use control::{ControlRequest, ControlResponse, DragEndReason};
pub use events::{TabChange, TabEvent, TabStatus};
