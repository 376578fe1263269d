//! Runtime core for resource-browsing plugins.
//!
//! - [`connection::ConnectionManager`] owns per-tenant connection records and
//!   the authenticated clients built for them.
//! - [`informer::InformerManager`] owns per-connection watch streams, tracks
//!   the sync state of every registered resource type and multiplexes all
//!   events into the host's output queues.
//! - [`controller::PluginController`] sequences the two through a
//!   connection's start/stop lifecycle.
//!
//! Backends plug in through the strategy traits re-exported below.

pub mod cancel;
pub mod config;
pub mod connection;
pub mod context;
pub mod controller;
pub mod error;
pub mod informer;
pub mod logging;

pub use cancel::CancelSignal;
pub use context::PluginContext;
pub use controller::{ControllerError, PluginController};
pub use error::{ErrorPayload, IntoErrorPayload};
