//! Informer lifecycle management.
//!
//! Tracks one informer handle per connection together with the sync state
//! of every resource type registered on it, and multiplexes all watch
//! streams into the host's output queues through a single aggregator loop.

mod aggregator;
mod error;
mod manager;
mod traits;
mod types;

pub use error::InformerError;
pub use manager::InformerManager;
pub use traits::{InformerFactory, InformerHandle};
pub use types::{
    event_channels, EventReceivers, EventSenders, EventSink, InformerConnectionSummary,
    InformerResourceState, InformerStateEvent, InformerSyncPolicy, ResourceEvent, ResourceMeta,
    WatchEvent,
};
