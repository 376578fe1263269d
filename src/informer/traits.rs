//! Backend watch strategies consumed by the informer manager.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::error::InformerError;
use super::types::{EventSink, InformerStateEvent, InformerSyncPolicy, ResourceMeta};
use crate::cancel::CancelSignal;
use crate::context::PluginContext;

/// Builds an informer handle bound to a live client.
#[async_trait]
pub trait InformerFactory<C>: Send + Sync
where
    C: Send + Sync + 'static,
{
    async fn create(
        &self,
        ctx: &PluginContext,
        client: Arc<C>,
    ) -> anyhow::Result<Arc<dyn InformerHandle>>;
}

/// Per-connection watch machinery supplied by a backend.
#[async_trait]
pub trait InformerHandle: Send + Sync {
    /// Register a resource type.
    ///
    /// Create, update and delete events for the resource must be sent on
    /// `events`, in the order the backend observed them. Return
    /// [`InformerError::ResourceSkipped`] when the resource must never be
    /// watched.
    async fn register_resource(
        &self,
        ctx: &PluginContext,
        resource: &ResourceMeta,
        policy: InformerSyncPolicy,
        events: EventSink,
    ) -> Result<(), InformerError>;

    /// Run the watch loop for every `OnConnect` resource.
    ///
    /// Blocks until `cancel` fires or `ctx` is done. Sends on `states` and on
    /// the registered event sink must be abandoned once `cancel` fires.
    /// Returning for any other reason marks the connection's eager resources
    /// `Error` and lets the connection be started again.
    async fn start(
        &self,
        ctx: &PluginContext,
        cancel: CancelSignal,
        states: mpsc::Sender<InformerStateEvent>,
    ) -> Result<(), InformerError>;

    /// Lazily start one resource.
    ///
    /// Performs the initial list and reports exactly one `Synced` or `Error`
    /// transition on `states` before returning. A watch left running after
    /// the call must deliver through the queues given at registration and
    /// stop when `cancel` fires.
    async fn start_resource(
        &self,
        ctx: &PluginContext,
        cancel: CancelSignal,
        resource: &ResourceMeta,
        states: mpsc::Sender<InformerStateEvent>,
    ) -> Result<(), InformerError>;

    /// Release backend resources. Called once when the informer stops.
    fn stop(&self);
}
