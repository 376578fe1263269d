//! Sequencing of the connection and informer managers.
//!
//! The managers never call each other. The controller starts an informer
//! only once its client is up, and stops the informer before the client.

use std::sync::Arc;

use thiserror::Error;

use crate::connection::{
    Connection, ConnectionError, ConnectionManager, ConnectionStatus, ConnectionStatusCode,
};
use crate::context::PluginContext;
use crate::error::{ErrorPayload, IntoErrorPayload};
use crate::informer::{InformerError, InformerManager, InformerSyncPolicy, ResourceMeta};

#[derive(Debug, Error)]
pub enum ControllerError {
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    #[error(transparent)]
    Informer(#[from] InformerError),
}

impl IntoErrorPayload for ControllerError {
    fn error_code(&self) -> &'static str {
        match self {
            ControllerError::Connection(err) => err.error_code(),
            ControllerError::Informer(err) => err.error_code(),
        }
    }

    fn to_payload(&self) -> ErrorPayload {
        match self {
            ControllerError::Connection(err) => err.to_payload(),
            ControllerError::Informer(err) => err.to_payload(),
        }
    }
}

/// Drives both managers through a connection's start/stop lifecycle.
pub struct PluginController<C> {
    connections: Arc<ConnectionManager<C>>,
    informers: Arc<InformerManager<C>>,
    resources: Vec<(ResourceMeta, InformerSyncPolicy)>,
}

impl<C> PluginController<C>
where
    C: Send + Sync + 'static,
{
    pub fn new(connections: Arc<ConnectionManager<C>>, informers: Arc<InformerManager<C>>) -> Self {
        Self {
            connections,
            informers,
            resources: Vec::new(),
        }
    }

    /// Add a resource type registered on every started connection.
    pub fn with_resource(mut self, resource: ResourceMeta, policy: InformerSyncPolicy) -> Self {
        self.resources.push((resource, policy));
        self
    }

    pub fn connections(&self) -> &Arc<ConnectionManager<C>> {
        &self.connections
    }

    pub fn informers(&self) -> &Arc<InformerManager<C>> {
        &self.informers
    }

    /// Start the client, then build, register and start the informer.
    ///
    /// The informer is only started when the health check reports the
    /// connection `Connected`, or `Unknown` when no checker is configured.
    /// Any other status is returned as-is with no informer.
    pub async fn start_connection(
        &self,
        ctx: &PluginContext,
        id: &str,
    ) -> Result<ConnectionStatus, ControllerError> {
        let status = self.connections.start_connection(ctx, id).await?;
        if !matches!(
            status.status,
            ConnectionStatusCode::Connected | ConnectionStatusCode::Unknown
        ) {
            tracing::info!(connection = %id, status = %status.status, "Informer not started");
            return Ok(status);
        }

        if !self.informers.has_informer(id) {
            let client = self.connections.get_connection_client(id).await?;
            self.informers
                .create_connection_informer(ctx, id, client)
                .await?;
            for (resource, policy) in &self.resources {
                self.informers
                    .register_resource(ctx, id, resource.clone(), *policy)
                    .await?;
            }
        }

        self.informers.start_connection(ctx, id).await?;
        Ok(status)
    }

    /// Stop the informer (if any), then the client.
    pub async fn stop_connection(
        &self,
        ctx: &PluginContext,
        id: &str,
    ) -> Result<Connection, ControllerError> {
        if self.informers.has_informer(id) {
            self.informers.stop_connection(id).await?;
        }
        Ok(self.connections.stop_connection(ctx, id).await?)
    }

    pub async fn ensure_resource(
        &self,
        ctx: &PluginContext,
        id: &str,
        resource_key: &str,
    ) -> Result<(), ControllerError> {
        Ok(self.informers.ensure_resource(ctx, id, resource_key).await?)
    }
}
