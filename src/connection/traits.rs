//! Backend strategies consumed by the connection manager.

use async_trait::async_trait;

use super::types::{Connection, ConnectionStatus};
use crate::context::PluginContext;

/// Builds and drives the authenticated client for one connection.
///
/// Pure strategy: implementations hold no per-connection state, the manager
/// owns the clients it returns.
#[async_trait]
pub trait ClientFactory<C>: Send + Sync
where
    C: Send + Sync + 'static,
{
    async fn create(&self, ctx: &PluginContext, connection: &Connection) -> anyhow::Result<C>;

    async fn start(&self, ctx: &PluginContext, client: &C) -> anyhow::Result<()>;

    async fn stop(&self, ctx: &PluginContext, client: &C) -> anyhow::Result<()>;

    /// Produce a refreshed client (e.g. after a credential rotation).
    ///
    /// The manager replaces the stored client with the returned one.
    async fn refresh(&self, ctx: &PluginContext, client: &C) -> anyhow::Result<C>;
}

/// Discovers connections from the host (kubeconfigs, cloud profiles, ...).
#[async_trait]
pub trait ConnectionLoader: Send + Sync {
    async fn load(&self, ctx: &PluginContext) -> anyhow::Result<Vec<Connection>>;
}

#[async_trait]
pub trait HealthChecker<C>: Send + Sync
where
    C: Send + Sync + 'static,
{
    async fn check(
        &self,
        ctx: &PluginContext,
        connection: &Connection,
        client: &C,
    ) -> anyhow::Result<ConnectionStatus>;
}

#[async_trait]
pub trait NamespaceLoader<C>: Send + Sync
where
    C: Send + Sync + 'static,
{
    async fn load(&self, ctx: &PluginContext, client: &C) -> anyhow::Result<Vec<String>>;
}
