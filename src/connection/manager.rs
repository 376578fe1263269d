//! Connection manager.
//!
//! Keeps the connection records and their clients in two maps guarded by a
//! single read-write lock. Every path that writes either map takes the
//! write half, including client refreshes.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use tokio::sync::RwLock;

use super::error::ConnectionError;
use super::traits::{ClientFactory, ConnectionLoader, HealthChecker, NamespaceLoader};
use super::types::{Connection, ConnectionStatus, ConnectionStatusCode};
use crate::config::ConnectionsConfig;
use crate::context::PluginContext;

/// Expiry stamped on a connection after a successful start.
pub const DEFAULT_CONNECTION_EXPIRY: Duration = Duration::from_secs(24 * 60 * 60);

struct ConnectionMaps<C> {
    connections: HashMap<String, Connection>,
    clients: HashMap<String, Arc<C>>,
}

/// Owns authenticated per-tenant clients and their connection records.
pub struct ConnectionManager<C> {
    factory: Arc<dyn ClientFactory<C>>,
    loader: Option<Arc<dyn ConnectionLoader>>,
    checker: Option<Arc<dyn HealthChecker<C>>>,
    namespace_loader: Option<Arc<dyn NamespaceLoader<C>>>,
    expiry: Duration,
    // The lock is held across factory calls in create/delete so the
    // existence check and the map write stay atomic.
    inner: RwLock<ConnectionMaps<C>>,
}

impl<C> ConnectionManager<C>
where
    C: Send + Sync + 'static,
{
    pub fn new(factory: Arc<dyn ClientFactory<C>>) -> Self {
        Self {
            factory,
            loader: None,
            checker: None,
            namespace_loader: None,
            expiry: DEFAULT_CONNECTION_EXPIRY,
            inner: RwLock::new(ConnectionMaps {
                connections: HashMap::new(),
                clients: HashMap::new(),
            }),
        }
    }

    pub fn with_loader(mut self, loader: Arc<dyn ConnectionLoader>) -> Self {
        self.loader = Some(loader);
        self
    }

    pub fn with_health_checker(mut self, checker: Arc<dyn HealthChecker<C>>) -> Self {
        self.checker = Some(checker);
        self
    }

    pub fn with_namespace_loader(mut self, loader: Arc<dyn NamespaceLoader<C>>) -> Self {
        self.namespace_loader = Some(loader);
        self
    }

    pub fn with_config(mut self, config: &ConnectionsConfig) -> Self {
        self.expiry = config.expiry();
        self
    }

    /// Merge connections from the loader into the known set.
    ///
    /// Additive only: connections missing from the load are kept, and known
    /// connections only gain map keys they did not have. Clients are created
    /// for any connection lacking one; creation failures are logged and the
    /// connection stays clientless.
    ///
    /// Returns every known connection sorted by id.
    pub async fn load_connections(
        &self,
        ctx: &PluginContext,
    ) -> Result<Vec<Connection>, ConnectionError> {
        let Some(loader) = &self.loader else {
            return Ok(Vec::new());
        };

        let loaded = loader.load(ctx).await?;

        let mut maps = self.inner.write().await;
        for record in loaded {
            if record.id.is_empty() {
                tracing::warn!(name = %record.name, "Skipping loaded connection without id");
                continue;
            }
            match maps.connections.entry(record.id.clone()) {
                Entry::Occupied(mut existing) => existing.get_mut().merge_missing(&record),
                Entry::Vacant(slot) => {
                    slot.insert(record);
                }
            }
        }

        let clientless: Vec<Connection> = maps
            .connections
            .values()
            .filter(|connection| !maps.clients.contains_key(&connection.id))
            .cloned()
            .collect();

        for connection in clientless {
            match self.factory.create(ctx, &connection).await {
                Ok(client) => {
                    maps.clients.insert(connection.id.clone(), Arc::new(client));
                }
                Err(err) => {
                    tracing::warn!(
                        connection = %connection.id,
                        error = %err,
                        "Failed to create client for loaded connection"
                    );
                }
            }
        }

        tracing::debug!(count = maps.connections.len(), "Connections loaded");
        Ok(sorted(maps.connections.values()))
    }

    /// All known connections sorted by id.
    pub async fn list_connections(&self) -> Vec<Connection> {
        let maps = self.inner.read().await;
        sorted(maps.connections.values())
    }

    pub async fn connection_ids(&self) -> Vec<String> {
        let maps = self.inner.read().await;
        let mut ids: Vec<String> = maps.connections.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub async fn get_connection(&self, id: &str) -> Result<Connection, ConnectionError> {
        let maps = self.inner.read().await;
        maps.connections
            .get(id)
            .cloned()
            .ok_or_else(|| ConnectionError::NotFound { id: id.to_string() })
    }

    pub async fn has_client(&self, id: &str) -> bool {
        self.inner.read().await.clients.contains_key(id)
    }

    /// Register a new connection and build its client.
    ///
    /// # Errors
    /// `AlreadyExists` if a record or client is already stored for the id.
    /// Nothing is stored when client creation fails.
    pub async fn create_connection(
        &self,
        ctx: &PluginContext,
        connection: Connection,
    ) -> Result<Connection, ConnectionError> {
        if connection.id.is_empty() {
            return Err(ConnectionError::Invalid {
                reason: "connection id must not be empty".to_string(),
            });
        }

        let mut maps = self.inner.write().await;
        if maps.clients.contains_key(&connection.id)
            || maps.connections.contains_key(&connection.id)
        {
            return Err(ConnectionError::AlreadyExists { id: connection.id });
        }

        let client = self.factory.create(ctx, &connection).await?;
        maps.clients.insert(connection.id.clone(), Arc::new(client));
        maps.connections.insert(connection.id.clone(), connection.clone());

        tracing::info!(connection = %connection.id, "Connection created");
        Ok(connection)
    }

    /// Apply a partial update to a stored connection.
    ///
    /// Empty scalar fields are ignored; label and data entries are upserted
    /// key by key, so unspecified fields are never erased.
    pub async fn update_connection(
        &self,
        update: Connection,
    ) -> Result<Connection, ConnectionError> {
        let mut maps = self.inner.write().await;
        let existing = maps
            .connections
            .get_mut(&update.id)
            .ok_or_else(|| ConnectionError::NotFound {
                id: update.id.clone(),
            })?;
        existing.apply_update(&update);
        Ok(existing.clone())
    }

    /// Stop the client (if any) and forget the connection.
    ///
    /// # Errors
    /// If stopping the client fails the record and client are kept.
    pub async fn delete_connection(
        &self,
        ctx: &PluginContext,
        id: &str,
    ) -> Result<Connection, ConnectionError> {
        let mut maps = self.inner.write().await;
        if !maps.connections.contains_key(id) && !maps.clients.contains_key(id) {
            return Err(ConnectionError::NotFound { id: id.to_string() });
        }

        if let Some(client) = maps.clients.get(id).cloned() {
            self.factory.stop(ctx, &client).await?;
        }

        maps.clients.remove(id);
        let removed = maps
            .connections
            .remove(id)
            .unwrap_or_else(|| Connection::new(id));

        tracing::info!(connection = %id, "Connection deleted");
        Ok(removed)
    }

    /// Start the client and check its health.
    ///
    /// Unknown connections and client start failures come back as a
    /// `Failed` status rather than an error. Only health-check errors
    /// propagate. On success the record is stamped with the refresh time
    /// and expiry window.
    pub async fn start_connection(
        &self,
        ctx: &PluginContext,
        id: &str,
    ) -> Result<ConnectionStatus, ConnectionError> {
        let (connection, client) = {
            let maps = self.inner.read().await;
            (
                maps.connections.get(id).cloned(),
                maps.clients.get(id).cloned(),
            )
        };

        let (Some(connection), Some(client)) = (connection, client) else {
            return Ok(ConnectionStatus::failed(
                Connection::new(id),
                format!("no client or connection for '{}'", id),
                "connection must be loaded or created before it can be started",
            ));
        };

        if let Err(err) = self.factory.start(ctx, &client).await {
            tracing::warn!(connection = %id, error = %err, "Failed to start client");
            return Ok(ConnectionStatus::failed(
                connection,
                format!("{:#}", err),
                "failed to start client",
            ));
        }

        let mut status = match &self.checker {
            Some(checker) => checker.check(ctx, &connection, &client).await?,
            None => ConnectionStatus::new(connection.clone(), ConnectionStatusCode::Unknown),
        };

        let mut maps = self.inner.write().await;
        let stored = maps
            .connections
            .get_mut(id)
            .ok_or_else(|| ConnectionError::NotFound { id: id.to_string() })?;
        stored.last_refresh = Some(SystemTime::now());
        stored.expiry_time = self.expiry;
        status.connection = stored.clone();

        tracing::info!(connection = %id, status = %status.status, "Connection started");
        Ok(status)
    }

    /// Stop the client and clear the refresh stamp.
    pub async fn stop_connection(
        &self,
        ctx: &PluginContext,
        id: &str,
    ) -> Result<Connection, ConnectionError> {
        let client = self.get_connection_client(id).await?;
        self.factory.stop(ctx, &client).await?;

        let mut maps = self.inner.write().await;
        let stored = maps
            .connections
            .get_mut(id)
            .ok_or_else(|| ConnectionError::NotFound { id: id.to_string() })?;
        stored.last_refresh = None;
        stored.expiry_time = Duration::ZERO;

        tracing::info!(connection = %id, "Connection stopped");
        Ok(stored.clone())
    }

    pub async fn get_connection_client(&self, id: &str) -> Result<Arc<C>, ConnectionError> {
        let maps = self.inner.read().await;
        maps.clients
            .get(id)
            .cloned()
            .ok_or_else(|| ConnectionError::ClientNotFound { id: id.to_string() })
    }

    /// Refresh a client through the factory and store the result.
    pub async fn refresh_connection_client(
        &self,
        ctx: &PluginContext,
        id: &str,
    ) -> Result<Arc<C>, ConnectionError> {
        let mut maps = self.inner.write().await;
        let current = maps
            .clients
            .get(id)
            .cloned()
            .ok_or_else(|| ConnectionError::ClientNotFound { id: id.to_string() })?;

        let refreshed = Arc::new(self.factory.refresh(ctx, &current).await?);
        maps.clients.insert(id.to_string(), Arc::clone(&refreshed));

        tracing::debug!(connection = %id, "Client refreshed");
        Ok(refreshed)
    }

    /// Client for the connection attached to `ctx`.
    pub async fn get_current_connection_client(
        &self,
        ctx: &PluginContext,
    ) -> Result<Arc<C>, ConnectionError> {
        let id = current_connection_id(ctx)?;
        self.get_connection_client(id).await
    }

    pub async fn refresh_current_connection_client(
        &self,
        ctx: &PluginContext,
    ) -> Result<Arc<C>, ConnectionError> {
        let id = current_connection_id(ctx)?;
        self.refresh_connection_client(ctx, id).await
    }

    /// Namespaces visible through the connection's client.
    ///
    /// Empty when no namespace loader is configured.
    pub async fn get_connection_namespaces(
        &self,
        ctx: &PluginContext,
        id: &str,
    ) -> Result<Vec<String>, ConnectionError> {
        let Some(loader) = &self.namespace_loader else {
            return Ok(Vec::new());
        };
        let client = self.get_connection_client(id).await?;
        Ok(loader.load(ctx, &client).await?)
    }
}

fn current_connection_id(ctx: &PluginContext) -> Result<&str, ConnectionError> {
    ctx.connection()
        .map(|connection| connection.id.as_str())
        .ok_or(ConnectionError::NoCurrentConnection)
}

fn sorted<'a>(connections: impl Iterator<Item = &'a Connection>) -> Vec<Connection> {
    let mut all: Vec<Connection> = connections.cloned().collect();
    all.sort_by(|a, b| a.id.cmp(&b.id));
    all
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Client carrying a generation number so refreshes are observable.
    struct Client {
        generation: u32,
    }

    #[derive(Default)]
    struct CountingFactory {
        refreshes: AtomicU32,
    }

    #[async_trait]
    impl ClientFactory<Client> for CountingFactory {
        async fn create(&self, _ctx: &PluginContext, _c: &Connection) -> anyhow::Result<Client> {
            Ok(Client { generation: 0 })
        }

        async fn start(&self, _ctx: &PluginContext, _client: &Client) -> anyhow::Result<()> {
            Ok(())
        }

        async fn stop(&self, _ctx: &PluginContext, _client: &Client) -> anyhow::Result<()> {
            Ok(())
        }

        async fn refresh(&self, _ctx: &PluginContext, client: &Client) -> anyhow::Result<Client> {
            self.refreshes.fetch_add(1, Ordering::SeqCst);
            Ok(Client {
                generation: client.generation + 1,
            })
        }
    }

    fn manager() -> ConnectionManager<Client> {
        ConnectionManager::new(Arc::new(CountingFactory::default()))
    }

    #[tokio::test]
    async fn refresh_replaces_stored_client() {
        let manager = manager();
        let ctx = PluginContext::new();
        manager
            .create_connection(&ctx, Connection::new("c1"))
            .await
            .unwrap();

        let refreshed = manager.refresh_connection_client(&ctx, "c1").await.unwrap();
        assert_eq!(refreshed.generation, 1);

        let stored = manager.get_connection_client("c1").await.unwrap();
        assert_eq!(stored.generation, 1);
    }

    #[tokio::test]
    async fn current_client_requires_context_connection() {
        let manager = manager();
        let ctx = PluginContext::new();
        manager
            .create_connection(&ctx, Connection::new("c1"))
            .await
            .unwrap();

        assert!(matches!(
            manager.get_current_connection_client(&ctx).await,
            Err(ConnectionError::NoCurrentConnection)
        ));

        let scoped = PluginContext::new().with_connection(Connection::new("c1"));
        let client = manager.refresh_current_connection_client(&scoped).await.unwrap();
        assert_eq!(client.generation, 1);
        assert_eq!(
            manager
                .get_current_connection_client(&scoped)
                .await
                .unwrap()
                .generation,
            1
        );
    }

    #[tokio::test]
    async fn empty_id_is_rejected() {
        let manager = manager();
        let result = manager
            .create_connection(&PluginContext::new(), Connection::default())
            .await;
        assert!(matches!(result, Err(ConnectionError::Invalid { .. })));
        assert!(manager.list_connections().await.is_empty());
    }

    #[tokio::test]
    async fn load_without_loader_is_noop() {
        let manager = manager();
        let loaded = manager.load_connections(&PluginContext::new()).await.unwrap();
        assert!(loaded.is_empty());
    }

    #[tokio::test]
    async fn namespaces_without_loader_are_empty() {
        let manager = manager();
        let namespaces = manager
            .get_connection_namespaces(&PluginContext::new(), "missing")
            .await
            .unwrap();
        assert!(namespaces.is_empty());
    }
}
