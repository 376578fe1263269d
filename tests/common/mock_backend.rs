//! Mock backend strategies for exercising the managers.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

use anyhow::bail;
use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use plugin_runtime::connection::{
    ClientFactory, Connection, ConnectionLoader, ConnectionStatus, ConnectionStatusCode,
    HealthChecker, NamespaceLoader,
};
use plugin_runtime::informer::{
    EventSink, InformerError, InformerFactory, InformerHandle, InformerResourceState,
    InformerStateEvent, InformerSyncPolicy, ResourceMeta,
};
use plugin_runtime::{CancelSignal, PluginContext};

/// Opaque client handed out by [`MockClientFactory`].
#[derive(Debug)]
pub struct MockClient {
    pub connection: String,
    pub generation: u32,
}

/// Client factory that counts calls and fails on demand per connection id.
#[derive(Default)]
pub struct MockClientFactory {
    pub creates: AtomicU32,
    pub starts: AtomicU32,
    pub stops: AtomicU32,
    pub refreshes: AtomicU32,
    pub fail_create: Mutex<HashSet<String>>,
    pub fail_start: Mutex<HashSet<String>>,
    pub fail_stop: Mutex<HashSet<String>>,
}

impl MockClientFactory {
    pub fn failing_create(id: &str) -> Self {
        let factory = Self::default();
        factory.fail_create.lock().insert(id.to_string());
        factory
    }

    pub fn creates(&self) -> u32 {
        self.creates.load(Ordering::SeqCst)
    }

    pub fn stops(&self) -> u32 {
        self.stops.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ClientFactory<MockClient> for MockClientFactory {
    async fn create(
        &self,
        _ctx: &PluginContext,
        connection: &Connection,
    ) -> anyhow::Result<MockClient> {
        self.creates.fetch_add(1, Ordering::SeqCst);
        if self.fail_create.lock().contains(&connection.id) {
            bail!("cannot build client for {}", connection.id);
        }
        Ok(MockClient {
            connection: connection.id.clone(),
            generation: 0,
        })
    }

    async fn start(&self, _ctx: &PluginContext, client: &MockClient) -> anyhow::Result<()> {
        self.starts.fetch_add(1, Ordering::SeqCst);
        if self.fail_start.lock().contains(&client.connection) {
            bail!("dial tcp: connection refused");
        }
        Ok(())
    }

    async fn stop(&self, _ctx: &PluginContext, client: &MockClient) -> anyhow::Result<()> {
        self.stops.fetch_add(1, Ordering::SeqCst);
        if self.fail_stop.lock().contains(&client.connection) {
            bail!("stop failed for {}", client.connection);
        }
        Ok(())
    }

    async fn refresh(
        &self,
        _ctx: &PluginContext,
        client: &MockClient,
    ) -> anyhow::Result<MockClient> {
        self.refreshes.fetch_add(1, Ordering::SeqCst);
        Ok(MockClient {
            connection: client.connection.clone(),
            generation: client.generation + 1,
        })
    }
}

/// Loader returning scripted batches; the last batch repeats.
#[derive(Default)]
pub struct ScriptedLoader {
    batches: Mutex<VecDeque<Vec<Connection>>>,
}

impl ScriptedLoader {
    pub fn new(batches: Vec<Vec<Connection>>) -> Self {
        Self {
            batches: Mutex::new(batches.into()),
        }
    }
}

#[async_trait]
impl ConnectionLoader for ScriptedLoader {
    async fn load(&self, _ctx: &PluginContext) -> anyhow::Result<Vec<Connection>> {
        let mut batches = self.batches.lock();
        if batches.len() > 1 {
            return Ok(batches.pop_front().unwrap_or_default());
        }
        Ok(batches.front().cloned().unwrap_or_default())
    }
}

/// Health checker answering with a fixed status, or failing.
pub struct FixedChecker {
    pub status: ConnectionStatusCode,
    pub fail: bool,
}

impl FixedChecker {
    pub fn reporting(status: ConnectionStatusCode) -> Self {
        Self { status, fail: false }
    }

    pub fn failing() -> Self {
        Self {
            status: ConnectionStatusCode::Unknown,
            fail: true,
        }
    }
}

#[async_trait]
impl HealthChecker<MockClient> for FixedChecker {
    async fn check(
        &self,
        _ctx: &PluginContext,
        connection: &Connection,
        _client: &MockClient,
    ) -> anyhow::Result<ConnectionStatus> {
        if self.fail {
            bail!("health endpoint unreachable");
        }
        Ok(ConnectionStatus::new(connection.clone(), self.status))
    }
}

pub struct StaticNamespaces(pub Vec<String>);

#[async_trait]
impl NamespaceLoader<MockClient> for StaticNamespaces {
    async fn load(&self, _ctx: &PluginContext, client: &MockClient) -> anyhow::Result<Vec<String>> {
        Ok(self
            .0
            .iter()
            .map(|ns| format!("{}/{}", client.connection, ns))
            .collect())
    }
}

/// Informer handle emitting a scripted sync for each `OnConnect` resource.
pub struct FakeInformerHandle {
    connection: String,
    skip_kinds: HashSet<String>,
    registered: Mutex<Vec<(ResourceMeta, InformerSyncPolicy)>>,
    events: Mutex<Option<EventSink>>,
    pub lazy_starts: AtomicU32,
    pub stopped: AtomicBool,
    pub fail_lazy: AtomicBool,
    pub fail_start: AtomicBool,
}

impl FakeInformerHandle {
    pub fn new(connection: &str, skip_kinds: HashSet<String>) -> Self {
        Self {
            connection: connection.to_string(),
            skip_kinds,
            registered: Mutex::new(Vec::new()),
            events: Mutex::new(None),
            lazy_starts: AtomicU32::new(0),
            stopped: AtomicBool::new(false),
            fail_lazy: AtomicBool::new(false),
            fail_start: AtomicBool::new(false),
        }
    }

    pub fn lazy_starts(&self) -> u32 {
        self.lazy_starts.load(Ordering::SeqCst)
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    /// Event sink captured at registration, as a real watch would use.
    pub fn event_sink(&self) -> EventSink {
        self.events
            .lock()
            .clone()
            .expect("no resource registered yet")
    }

    async fn send_state(
        &self,
        cancel: &CancelSignal,
        states: &mpsc::Sender<InformerStateEvent>,
        event: InformerStateEvent,
    ) -> bool {
        tokio::select! {
            result = states.send(event) => result.is_ok(),
            _ = cancel.cancelled() => false,
        }
    }
}

#[async_trait]
impl InformerHandle for FakeInformerHandle {
    async fn register_resource(
        &self,
        _ctx: &PluginContext,
        resource: &ResourceMeta,
        policy: InformerSyncPolicy,
        events: EventSink,
    ) -> Result<(), InformerError> {
        if self.skip_kinds.contains(&resource.kind) {
            return Err(InformerError::ResourceSkipped);
        }
        self.registered.lock().push((resource.clone(), policy));
        *self.events.lock() = Some(events);
        Ok(())
    }

    async fn start(
        &self,
        _ctx: &PluginContext,
        cancel: CancelSignal,
        states: mpsc::Sender<InformerStateEvent>,
    ) -> Result<(), InformerError> {
        if self.fail_start.load(Ordering::SeqCst) {
            return Err(anyhow::anyhow!("watch refused by {}", self.connection).into());
        }

        let eager: Vec<String> = self
            .registered
            .lock()
            .iter()
            .filter(|(_, policy)| *policy == InformerSyncPolicy::OnConnect)
            .map(|(resource, _)| resource.key())
            .collect();

        for key in eager {
            let syncing =
                InformerStateEvent::new(&self.connection, &key, InformerResourceState::Syncing);
            if !self.send_state(&cancel, &states, syncing).await {
                return Ok(());
            }
            let synced =
                InformerStateEvent::new(&self.connection, &key, InformerResourceState::Synced)
                    .with_counts(5, 5);
            if !self.send_state(&cancel, &states, synced).await {
                return Ok(());
            }
        }

        cancel.cancelled().await;
        Ok(())
    }

    async fn start_resource(
        &self,
        _ctx: &PluginContext,
        cancel: CancelSignal,
        resource: &ResourceMeta,
        states: mpsc::Sender<InformerStateEvent>,
    ) -> Result<(), InformerError> {
        self.lazy_starts.fetch_add(1, Ordering::SeqCst);
        if self.fail_lazy.load(Ordering::SeqCst) {
            return Err(anyhow::anyhow!("list {} forbidden", resource.kind).into());
        }
        let synced = InformerStateEvent::new(
            &self.connection,
            resource.key(),
            InformerResourceState::Synced,
        )
        .with_counts(3, 3);
        self.send_state(&cancel, &states, synced).await;
        Ok(())
    }

    fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }
}

/// Factory building one [`FakeInformerHandle`] per connection and keeping
/// them for inspection.
#[derive(Default)]
pub struct FakeInformerFactory {
    pub skip_kinds: HashSet<String>,
    pub handles: Mutex<HashMap<String, Arc<FakeInformerHandle>>>,
    pub creates: AtomicU32,
}

impl FakeInformerFactory {
    pub fn skipping(kinds: &[&str]) -> Self {
        Self {
            skip_kinds: kinds.iter().map(|k| k.to_string()).collect(),
            ..Self::default()
        }
    }

    pub fn handle(&self, connection: &str) -> Arc<FakeInformerHandle> {
        Arc::clone(
            self.handles
                .lock()
                .get(connection)
                .expect("no handle created for connection"),
        )
    }

    pub fn creates(&self) -> u32 {
        self.creates.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl InformerFactory<MockClient> for FakeInformerFactory {
    async fn create(
        &self,
        _ctx: &PluginContext,
        client: Arc<MockClient>,
    ) -> anyhow::Result<Arc<dyn InformerHandle>> {
        self.creates.fetch_add(1, Ordering::SeqCst);
        let handle = Arc::new(FakeInformerHandle::new(
            &client.connection,
            self.skip_kinds.clone(),
        ));
        self.handles
            .lock()
            .insert(client.connection.clone(), Arc::clone(&handle));
        Ok(handle)
    }
}
