//! Informer manager: per-connection entry bookkeeping.
//!
//! Public methods validate and mutate entries under the shared lock, or
//! enqueue start/stop requests for the aggregator loop in
//! [`aggregator`](super::aggregator). Only the loop launches or tears down
//! watch tasks.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use super::error::InformerError;
use super::traits::{InformerFactory, InformerHandle};
use super::types::{
    EventSink, InformerConnectionSummary, InformerResourceState, InformerStateEvent,
    InformerSyncPolicy, ResourceMeta, WatchEvent,
};
use crate::cancel::CancelSignal;
use crate::config::InformerConfig;
use crate::context::PluginContext;
use crate::error::IntoErrorPayload;

/// Reply channel completed by the aggregator loop once a request is handled.
pub(super) type Ack = oneshot::Sender<Result<(), InformerError>>;

/// Start/stop requests handled by the aggregator loop.
pub(super) enum ControlRequest {
    Start {
        connection: String,
        ctx: PluginContext,
        ack: Ack,
    },
    Stop {
        connection: String,
        ack: Ack,
    },
}

/// Sent by a watch task that ended without its entry being cancelled.
pub(super) struct WatchExit {
    pub(super) connection: String,
    pub(super) cancel: CancelSignal,
    pub(super) reason: String,
}

pub(super) struct InformerEntry {
    pub(super) handle: Arc<dyn InformerHandle>,
    pub(super) cancel: CancelSignal,
    pub(super) states: HashMap<String, InformerResourceState>,
    pub(super) counts: HashMap<String, u64>,
    /// Watchable resources and the policy they were registered with.
    pub(super) resources: HashMap<String, (ResourceMeta, InformerSyncPolicy)>,
    pub(super) started: bool,
    pub(super) watch: Option<JoinHandle<()>>,
}

impl InformerEntry {
    fn new(handle: Arc<dyn InformerHandle>) -> Self {
        Self {
            handle,
            cancel: CancelSignal::new(),
            states: HashMap::new(),
            counts: HashMap::new(),
            resources: HashMap::new(),
            started: false,
            watch: None,
        }
    }

    fn summary(&self, connection: &str) -> InformerConnectionSummary {
        let count_of = |wanted: InformerResourceState| {
            self.states.values().filter(|state| **state == wanted).count()
        };
        InformerConnectionSummary {
            connection: connection.to_string(),
            resources: self.states.clone(),
            resource_counts: self.counts.clone(),
            total_resources: self.states.len(),
            synced_count: count_of(InformerResourceState::Synced),
            error_count: count_of(InformerResourceState::Error),
        }
    }

    /// One `Cancelled` event per tracked resource, in key order.
    pub(super) fn cancelled_events(&self, connection: &str) -> Vec<InformerStateEvent> {
        let mut keys: Vec<&String> = self.states.keys().collect();
        keys.sort();
        keys.into_iter()
            .map(|key| {
                let count = self.counts.get(key).copied().unwrap_or(0);
                InformerStateEvent::new(connection, key.clone(), InformerResourceState::Cancelled)
                    .with_counts(count, -1)
            })
            .collect()
    }

    /// Mark every live `OnConnect` resource `Error` after the watch ended,
    /// returning the transitions in key order.
    pub(super) fn fail_watched(
        &mut self,
        connection: &str,
        reason: &str,
    ) -> Vec<InformerStateEvent> {
        let payload = InformerError::WatchFailed {
            connection: connection.to_string(),
            reason: reason.to_string(),
        }
        .to_payload();

        let mut keys: Vec<String> = self
            .resources
            .iter()
            .filter(|(_, (_, policy))| *policy == InformerSyncPolicy::OnConnect)
            .map(|(key, _)| key.clone())
            .filter(|key| self.states.get(key).is_some_and(|state| !state.is_terminal()))
            .collect();
        keys.sort();

        keys.into_iter()
            .map(|key| {
                self.states.insert(key.clone(), InformerResourceState::Error);
                let count = self.counts.get(&key).copied().unwrap_or(0);
                InformerStateEvent::new(connection, key, InformerResourceState::Error)
                    .with_counts(count, -1)
                    .with_error(payload.clone())
            })
            .collect()
    }
}

/// Inbound queue receivers, taken by the aggregator loop when it starts.
pub(super) struct InboundReceivers {
    pub(super) control: mpsc::Receiver<ControlRequest>,
    pub(super) events: mpsc::Receiver<WatchEvent>,
    pub(super) states: mpsc::Receiver<InformerStateEvent>,
    pub(super) exits: mpsc::UnboundedReceiver<WatchExit>,
}

/// Owns per-connection informer handles and their sync state.
pub struct InformerManager<C> {
    factory: Arc<dyn InformerFactory<C>>,
    pub(super) informers: RwLock<HashMap<String, InformerEntry>>,
    control: mpsc::Sender<ControlRequest>,
    events: EventSink,
    pub(super) states: mpsc::Sender<InformerStateEvent>,
    pub(super) exits: mpsc::UnboundedSender<WatchExit>,
    pub(super) inbound: Mutex<Option<InboundReceivers>>,
}

impl<C> InformerManager<C>
where
    C: Send + Sync + 'static,
{
    pub fn new(factory: Arc<dyn InformerFactory<C>>) -> Self {
        Self::with_config(factory, &InformerConfig::default())
    }

    pub fn with_config(factory: Arc<dyn InformerFactory<C>>, config: &InformerConfig) -> Self {
        let capacity = config.queue_capacity.max(1);
        let (control, control_rx) = mpsc::channel(capacity);
        let (events, events_rx) = mpsc::channel(capacity);
        let (states, states_rx) = mpsc::channel(capacity);
        let (exits, exits_rx) = mpsc::unbounded_channel();

        Self {
            factory,
            informers: RwLock::new(HashMap::new()),
            control,
            events: EventSink::new(events),
            states,
            exits,
            inbound: Mutex::new(Some(InboundReceivers {
                control: control_rx,
                events: events_rx,
                states: states_rx,
                exits: exits_rx,
            })),
        }
    }

    /// Build an informer handle for `connection` from its live client.
    ///
    /// # Errors
    /// `AlreadyExists` if the connection already has an informer; the
    /// existing entry is left untouched.
    pub async fn create_connection_informer(
        &self,
        ctx: &PluginContext,
        connection: &str,
        client: Arc<C>,
    ) -> Result<(), InformerError> {
        if self.has_informer(connection) {
            return Err(already_exists(connection));
        }

        let handle = self.factory.create(ctx, client).await?;

        let mut informers = self.informers.write();
        if informers.contains_key(connection) {
            return Err(already_exists(connection));
        }
        informers.insert(connection.to_string(), InformerEntry::new(handle));

        tracing::info!(connection = %connection, "Informer created");
        Ok(())
    }

    /// Register a resource type on the connection's informer.
    ///
    /// Skipped resources are tracked as `Cancelled` and never scheduled.
    /// Everything else starts `Pending` with a zero count.
    pub async fn register_resource(
        &self,
        ctx: &PluginContext,
        connection: &str,
        resource: ResourceMeta,
        policy: InformerSyncPolicy,
    ) -> Result<(), InformerError> {
        let handle = self.entry_handle(connection)?;
        let key = resource.key();

        let outcome = handle
            .register_resource(ctx, &resource, policy, self.events.clone())
            .await;

        let mut informers = self.informers.write();
        let entry = informers
            .get_mut(connection)
            .ok_or_else(|| not_found(connection))?;

        match outcome {
            Ok(()) => {
                entry.states.insert(key.clone(), InformerResourceState::Pending);
                entry.counts.insert(key.clone(), 0);
                entry.resources.insert(key.clone(), (resource, policy));
                tracing::debug!(
                    connection = %connection,
                    resource = %key,
                    ?policy,
                    "Resource registered"
                );
                Ok(())
            }
            Err(InformerError::ResourceSkipped) => {
                entry.states.insert(key.clone(), InformerResourceState::Cancelled);
                tracing::debug!(connection = %connection, resource = %key, "Resource skipped");
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    /// Launch the connection's watch task through the aggregator loop.
    ///
    /// Completes once the loop has handled the request, so a following
    /// stop always sees the started watch. Starting a started connection
    /// is a no-op.
    pub async fn start_connection(
        &self,
        ctx: &PluginContext,
        connection: &str,
    ) -> Result<(), InformerError> {
        if !self.has_informer(connection) {
            return Err(not_found(connection));
        }
        self.request(|ack| ControlRequest::Start {
            connection: connection.to_string(),
            ctx: ctx.clone(),
            ack,
        })
        .await
    }

    /// Cancel the connection's watch, emit a `Cancelled` state for each
    /// tracked resource, and drop the entry.
    ///
    /// Returns after the loop has torn the entry down: `has_informer` is
    /// false and the watch task has exited. The host must keep draining the
    /// state queue meanwhile.
    pub async fn stop_connection(&self, connection: &str) -> Result<(), InformerError> {
        if !self.has_informer(connection) {
            return Err(not_found(connection));
        }
        self.request(|ack| ControlRequest::Stop {
            connection: connection.to_string(),
            ack,
        })
        .await
    }

    async fn request(
        &self,
        build: impl FnOnce(Ack) -> ControlRequest,
    ) -> Result<(), InformerError> {
        let (ack, done) = oneshot::channel();
        self.control
            .send(build(ack))
            .await
            .map_err(|_| InformerError::ChannelClosed)?;
        done.await.map_err(|_| InformerError::ChannelClosed)?
    }

    pub fn has_informer(&self, connection: &str) -> bool {
        self.informers.read().contains_key(connection)
    }

    pub fn get_connection_state(
        &self,
        connection: &str,
    ) -> Result<InformerConnectionSummary, InformerError> {
        self.informers
            .read()
            .get(connection)
            .map(|entry| entry.summary(connection))
            .ok_or_else(|| not_found(connection))
    }

    /// Make sure a lazily synced resource has been started.
    ///
    /// No-op for unknown connections or resources, for resources not
    /// registered `OnFirstQuery`, and for resources already `Synced` or with
    /// a lazy start in flight. Otherwise runs the handle's single-resource
    /// start and waits for its initial sync.
    pub async fn ensure_resource(
        &self,
        ctx: &PluginContext,
        connection: &str,
        resource_key: &str,
    ) -> Result<(), InformerError> {
        let (handle, cancel, resource) = {
            let mut informers = self.informers.write();
            let Some(entry) = informers.get_mut(connection) else {
                return Ok(());
            };
            let Some((resource, policy)) = entry.resources.get(resource_key) else {
                return Ok(());
            };
            if *policy != InformerSyncPolicy::OnFirstQuery {
                return Ok(());
            }
            if matches!(
                entry.states.get(resource_key),
                Some(InformerResourceState::Synced | InformerResourceState::Syncing)
            ) {
                return Ok(());
            }

            let resource = resource.clone();
            entry
                .states
                .insert(resource_key.to_string(), InformerResourceState::Syncing);
            (Arc::clone(&entry.handle), entry.cancel.clone(), resource)
        };

        tracing::debug!(
            connection = %connection,
            resource = %resource_key,
            "Lazily starting resource"
        );

        let result = handle
            .start_resource(ctx, cancel, &resource, self.states.clone())
            .await;

        if let Err(err) = &result {
            tracing::warn!(
                connection = %connection,
                resource = %resource_key,
                error = %err,
                "Lazy resource start failed"
            );
            if let Some(entry) = self.informers.write().get_mut(connection) {
                entry
                    .states
                    .insert(resource_key.to_string(), InformerResourceState::Error);
            }
        }
        result
    }

    /// Fold a state transition into the owning entry, if it still exists.
    pub(super) fn record_state(&self, event: &InformerStateEvent) {
        let mut informers = self.informers.write();
        let Some(entry) = informers.get_mut(&event.connection) else {
            return;
        };
        entry.states.insert(event.resource_key.clone(), event.state);
        if let Some(count) = entry.counts.get_mut(&event.resource_key) {
            *count = event.resource_count;
        }
    }

    fn entry_handle(&self, connection: &str) -> Result<Arc<dyn InformerHandle>, InformerError> {
        self.informers
            .read()
            .get(connection)
            .map(|entry| Arc::clone(&entry.handle))
            .ok_or_else(|| not_found(connection))
    }
}

fn not_found(connection: &str) -> InformerError {
    InformerError::NotFound {
        connection: connection.to_string(),
    }
}

fn already_exists(connection: &str) -> InformerError {
    InformerError::AlreadyExists {
        connection: connection.to_string(),
    }
}
