use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use super::error::InformerError;
use crate::error::ErrorPayload;

/// When a resource type's watch should start.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InformerSyncPolicy {
    /// Watched as soon as the connection's informer starts.
    #[default]
    OnConnect,
    /// Watched lazily the first time the resource is queried.
    OnFirstQuery,
    /// Never watched.
    Never,
}

/// Sync state of one resource type on one connection.
///
/// `Pending -> Syncing -> Synced`, with `Error` reachable from any step and
/// `Cancelled` forced when the connection's informer stops.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InformerResourceState {
    Pending,
    Syncing,
    Synced,
    Error,
    Cancelled,
}

impl InformerResourceState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, InformerResourceState::Error | InformerResourceState::Cancelled)
    }
}

impl std::fmt::Display for InformerResourceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            InformerResourceState::Pending => "pending",
            InformerResourceState::Syncing => "syncing",
            InformerResourceState::Synced => "synced",
            InformerResourceState::Error => "error",
            InformerResourceState::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

/// Identity of a resource type exposed by a backend.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceMeta {
    pub group: String,
    pub version: String,
    pub kind: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: String,
}

impl ResourceMeta {
    pub fn new(
        group: impl Into<String>,
        version: impl Into<String>,
        kind: impl Into<String>,
    ) -> Self {
        Self {
            group: group.into(),
            version: version.into(),
            kind: kind.into(),
            ..Self::default()
        }
    }

    /// `group::version::kind`
    pub fn key(&self) -> String {
        format!("{}::{}::{}", self.group, self.version, self.kind)
    }
}

/// Payload of a create, update or delete event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceEvent {
    pub connection: String,
    pub resource_key: String,
    pub id: String,
    #[serde(default)]
    pub namespace: String,
    pub data: serde_json::Value,
}

/// A sync state transition for one resource type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InformerStateEvent {
    pub connection: String,
    pub resource_key: String,
    pub state: InformerResourceState,
    pub resource_count: u64,
    /// Total expected items, `-1` when unknown.
    pub total_count: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorPayload>,
}

impl InformerStateEvent {
    pub fn new(
        connection: impl Into<String>,
        resource_key: impl Into<String>,
        state: InformerResourceState,
    ) -> Self {
        Self {
            connection: connection.into(),
            resource_key: resource_key.into(),
            state,
            resource_count: 0,
            total_count: -1,
            error: None,
        }
    }

    pub fn with_counts(mut self, resource_count: u64, total_count: i64) -> Self {
        self.resource_count = resource_count;
        self.total_count = total_count;
        self
    }

    pub fn with_error(mut self, error: ErrorPayload) -> Self {
        self.error = Some(error);
        self
    }
}

/// Point-in-time view of one connection's informer, computed on demand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InformerConnectionSummary {
    pub connection: String,
    pub resources: HashMap<String, InformerResourceState>,
    pub resource_counts: HashMap<String, u64>,
    pub total_resources: usize,
    pub synced_count: usize,
    pub error_count: usize,
}

/// A resource event tagged with its kind.
#[derive(Debug, Clone, PartialEq)]
pub enum WatchEvent {
    Add(ResourceEvent),
    Update(ResourceEvent),
    Delete(ResourceEvent),
}

/// Producer side of the aggregator's inbound event queue.
///
/// Handed to informer handles at registration time. Every kind travels on
/// the same queue, so one producer's events reach the host in send order.
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: mpsc::Sender<WatchEvent>,
}

impl EventSink {
    pub(crate) fn new(tx: mpsc::Sender<WatchEvent>) -> Self {
        Self { tx }
    }

    pub async fn add(&self, event: ResourceEvent) -> Result<(), InformerError> {
        self.send(WatchEvent::Add(event)).await
    }

    pub async fn update(&self, event: ResourceEvent) -> Result<(), InformerError> {
        self.send(WatchEvent::Update(event)).await
    }

    pub async fn delete(&self, event: ResourceEvent) -> Result<(), InformerError> {
        self.send(WatchEvent::Delete(event)).await
    }

    pub async fn send(&self, event: WatchEvent) -> Result<(), InformerError> {
        self.tx
            .send(event)
            .await
            .map_err(|_| InformerError::ChannelClosed)
    }
}

/// Host-side output queues for the three resource event kinds.
#[derive(Debug, Clone)]
pub struct EventSenders {
    pub add: mpsc::Sender<ResourceEvent>,
    pub update: mpsc::Sender<ResourceEvent>,
    pub delete: mpsc::Sender<ResourceEvent>,
}

/// Receiving side matching [`EventSenders`].
#[derive(Debug)]
pub struct EventReceivers {
    pub add: mpsc::Receiver<ResourceEvent>,
    pub update: mpsc::Receiver<ResourceEvent>,
    pub delete: mpsc::Receiver<ResourceEvent>,
}

/// Create a matched set of event queues with the given capacity.
pub fn event_channels(capacity: usize) -> (EventSenders, EventReceivers) {
    let capacity = capacity.max(1);
    let (add, add_rx) = mpsc::channel(capacity);
    let (update, update_rx) = mpsc::channel(capacity);
    let (delete, delete_rx) = mpsc::channel(capacity);
    (
        EventSenders { add, update, delete },
        EventReceivers {
            add: add_rx,
            update: update_rx,
            delete: delete_rx,
        },
    )
}
