//! Shared test utilities and mock infrastructure.

#![allow(dead_code, unused_imports)]

pub mod mock_backend;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use plugin_runtime::informer::{
    event_channels, EventReceivers, InformerError, InformerManager, InformerStateEvent,
};
use plugin_runtime::CancelSignal;

use mock_backend::MockClient;

pub const RECV_TIMEOUT: Duration = Duration::from_secs(2);

/// A running aggregator loop plus the host side of its output queues.
pub struct Aggregator {
    pub stop: CancelSignal,
    pub events: EventReceivers,
    pub states: mpsc::Receiver<InformerStateEvent>,
    pub task: JoinHandle<Result<(), InformerError>>,
}

impl Aggregator {
    pub fn spawn(manager: Arc<InformerManager<MockClient>>) -> Self {
        Self::with_capacity(manager, 16)
    }

    /// Spawn with host output queues of `capacity` items each.
    pub fn with_capacity(manager: Arc<InformerManager<MockClient>>, capacity: usize) -> Self {
        let stop = CancelSignal::new();
        let (out, events) = event_channels(capacity);
        let (out_state, states) = mpsc::channel(capacity);

        let loop_stop = stop.clone();
        let task = tokio::spawn(async move { manager.run(loop_stop, out, out_state).await });

        Self {
            stop,
            events,
            states,
            task,
        }
    }

    /// Next state event, failing the test if none arrives in time.
    pub async fn next_state(&mut self) -> InformerStateEvent {
        recv(&mut self.states).await
    }

    pub async fn shutdown(self) {
        self.stop.cancel();
        tokio::time::timeout(RECV_TIMEOUT, self.task)
            .await
            .expect("aggregator should stop")
            .expect("aggregator task panicked")
            .expect("aggregator returned error");
    }
}

pub async fn recv<T>(rx: &mut mpsc::Receiver<T>) -> T {
    tokio::time::timeout(RECV_TIMEOUT, rx.recv())
        .await
        .expect("timed out waiting for queue item")
        .expect("queue closed")
}

/// Assert nothing arrives on `rx` within a short window.
pub async fn assert_quiet<T: std::fmt::Debug>(rx: &mut mpsc::Receiver<T>) {
    if let Ok(Some(item)) = tokio::time::timeout(Duration::from_millis(50), rx.recv()).await {
        panic!("unexpected queue item: {:?}", item);
    }
}
