//! The aggregator loop.
//!
//! Single coordinating task that fans in events and state transitions from
//! every running watch task into the host's output queues, and that alone
//! launches and tears down per-connection watch tasks.

use std::sync::Arc;

use tokio::sync::mpsc;

use super::error::InformerError;
use super::manager::{Ack, ControlRequest, InformerManager, WatchExit};
use super::types::{EventSenders, InformerStateEvent, WatchEvent};
use crate::cancel::CancelSignal;
use crate::context::PluginContext;

impl<C> InformerManager<C>
where
    C: Send + Sync + 'static,
{
    /// Run the aggregator loop until `stop` fires.
    ///
    /// `out` and `out_state` are the only queues the host needs to drain.
    /// Because every queue is a small bounded hand-off, a host that stops
    /// draining them stalls event delivery for all connections.
    ///
    /// # Errors
    /// `AlreadyRunning` if the loop was started before.
    pub async fn run(
        &self,
        stop: CancelSignal,
        out: EventSenders,
        out_state: mpsc::Sender<InformerStateEvent>,
    ) -> Result<(), InformerError> {
        let Some(mut inbound) = self.inbound.lock().take() else {
            return Err(InformerError::AlreadyRunning);
        };

        tracing::info!("Informer aggregator started");

        while !stop.is_cancelled() {
            tokio::select! {
                _ = stop.cancelled() => break,

                Some(request) = inbound.control.recv() => match request {
                    ControlRequest::Start { connection, ctx, ack } => {
                        reply(ack, self.launch_watch(&connection, ctx));
                    }
                    ControlRequest::Stop { connection, ack } => {
                        let result = self
                            .teardown(&connection, &mut inbound.states, &out_state, &stop)
                            .await;
                        reply(ack, result);
                    }
                },

                Some(exit) = inbound.exits.recv() => {
                    self.watch_exited(exit, &out_state, &stop).await;
                }

                Some(event) = inbound.states.recv() => {
                    self.record_state(&event);
                    forward(&out_state, event, &stop).await;
                }

                Some(event) = inbound.events.recv() => match event {
                    WatchEvent::Add(event) => forward(&out.add, event, &stop).await,
                    WatchEvent::Update(event) => forward(&out.update, event, &stop).await,
                    WatchEvent::Delete(event) => forward(&out.delete, event, &stop).await,
                },
            }
        }

        self.cancel_all(&out_state);
        tracing::info!("Informer aggregator stopped");
        Ok(())
    }

    /// Spawn the blocking watch run for `connection`.
    fn launch_watch(&self, connection: &str, ctx: PluginContext) -> Result<(), InformerError> {
        let mut informers = self.informers.write();
        let entry = informers
            .get_mut(connection)
            .ok_or_else(|| InformerError::NotFound {
                connection: connection.to_string(),
            })?;
        if entry.started {
            tracing::debug!(connection = %connection, "Informer already started");
            return Ok(());
        }
        entry.started = true;

        let handle = Arc::clone(&entry.handle);
        let cancel = entry.cancel.clone();
        let states = self.states.clone();
        let exits = self.exits.clone();
        let connection = connection.to_string();
        tracing::info!(connection = %connection, "Informer started");

        entry.watch = Some(tokio::spawn(async move {
            let reason = tokio::select! {
                result = handle.start(&ctx, cancel.clone(), states) => match result {
                    Ok(()) => "watch returned".to_string(),
                    Err(err) => err.to_string(),
                },
                _ = cancel.cancelled() => return,
                _ = ctx.done() => "start context cancelled".to_string(),
            };
            if cancel.is_cancelled() {
                return;
            }

            tracing::warn!(connection = %connection, reason = %reason, "Informer watch exited");
            let exit = WatchExit {
                connection,
                cancel,
                reason,
            };
            if exits.send(exit).is_err() {
                tracing::trace!("Aggregator gone, watch exit dropped");
            }
        }));
        Ok(())
    }

    /// Cancel the connection's watch, drop its entry and emit `Cancelled`
    /// for every resource it tracked.
    ///
    /// Transitions the finished watch left queued are flushed first, so they
    /// reach the host ahead of `Cancelled` and never land on a re-created
    /// entry.
    async fn teardown(
        &self,
        connection: &str,
        states: &mut mpsc::Receiver<InformerStateEvent>,
        out_state: &mpsc::Sender<InformerStateEvent>,
        stop: &CancelSignal,
    ) -> Result<(), InformerError> {
        let removed = self.informers.write().remove(connection);
        let Some(mut entry) = removed else {
            return Err(InformerError::NotFound {
                connection: connection.to_string(),
            });
        };

        entry.cancel.cancel();
        if let Some(watch) = entry.watch.take() {
            if let Err(err) = watch.await {
                tracing::warn!(
                    connection = %connection,
                    error = %err,
                    "Informer watch task failed"
                );
            }
        }
        entry.handle.stop();

        while let Ok(event) = states.try_recv() {
            self.record_state(&event);
            forward(out_state, event, stop).await;
        }

        let events = entry.cancelled_events(connection);
        tracing::info!(
            connection = %connection,
            resources = events.len(),
            "Informer stopped"
        );
        for event in events {
            forward(out_state, event, stop).await;
        }
        Ok(())
    }

    /// Fail the eager resources of a watch that ended on its own and make
    /// the connection startable again.
    async fn watch_exited(
        &self,
        exit: WatchExit,
        out_state: &mpsc::Sender<InformerStateEvent>,
        stop: &CancelSignal,
    ) {
        let events = {
            let mut informers = self.informers.write();
            match informers.get_mut(&exit.connection) {
                // A stopped or re-created entry owns a different signal.
                Some(entry) if entry.cancel.same_as(&exit.cancel) && entry.started => {
                    entry.started = false;
                    entry.watch = None;
                    entry.fail_watched(&exit.connection, &exit.reason)
                }
                _ => return,
            }
        };

        for event in events {
            forward(out_state, event, stop).await;
        }
    }

    /// Tear down every remaining entry when the loop exits.
    ///
    /// The host may no longer be draining, so `Cancelled` events are only
    /// delivered where queue space is free.
    fn cancel_all(&self, out_state: &mpsc::Sender<InformerStateEvent>) {
        let entries: Vec<_> = self.informers.write().drain().collect();
        for (connection, entry) in entries {
            entry.cancel.cancel();
            entry.handle.stop();
            for event in entry.cancelled_events(&connection) {
                if out_state.try_send(event).is_err() {
                    tracing::trace!(
                        connection = %connection,
                        "Dropped cancelled state on shutdown"
                    );
                }
            }
        }
    }
}

fn reply(ack: Ack, result: Result<(), InformerError>) {
    if ack.send(result).is_err() {
        tracing::trace!("Control request caller gone, reply dropped");
    }
}

/// Hand `event` to `out`, giving up if the loop is asked to stop first.
async fn forward<T>(out: &mpsc::Sender<T>, event: T, stop: &CancelSignal) {
    tokio::select! {
        result = out.send(event) => {
            if result.is_err() {
                tracing::trace!("Output queue closed, event dropped");
            }
        }
        _ = stop.cancelled() => {}
    }
}
