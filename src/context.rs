//! Per-call context handed to every manager operation and backend strategy.

use uuid::Uuid;

use crate::cancel::CancelSignal;
use crate::connection::Connection;

/// Request-scoped context.
///
/// Carries a request id for log correlation, the connection the call is
/// scoped to (if any), and a cancel signal that ends the call.
#[derive(Debug, Clone)]
pub struct PluginContext {
    request_id: Uuid,
    connection: Option<Connection>,
    cancel: CancelSignal,
}

impl PluginContext {
    pub fn new() -> Self {
        Self {
            request_id: Uuid::new_v4(),
            connection: None,
            cancel: CancelSignal::new(),
        }
    }

    /// Attach the connection the call operates on.
    pub fn with_connection(mut self, connection: Connection) -> Self {
        self.connection = Some(connection);
        self
    }

    /// Share an existing cancel signal (e.g. the host's shutdown signal).
    pub fn with_cancel(mut self, cancel: CancelSignal) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn request_id(&self) -> Uuid {
        self.request_id
    }

    pub fn connection(&self) -> Option<&Connection> {
        self.connection.as_ref()
    }

    pub fn cancel_signal(&self) -> &CancelSignal {
        &self.cancel
    }

    pub fn is_done(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Resolves when the call has been cancelled.
    pub async fn done(&self) {
        self.cancel.cancelled().await
    }
}

impl Default for PluginContext {
    fn default() -> Self {
        Self::new()
    }
}
