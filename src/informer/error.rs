use thiserror::Error;

use crate::error::{ErrorPayload, IntoErrorPayload};

/// Errors returned by [`InformerManager`](super::InformerManager) and
/// informer handles.
#[derive(Debug, Error)]
pub enum InformerError {
    #[error("no informer for connection '{connection}'")]
    NotFound { connection: String },

    #[error("informer for connection '{connection}' already exists")]
    AlreadyExists { connection: String },

    /// Returned by a handle when a resource type must never be watched.
    /// Consumed by the manager, which marks the resource `Cancelled`.
    #[error("resource skipped")]
    ResourceSkipped,

    #[error("informer aggregator is already running")]
    AlreadyRunning,

    #[error("informer control channel closed")]
    ChannelClosed,

    /// The connection's watch ended without being stopped.
    #[error("informer watch for connection '{connection}' ended: {reason}")]
    WatchFailed { connection: String, reason: String },

    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

impl IntoErrorPayload for InformerError {
    fn error_code(&self) -> &'static str {
        match self {
            InformerError::NotFound { .. } => "informer_not_found",
            InformerError::AlreadyExists { .. } => "informer_already_exists",
            InformerError::ResourceSkipped => "resource_skipped",
            InformerError::AlreadyRunning => "informer_already_running",
            InformerError::ChannelClosed => "informer_channel_closed",
            InformerError::WatchFailed { .. } => "informer_watch_failed",
            InformerError::Backend(_) => "backend_error",
        }
    }

    fn to_payload(&self) -> ErrorPayload {
        let code = self.error_code();
        match self {
            InformerError::NotFound { .. } => {
                ErrorPayload::new(code, "Informer not found", self.to_string())
                    .with_suggestion("Start the connection before querying its informer")
            }
            InformerError::AlreadyExists { .. } => {
                ErrorPayload::new(code, "Informer already exists", self.to_string())
            }
            InformerError::ResourceSkipped => {
                ErrorPayload::new(code, "Resource not watched", self.to_string())
            }
            InformerError::AlreadyRunning | InformerError::ChannelClosed => {
                ErrorPayload::new(code, "Informer runtime error", self.to_string())
            }
            InformerError::WatchFailed { .. } => {
                ErrorPayload::new(code, "Informer watch stopped", self.to_string())
                    .with_suggestion("Start the connection again to resume watching")
            }
            InformerError::Backend(err) => err.to_payload(),
        }
    }
}
