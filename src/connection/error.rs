use thiserror::Error;

use crate::error::{ErrorPayload, IntoErrorPayload};

/// Errors returned by [`ConnectionManager`](super::ConnectionManager).
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("connection '{id}' not found")]
    NotFound { id: String },

    #[error("connection '{id}' already exists")]
    AlreadyExists { id: String },

    #[error("no client for connection '{id}'")]
    ClientNotFound { id: String },

    #[error("no connection attached to the current context")]
    NoCurrentConnection,

    #[error("invalid connection: {reason}")]
    Invalid { reason: String },

    /// Failure reported by a backend strategy, passed through unchanged.
    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

impl IntoErrorPayload for ConnectionError {
    fn error_code(&self) -> &'static str {
        match self {
            ConnectionError::NotFound { .. } => "connection_not_found",
            ConnectionError::AlreadyExists { .. } => "connection_already_exists",
            ConnectionError::ClientNotFound { .. } => "client_not_found",
            ConnectionError::NoCurrentConnection => "no_current_connection",
            ConnectionError::Invalid { .. } => "invalid_connection",
            ConnectionError::Backend(_) => "backend_error",
        }
    }

    fn to_payload(&self) -> ErrorPayload {
        let code = self.error_code();
        match self {
            ConnectionError::NotFound { .. } => {
                ErrorPayload::new(code, "Connection not found", self.to_string())
                    .with_suggestion("Reload connections and retry")
            }
            ConnectionError::AlreadyExists { .. } => {
                ErrorPayload::new(code, "Connection already exists", self.to_string())
                    .with_suggestion("Update the existing connection instead")
            }
            ConnectionError::ClientNotFound { .. } => {
                ErrorPayload::new(code, "Connection has no client", self.to_string())
                    .with_suggestion("Check the connection credentials and reload")
            }
            ConnectionError::NoCurrentConnection => {
                ErrorPayload::new(code, "No active connection", self.to_string())
            }
            ConnectionError::Invalid { .. } => {
                ErrorPayload::new(code, "Invalid connection", self.to_string())
            }
            ConnectionError::Backend(err) => err.to_payload(),
        }
    }
}
