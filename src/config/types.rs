use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration container.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuntimeConfig {
    #[serde(default)]
    pub connections: ConnectionsConfig,
    #[serde(default)]
    pub informer: InformerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Connection manager settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionsConfig {
    /// Expiry window stamped on a connection after it starts (default: 24h).
    #[serde(default = "default_expiry_seconds")]
    pub expiry_seconds: u64,
    /// Optional TOML file listing `[[connections]]` for the file loader.
    #[serde(default)]
    pub connections_file: Option<PathBuf>,
}

impl ConnectionsConfig {
    pub fn expiry(&self) -> Duration {
        Duration::from_secs(self.expiry_seconds)
    }
}

/// Informer manager settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InformerConfig {
    /// Capacity of the event and state hand-off queues (default: 1).
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset (default: "info").
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

fn default_expiry_seconds() -> u64 {
    24 * 60 * 60
}

fn default_queue_capacity() -> usize {
    1
}

fn default_log_filter() -> String {
    "info".to_string()
}

impl Default for ConnectionsConfig {
    fn default() -> Self {
        Self {
            expiry_seconds: default_expiry_seconds(),
            connections_file: None,
        }
    }
}

impl Default for InformerConfig {
    fn default() -> Self {
        Self {
            queue_capacity: default_queue_capacity(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
        }
    }
}
