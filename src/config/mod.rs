//! Runtime configuration.

mod connections;
mod loader;
mod types;

pub use connections::FileConnectionLoader;
pub use loader::ConfigError;
pub use types::{ConnectionsConfig, InformerConfig, LoggingConfig, RuntimeConfig};
