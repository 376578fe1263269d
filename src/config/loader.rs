use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::config::types::RuntimeConfig;
use crate::error::{ErrorPayload, IntoErrorPayload};

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file '{path}': {source}")]
    ParseError {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Config validation failed: {message}")]
    ValidationError { message: String },
}

impl IntoErrorPayload for ConfigError {
    fn error_code(&self) -> &'static str {
        match self {
            ConfigError::ReadError { .. } => "config_read_error",
            ConfigError::ParseError { .. } => "config_parse_error",
            ConfigError::ValidationError { .. } => "config_validation_error",
        }
    }

    fn to_payload(&self) -> ErrorPayload {
        ErrorPayload::new(self.error_code(), "Invalid configuration", self.to_string())
            .with_suggestion(format!(
                "Check {}",
                RuntimeConfig::config_path().display()
            ))
    }
}

impl RuntimeConfig {
    /// Returns the path to the configuration file.
    ///
    /// Uses `~/.config/plugin-runtime/config.toml` on Unix/macOS,
    /// or equivalent on other platforms via `dirs::config_dir()`.
    /// Falls back to current directory if config_dir is unavailable.
    pub fn config_path() -> PathBuf {
        let config_dir = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        config_dir.join("plugin-runtime").join("config.toml")
    }

    /// Loads configuration from the default config file.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::config_path())
    }

    /// Loads configuration from `path`.
    ///
    /// - If the file doesn't exist, returns `RuntimeConfig::default()`.
    /// - Otherwise parses it as TOML and validates.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(RuntimeConfig::default());
        }

        let content = fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        let config: RuntimeConfig =
            toml::from_str(&content).map_err(|e| ConfigError::ParseError {
                path: path.to_path_buf(),
                source: e,
            })?;

        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration.
    ///
    /// Checks:
    /// - The connection expiry window is non-zero
    /// - Hand-off queues hold at least one item
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.connections.expiry_seconds == 0 {
            return Err(ConfigError::ValidationError {
                message: "connections.expiry_seconds must be greater than zero".to_string(),
            });
        }

        if self.informer.queue_capacity == 0 {
            return Err(ConfigError::ValidationError {
                message: "informer.queue_capacity must be at least 1".to_string(),
            });
        }

        Ok(())
    }
}
