//! Connection loader backed by a TOML file.
//!
//! ```toml
//! [[connections]]
//! id = "prod"
//! name = "Production"
//! labels = { env = "prod" }
//! data = { kubeconfig = "~/.kube/config", context = "prod" }
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use async_trait::async_trait;
use serde::Deserialize;

use crate::config::ConnectionsConfig;
use crate::connection::{Connection, ConnectionLoader};
use crate::context::PluginContext;

#[derive(Debug, Default, Deserialize)]
struct ConnectionsFile {
    #[serde(default)]
    connections: Vec<Connection>,
}

/// Loads connection records from a TOML file on every call.
///
/// A missing file yields no connections, so hosts can point at a path the
/// user has not created yet.
#[derive(Debug, Clone)]
pub struct FileConnectionLoader {
    path: PathBuf,
}

impl FileConnectionLoader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Loader for the configured `connections_file`, if one is set.
    pub fn from_config(config: &ConnectionsConfig) -> Option<Self> {
        config.connections_file.as_ref().map(Self::new)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> anyhow::Result<Vec<Connection>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let content = fs::read_to_string(&self.path)
            .with_context(|| format!("failed to read {}", self.path.display()))?;
        let file: ConnectionsFile = toml::from_str(&content)
            .with_context(|| format!("failed to parse {}", self.path.display()))?;
        Ok(file.connections)
    }
}

#[async_trait]
impl ConnectionLoader for FileConnectionLoader {
    async fn load(&self, ctx: &PluginContext) -> anyhow::Result<Vec<Connection>> {
        let connections = self.read()?;
        tracing::debug!(
            request_id = %ctx.request_id(),
            path = %self.path.display(),
            count = connections.len(),
            "Read connections file"
        );
        Ok(connections)
    }
}
