use std::collections::BTreeMap;
use std::time::{Duration, SystemTime};

use serde::{Deserialize, Serialize};

/// A tenant-scoped, authenticated handle to one backend instance.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Connection {
    /// Unique, stable identifier. Never empty once stored.
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub avatar: String,
    /// How long the connection stays valid after a refresh.
    #[serde(default, with = "duration_secs")]
    pub expiry_time: Duration,
    /// When the connection was last started. `None` when stopped.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_refresh: Option<SystemTime>,
    /// Backend specific credentials and settings.
    #[serde(default)]
    pub data: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

impl Connection {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    pub fn with_data(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.data.insert(key.into(), value);
        self
    }

    /// Union `other`'s maps into this record. Keys already present win.
    ///
    /// Used when a loader re-discovers a known connection so in-memory edits
    /// are never clobbered.
    pub(crate) fn merge_missing(&mut self, other: &Connection) {
        for (key, value) in &other.data {
            self.data.entry(key.clone()).or_insert_with(|| value.clone());
        }
        for (key, value) in &other.labels {
            self.labels.entry(key.clone()).or_insert_with(|| value.clone());
        }
    }

    /// Apply a partial update: non-empty scalars replace, map entries are
    /// upserted key by key. Nothing unspecified is erased.
    pub(crate) fn apply_update(&mut self, update: &Connection) {
        if !update.name.is_empty() {
            self.name = update.name.clone();
        }
        if !update.description.is_empty() {
            self.description = update.description.clone();
        }
        if !update.avatar.is_empty() {
            self.avatar = update.avatar.clone();
        }
        for (key, value) in &update.data {
            self.data.insert(key.clone(), value.clone());
        }
        for (key, value) in &update.labels {
            self.labels.insert(key.clone(), value.clone());
        }
    }

    /// Whether a started connection has outlived its expiry window.
    ///
    /// Stopped connections (no `last_refresh`) never expire.
    pub fn is_expired(&self, now: SystemTime) -> bool {
        match self.last_refresh {
            Some(refreshed) => refreshed
                .checked_add(self.expiry_time)
                .map(|deadline| deadline < now)
                .unwrap_or(false),
            None => false,
        }
    }
}

/// Outcome of a health check.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConnectionStatusCode {
    #[default]
    Unknown,
    Connected,
    Disconnected,
    Pending,
    Failed,
    Error,
    Unauthorized,
    Forbidden,
    BadRequest,
    NotFound,
    Timeout,
    Unavailable,
    RequestEntityTooLarge,
}

impl std::fmt::Display for ConnectionStatusCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ConnectionStatusCode::Unknown => "unknown",
            ConnectionStatusCode::Connected => "connected",
            ConnectionStatusCode::Disconnected => "disconnected",
            ConnectionStatusCode::Pending => "pending",
            ConnectionStatusCode::Failed => "failed",
            ConnectionStatusCode::Error => "error",
            ConnectionStatusCode::Unauthorized => "unauthorized",
            ConnectionStatusCode::Forbidden => "forbidden",
            ConnectionStatusCode::BadRequest => "bad_request",
            ConnectionStatusCode::NotFound => "not_found",
            ConnectionStatusCode::Timeout => "timeout",
            ConnectionStatusCode::Unavailable => "unavailable",
            ConnectionStatusCode::RequestEntityTooLarge => "request_entity_too_large",
        };
        f.write_str(name)
    }
}

/// Freshly computed status of a connection. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionStatus {
    pub connection: Connection,
    pub status: ConnectionStatusCode,
    #[serde(default)]
    pub error: String,
    #[serde(default)]
    pub details: String,
}

impl ConnectionStatus {
    pub fn new(connection: Connection, status: ConnectionStatusCode) -> Self {
        Self {
            connection,
            status,
            error: String::new(),
            details: String::new(),
        }
    }

    pub fn failed(
        connection: Connection,
        error: impl Into<String>,
        details: impl Into<String>,
    ) -> Self {
        Self {
            connection,
            status: ConnectionStatusCode::Failed,
            error: error.into(),
            details: details.into(),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.status == ConnectionStatusCode::Connected
    }
}

/// Serialize a `Duration` as whole seconds so records stay readable in
/// TOML connection files.
mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn merge_missing_keeps_existing_keys() {
        let mut existing = Connection::new("c1")
            .with_label("env", "prod")
            .with_data("kubeconfig", json!("/a"));
        let reloaded = Connection::new("c1")
            .with_label("env", "staging")
            .with_label("team", "infra")
            .with_data("kubeconfig", json!("/b"))
            .with_data("context", json!("main"));

        existing.merge_missing(&reloaded);

        assert_eq!(existing.labels["env"], "prod");
        assert_eq!(existing.labels["team"], "infra");
        assert_eq!(existing.data["kubeconfig"], json!("/a"));
        assert_eq!(existing.data["context"], json!("main"));
    }

    #[test]
    fn apply_update_ignores_empty_scalars() {
        let mut existing = Connection::new("c1").with_name("Cluster").with_label("env", "prod");
        existing.avatar = "icon.png".to_string();

        let update = Connection {
            description: "primary".to_string(),
            ..Connection::new("c1")
        };
        existing.apply_update(&update);

        assert_eq!(existing.name, "Cluster");
        assert_eq!(existing.description, "primary");
        assert_eq!(existing.avatar, "icon.png");
        assert_eq!(existing.labels["env"], "prod");
    }

    #[test]
    fn is_expired_only_after_window() {
        let now = SystemTime::now();
        let mut connection = Connection::new("c1");
        assert!(!connection.is_expired(now));

        connection.last_refresh = Some(now - Duration::from_secs(120));
        connection.expiry_time = Duration::from_secs(60);
        assert!(connection.is_expired(now));

        connection.expiry_time = Duration::from_secs(600);
        assert!(!connection.is_expired(now));
    }

    #[test]
    fn status_code_serializes_screaming_case() {
        let encoded = serde_json::to_string(&ConnectionStatusCode::RequestEntityTooLarge).unwrap();
        assert_eq!(encoded, "\"REQUEST_ENTITY_TOO_LARGE\"");
    }
}
