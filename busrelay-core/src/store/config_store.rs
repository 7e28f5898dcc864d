//! Typed connector configuration on top of a key-value store

use super::kv::{KeyValueStore, Ttl};
use crate::error::{RelayError, RelayResult};
use crate::models::ConnectorConfig;
use async_trait::async_trait;
use serde::Deserialize;

/// Key holding the serialized connector configuration
pub const CONNECTOR_CONFIG_KEY: &str = "connectorConfig";

/// Durable storage for the connector configuration
///
/// `get` never fails on absence: an unsaved config reads as both fields empty.
/// Each `save` replaces both fields together, so a reader never sees one
/// field from one save and the other from another. Concurrent saves are
/// last-writer-wins; there is no versioning or compare-and-swap.
#[async_trait]
pub trait ConfigStore: Send + Sync {
    async fn get(&self) -> RelayResult<ConnectorConfig>;

    async fn save(&self, config: &ConnectorConfig) -> RelayResult<()>;
}

/// Stored document shape; null or missing fields read as empty strings
#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct StoredConnectorConfig {
    connection_string: Option<String>,
    topic_name: Option<String>,
}

impl From<StoredConnectorConfig> for ConnectorConfig {
    fn from(stored: StoredConnectorConfig) -> Self {
        ConnectorConfig {
            connection_string: stored.connection_string.unwrap_or_default(),
            topic_name: stored.topic_name.unwrap_or_default(),
        }
    }
}

/// `ConfigStore` persisting the whole config as one value, without expiry
pub struct KvConfigStore<S> {
    kv: S,
}

impl<S: KeyValueStore> KvConfigStore<S> {
    pub fn new(kv: S) -> Self {
        Self { kv }
    }

    pub fn inner(&self) -> &S {
        &self.kv
    }
}

#[async_trait]
impl<S: KeyValueStore> ConfigStore for KvConfigStore<S> {
    async fn get(&self) -> RelayResult<ConnectorConfig> {
        let raw = match self.kv.get(CONNECTOR_CONFIG_KEY).await? {
            Some(raw) if !raw.trim().is_empty() => raw,
            _ => return Ok(ConnectorConfig::default()),
        };

        let stored: Option<StoredConnectorConfig> = serde_json::from_str(&raw).map_err(|e| {
            RelayError::Persistence(format!("Stored connector config is unreadable: {}", e))
        })?;
        Ok(stored.unwrap_or_default().into())
    }

    async fn save(&self, config: &ConnectorConfig) -> RelayResult<()> {
        let raw = serde_json::to_string(config).map_err(|e| {
            RelayError::Persistence(format!("Failed to encode connector config: {}", e))
        })?;
        self.kv.put(CONNECTOR_CONFIG_KEY, &raw, Ttl::Never).await
    }
}
