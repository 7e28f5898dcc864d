//! Key-value store abstraction and in-memory implementation

use crate::error::RelayResult;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

/// Time-to-live for a stored value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ttl {
    /// Never expires
    Never,
    Seconds(u64),
}

impl Ttl {
    /// Absolute expiry for a value written at `now`
    pub fn expires_at(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            Ttl::Never => None,
            // Overflowing lifetimes are treated as never expiring
            Ttl::Seconds(secs) => {
                let delta = i64::try_from(*secs).ok().and_then(Duration::try_seconds)?;
                now.checked_add_signed(delta)
            }
        }
    }
}

/// Raw durable key-value persistence
///
/// Absence is data: `get` returns `Ok(None)` for missing or expired keys.
/// Concurrent `put`/`get` on the same key are last-writer-wins with no
/// ordering guarantee beyond that.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> RelayResult<Option<String>>;

    async fn put(&self, key: &str, value: &str, ttl: Ttl) -> RelayResult<()>;
}

/// A stored value with its optional expiry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct StoredEntry {
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl StoredEntry {
    pub fn new(value: &str, ttl: Ttl) -> Self {
        Self {
            value: value.to_string(),
            expires_at: ttl.expires_at(Utc::now()),
        }
    }

    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map_or(true, |at| at > now)
    }
}

/// Process-local store, lost on restart
#[derive(Debug, Default)]
pub struct MemoryKvStore {
    entries: DashMap<String, StoredEntry>,
}

impl MemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for MemoryKvStore {
    async fn get(&self, key: &str) -> RelayResult<Option<String>> {
        let now = Utc::now();
        let live = self
            .entries
            .get(key)
            .map(|entry| (entry.is_live(now), entry.value.clone()));

        match live {
            Some((true, value)) => Ok(Some(value)),
            Some((false, _)) => {
                self.entries.remove_if(key, |_, entry| !entry.is_live(now));
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn put(&self, key: &str, value: &str, ttl: Ttl) -> RelayResult<()> {
        self.entries
            .insert(key.to_string(), StoredEntry::new(value, ttl));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_key_is_absent() {
        let store = MemoryKvStore::new();
        assert_eq!(store.get("connectorConfig").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_put_then_get() {
        let store = MemoryKvStore::new();
        store.put("k", "v1", Ttl::Never).await.unwrap();
        store.put("k", "v2", Ttl::Never).await.unwrap();
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("v2"));
    }

    #[tokio::test]
    async fn test_expired_entry_reads_as_absent() {
        let store = MemoryKvStore::new();
        store.entries.insert(
            "k".to_string(),
            StoredEntry {
                value: "old".to_string(),
                expires_at: Some(Utc::now() - Duration::seconds(1)),
            },
        );
        assert_eq!(store.get("k").await.unwrap(), None);
        assert!(store.entries.is_empty());
    }

    #[test]
    fn test_ttl_expiry() {
        let now = Utc::now();
        assert_eq!(Ttl::Never.expires_at(now), None);
        assert_eq!(
            Ttl::Seconds(60).expires_at(now),
            Some(now + Duration::seconds(60))
        );
    }
}
