//! Durable persistence of connector settings
//!
//! `KeyValueStore` is the raw substrate (memory or a JSON file on disk);
//! `ConfigStore` is the typed view the relay service depends on.

mod config_store;
mod file;
mod kv;

pub use config_store::{ConfigStore, KvConfigStore, CONNECTOR_CONFIG_KEY};
pub use file::FileKvStore;
pub use kv::{KeyValueStore, MemoryKvStore, Ttl};

use crate::error::RelayResult;
use crate::models::{StoreBackend, StoreSettings};
use std::sync::Arc;

/// Build the config store selected by the settings
pub fn create_config_store(settings: &StoreSettings) -> RelayResult<Arc<dyn ConfigStore>> {
    match settings.backend {
        StoreBackend::File => {
            let kv = FileKvStore::open(&settings.path)?;
            Ok(Arc::new(KvConfigStore::new(kv)))
        }
        StoreBackend::Memory => Ok(Arc::new(KvConfigStore::new(MemoryKvStore::new()))),
    }
}
