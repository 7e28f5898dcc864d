//! Key-value state persisted as a JSON document on disk

use super::kv::{KeyValueStore, StoredEntry, Ttl};
use crate::error::{RelayError, RelayResult};
use async_trait::async_trait;
use chrono::Utc;
use fs2::FileExt;
use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

type Entries = BTreeMap<String, StoredEntry>;

/// File-backed store. The file is the source of truth: every get re-reads it
/// under a shared lock and every put is a read-modify-write under an exclusive
/// lock, so writes from other processes (`busrelay config set` against a
/// running server) are seen on the next read.
pub struct FileKvStore {
    /// Path to JSON state file
    path: PathBuf,
    /// Serializes writers within this process
    write_lock: Arc<Mutex<()>>,
}

impl FileKvStore {
    /// Open the store, validating existing state if the file is present
    pub fn open<P: AsRef<Path>>(path: P) -> RelayResult<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    RelayError::Persistence(format!(
                        "Failed to create state directory {}: {}",
                        parent.display(),
                        e
                    ))
                })?;
            }
        }

        Self::load(&path)?;

        Ok(Self {
            path,
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    /// Load state from file under a shared lock; a missing file is empty state
    fn load(path: &Path) -> RelayResult<Entries> {
        let file = match File::open(path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Entries::new()),
            Err(e) => {
                return Err(RelayError::Persistence(format!(
                    "Failed to open state file {}: {}",
                    path.display(),
                    e
                )))
            }
        };

        file.lock_shared().map_err(|e| {
            RelayError::Persistence(format!("Failed to acquire read lock on state file: {}", e))
        })?;

        // Lock released when the file drops
        Self::read_entries(&file)
    }

    fn read_entries(mut file: &File) -> RelayResult<Entries> {
        let mut contents = String::new();
        file.read_to_string(&mut contents)
            .map_err(|e| RelayError::Persistence(format!("Failed to read state file: {}", e)))?;

        if contents.trim().is_empty() {
            return Ok(Entries::new());
        }

        serde_json::from_str(&contents)
            .map_err(|e| RelayError::Persistence(format!("Failed to parse state file: {}", e)))
    }

    /// Insert one entry, holding an exclusive lock across the read and the rewrite
    fn update(path: &Path, key: String, entry: StoredEntry) -> RelayResult<()> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .map_err(|e| {
                RelayError::Persistence(format!(
                    "Failed to open state file {} for writing: {}",
                    path.display(),
                    e
                ))
            })?;

        file.lock_exclusive().map_err(|e| {
            RelayError::Persistence(format!("Failed to acquire write lock on state file: {}", e))
        })?;

        let mut entries = Self::read_entries(&file)?;
        let now = Utc::now();
        entries.retain(|_, existing| existing.is_live(now));
        entries.insert(key, entry);

        let json = serde_json::to_string_pretty(&entries)
            .map_err(|e| RelayError::Persistence(format!("Failed to serialize state: {}", e)))?;

        // Truncate only once the lock is held
        file.set_len(0)?;
        let mut writer = std::io::BufWriter::new(&file);
        writer.seek(SeekFrom::Start(0))?;
        writer.write_all(json.as_bytes())?;
        writer.flush()?;
        drop(writer);
        file.sync_all()?;

        Ok(())
    }
}

#[async_trait]
impl KeyValueStore for FileKvStore {
    async fn get(&self, key: &str) -> RelayResult<Option<String>> {
        let path = self.path.clone();
        let entries = tokio::task::spawn_blocking(move || Self::load(&path))
            .await
            .map_err(|e| RelayError::Persistence(format!("State reader task failed: {}", e)))??;

        Ok(entries
            .get(key)
            .filter(|entry| entry.is_live(Utc::now()))
            .map(|entry| entry.value.clone()))
    }

    async fn put(&self, key: &str, value: &str, ttl: Ttl) -> RelayResult<()> {
        let path = self.path.clone();
        let write_lock = Arc::clone(&self.write_lock);
        let key = key.to_string();
        let entry = StoredEntry::new(value, ttl);

        tokio::task::spawn_blocking(move || {
            let _guard = write_lock
                .lock()
                .map_err(|_| RelayError::Persistence("state lock poisoned".to_string()))?;
            Self::update(&path, key, entry)
        })
        .await
        .map_err(|e| RelayError::Persistence(format!("State writer task failed: {}", e)))?
    }
}
