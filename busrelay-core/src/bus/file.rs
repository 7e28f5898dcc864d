//! File transport: appends published messages to JSON lines files, useful for
//! debugging and offline runs. Connection strings take the form `file:///dir`;
//! each topic maps to `<dir>/<topic>.jsonl`.

use super::{BusClientFactory, ConnectionString, Publisher, PublisherHandle};
use crate::batch::MessageBatch;
use crate::error::{RelayError, RelayResult};
use crate::models::TransportSettings;
use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;

/// Factory for file publishers
pub struct FileBusFactory {
    max_batch_size_bytes: usize,
}

impl FileBusFactory {
    pub fn new(settings: &TransportSettings) -> Self {
        Self {
            max_batch_size_bytes: settings.max_batch_size_bytes,
        }
    }
}

fn is_valid_topic_file_name(topic: &str) -> bool {
    !topic.is_empty()
        && topic != "."
        && topic != ".."
        && !topic.contains(['/', '\\', '\0'])
}

#[async_trait]
impl BusClientFactory for FileBusFactory {
    async fn connect(
        &self,
        connection_string: &str,
        topic_name: &str,
    ) -> RelayResult<PublisherHandle> {
        let parsed = ConnectionString::parse(connection_string)?;
        if parsed.endpoint.scheme() != "file" {
            return Err(RelayError::Connection(format!(
                "file transport requires a file:// endpoint, got {}://",
                parsed.endpoint.scheme()
            )));
        }
        let dir = parsed.endpoint.to_file_path().map_err(|_| {
            RelayError::Connection("file endpoint is not a local path".to_string())
        })?;

        let topic = parsed.resolve_topic(topic_name)?;
        if !is_valid_topic_file_name(&topic) {
            return Err(RelayError::Connection(format!(
                "topic '{}' cannot be used as a file name",
                topic
            )));
        }

        std::fs::create_dir_all(&dir).map_err(|e| {
            RelayError::Connection(format!("Failed to create {}: {}", dir.display(), e))
        })?;

        let publisher = FilePublisher::new(dir.join(format!("{}.jsonl", topic)), topic)
            .with_max_batch_size(self.max_batch_size_bytes);
        Ok(PublisherHandle::new(Box::new(publisher)))
    }
}

#[derive(Serialize)]
struct FileRecord<'a> {
    id: String,
    topic: &'a str,
    timestamp: String,
    body: &'a str,
}

/// Publisher writing one JSON line per message
pub struct FilePublisher {
    file_path: PathBuf,
    topic: String,
    max_batch_size_bytes: usize,
    file: Option<std::fs::File>,
}

impl FilePublisher {
    pub fn new(file_path: impl Into<PathBuf>, topic: String) -> Self {
        Self {
            file_path: file_path.into(),
            topic,
            max_batch_size_bytes: TransportSettings::default().max_batch_size_bytes,
            file: None,
        }
    }

    pub fn with_max_batch_size(mut self, max_batch_size_bytes: usize) -> Self {
        self.max_batch_size_bytes = max_batch_size_bytes;
        self
    }

    /// Open or get the file handle
    fn get_file(&mut self) -> RelayResult<&mut std::fs::File> {
        if self.file.is_none() {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.file_path)
                .map_err(|e| {
                    RelayError::Transport(format!(
                        "Failed to open file {}: {}",
                        self.file_path.display(),
                        e
                    ))
                })?;
            self.file = Some(file);
        }
        self.file
            .as_mut()
            .ok_or_else(|| RelayError::Transport("file handle unavailable".to_string()))
    }
}

#[async_trait]
impl Publisher for FilePublisher {
    fn name(&self) -> &str {
        "file"
    }

    fn topic(&self) -> &str {
        &self.topic
    }

    fn max_batch_size_bytes(&self) -> usize {
        self.max_batch_size_bytes
    }

    async fn send_batch(&mut self, batch: &MessageBatch) -> RelayResult<()> {
        // Encode everything first so a batch lands whole or not at all
        let timestamp = Utc::now().to_rfc3339();
        let mut lines = String::new();
        for message in batch.messages() {
            let record = FileRecord {
                id: message.id.to_string(),
                topic: &self.topic,
                timestamp: timestamp.clone(),
                body: &message.body,
            };
            let json = serde_json::to_string(&record)
                .map_err(|e| RelayError::Transport(format!("Failed to serialize message: {}", e)))?;
            lines.push_str(&json);
            lines.push('\n');
        }

        let file_path = self.file_path.clone();
        let file = self.get_file()?;
        file.write_all(lines.as_bytes()).map_err(|e| {
            RelayError::Transport(format!("Failed to write to file {}: {}", file_path.display(), e))
        })?;
        file.flush().map_err(|e| {
            RelayError::Transport(format!("Failed to flush file {}: {}", file_path.display(), e))
        })?;

        Ok(())
    }

    async fn close(&mut self) -> RelayResult<()> {
        if let Some(file) = &mut self.file {
            file.flush().map_err(|e| {
                RelayError::Transport(format!(
                    "Failed to flush file {}: {}",
                    self.file_path.display(),
                    e
                ))
            })?;
        }
        self.file = None;
        Ok(())
    }
}
