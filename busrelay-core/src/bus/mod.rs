//! Message bus transports
//!
//! A `BusClientFactory` turns a connection string and topic into a
//! `PublisherHandle`. Each publish call owns exactly one handle and must close
//! it before returning, whatever happened in between.

mod connection_string;
mod file;
mod memory;
mod servicebus;

pub use connection_string::ConnectionString;
pub use file::{FileBusFactory, FilePublisher};
pub use memory::{InMemoryBus, MemoryPublisher};
pub use servicebus::{shared_access_signature, ServiceBusFactory, ServiceBusPublisher};

use crate::batch::MessageBatch;
use crate::error::{RelayError, RelayResult};
use crate::models::{TransportKind, TransportSettings};
use async_trait::async_trait;
use std::sync::Arc;

/// A live connection to one topic
#[async_trait]
pub trait Publisher: Send {
    /// Transport name for logging
    fn name(&self) -> &str;

    fn topic(&self) -> &str;

    /// Largest serialized batch the transport accepts
    fn max_batch_size_bytes(&self) -> usize;

    /// Transmit every message of the batch as one operation
    async fn send_batch(&mut self, batch: &MessageBatch) -> RelayResult<()>;

    /// Release network and file resources
    async fn close(&mut self) -> RelayResult<()>;
}

/// Produces connected publishers
#[async_trait]
pub trait BusClientFactory: Send + Sync {
    /// Connect to `topic_name` on the namespace named by `connection_string`.
    ///
    /// Empty or malformed connection strings and unreachable targets fail with
    /// `RelayError::Connection` instead of yielding a publisher that drops messages.
    async fn connect(
        &self,
        connection_string: &str,
        topic_name: &str,
    ) -> RelayResult<PublisherHandle>;
}

/// Exclusive owner of a publisher for the duration of one publish call.
///
/// Dropping a handle that was never closed (the publish future was cancelled)
/// hands the publisher to the runtime to be closed in the background.
pub struct PublisherHandle {
    publisher: Option<Box<dyn Publisher>>,
    transport: String,
    topic: String,
    max_batch_size_bytes: usize,
}

impl PublisherHandle {
    pub fn new(publisher: Box<dyn Publisher>) -> Self {
        Self {
            transport: publisher.name().to_string(),
            topic: publisher.topic().to_string(),
            max_batch_size_bytes: publisher.max_batch_size_bytes(),
            publisher: Some(publisher),
        }
    }

    pub fn transport(&self) -> &str {
        &self.transport
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn max_batch_size_bytes(&self) -> usize {
        self.max_batch_size_bytes
    }

    pub async fn send(&mut self, batch: &MessageBatch) -> RelayResult<()> {
        match self.publisher.as_mut() {
            Some(publisher) => publisher.send_batch(batch).await,
            None => Err(RelayError::Transport(
                "publisher handle is already closed".to_string(),
            )),
        }
    }

    /// Close the underlying publisher. Calling it again is a no-op.
    pub async fn close(&mut self) -> RelayResult<()> {
        match self.publisher.take() {
            Some(mut publisher) => publisher.close().await,
            None => Ok(()),
        }
    }
}

impl Drop for PublisherHandle {
    fn drop(&mut self) {
        let Some(mut publisher) = self.publisher.take() else {
            return;
        };

        tracing::warn!(
            transport = %self.transport,
            topic = %self.topic,
            "Publisher handle dropped without close; releasing in background"
        );

        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                let topic = self.topic.clone();
                runtime.spawn(async move {
                    if let Err(e) = publisher.close().await {
                        tracing::warn!(topic = %topic, error = %e, "Failed to close dropped publisher");
                    }
                });
            }
            Err(_) => {
                tracing::error!(
                    transport = %self.transport,
                    topic = %self.topic,
                    "No async runtime available to close dropped publisher"
                );
            }
        }
    }
}

/// Create the bus client factory selected by the transport settings
pub fn create_bus_factory(settings: &TransportSettings) -> RelayResult<Arc<dyn BusClientFactory>> {
    match settings.kind {
        TransportKind::ServiceBus => Ok(Arc::new(ServiceBusFactory::new(settings)?)),
        TransportKind::File => Ok(Arc::new(FileBusFactory::new(settings))),
        TransportKind::Memory => Ok(Arc::new(InMemoryBus::new(settings.max_batch_size_bytes))),
    }
}
