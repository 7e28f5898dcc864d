//! In-process bus that records deliveries and handle lifecycle counts

use super::{BusClientFactory, ConnectionString, Publisher, PublisherHandle};
use crate::batch::MessageBatch;
use crate::error::{RelayError, RelayResult};
use crate::models::OutboundMessage;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Default)]
struct BusState {
    delivered: HashMap<String, Vec<OutboundMessage>>,
    unreachable_topics: HashSet<String>,
    fail_sends: bool,
    connects: usize,
    closes: usize,
    sends: usize,
}

/// Shared in-memory bus; clones observe the same state
#[derive(Debug, Clone)]
pub struct InMemoryBus {
    state: Arc<Mutex<BusState>>,
    max_batch_size_bytes: usize,
}

impl InMemoryBus {
    pub fn new(max_batch_size_bytes: usize) -> Self {
        Self {
            state: Arc::new(Mutex::new(BusState::default())),
            max_batch_size_bytes,
        }
    }

    fn state(&self) -> MutexGuard<'_, BusState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Make every subsequent send fail with a transport error
    pub fn fail_sends(&self, fail: bool) {
        self.state().fail_sends = fail;
    }

    /// Make connects to `topic` fail as unreachable
    pub fn mark_unreachable(&self, topic: &str) {
        self.state().unreachable_topics.insert(topic.to_string());
    }

    /// Message bodies delivered to `topic`, in order
    pub fn messages(&self, topic: &str) -> Vec<String> {
        self.state()
            .delivered
            .get(topic)
            .map(|messages| messages.iter().map(|m| m.body.clone()).collect())
            .unwrap_or_default()
    }

    pub fn connect_count(&self) -> usize {
        self.state().connects
    }

    pub fn close_count(&self) -> usize {
        self.state().closes
    }

    pub fn send_count(&self) -> usize {
        self.state().sends
    }

    /// Handles connected but not yet closed
    pub fn open_handles(&self) -> usize {
        let state = self.state();
        state.connects.saturating_sub(state.closes)
    }
}

#[async_trait]
impl BusClientFactory for InMemoryBus {
    async fn connect(
        &self,
        connection_string: &str,
        topic_name: &str,
    ) -> RelayResult<PublisherHandle> {
        let parsed = ConnectionString::parse(connection_string)?;
        let topic = parsed.resolve_topic(topic_name)?;

        {
            let mut state = self.state();
            if state.unreachable_topics.contains(&topic) {
                return Err(RelayError::Connection(format!(
                    "topic '{}' is unreachable",
                    topic
                )));
            }
            state.connects += 1;
        }

        Ok(PublisherHandle::new(Box::new(MemoryPublisher {
            bus: self.clone(),
            topic,
            closed: false,
        })))
    }
}

/// Publisher delivering into an `InMemoryBus`
pub struct MemoryPublisher {
    bus: InMemoryBus,
    topic: String,
    closed: bool,
}

#[async_trait]
impl Publisher for MemoryPublisher {
    fn name(&self) -> &str {
        "memory"
    }

    fn topic(&self) -> &str {
        &self.topic
    }

    fn max_batch_size_bytes(&self) -> usize {
        self.bus.max_batch_size_bytes
    }

    async fn send_batch(&mut self, batch: &MessageBatch) -> RelayResult<()> {
        let mut state = self.bus.state();
        state.sends += 1;
        if state.fail_sends {
            return Err(RelayError::Transport(format!(
                "delivery to '{}' failed",
                self.topic
            )));
        }
        state
            .delivered
            .entry(self.topic.clone())
            .or_default()
            .extend(batch.messages().iter().cloned());
        Ok(())
    }

    async fn close(&mut self) -> RelayResult<()> {
        if !self.closed {
            self.closed = true;
            self.bus.state().closes += 1;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_delivery_and_counters() {
        let bus = InMemoryBus::new(1024);
        let mut handle = bus.connect("memory://local", "events").await.unwrap();
        assert_eq!(bus.open_handles(), 1);

        let mut batch = MessageBatch::new(handle.max_batch_size_bytes());
        assert!(batch.try_add(OutboundMessage::new("hello")));
        handle.send(&batch).await.unwrap();
        handle.close().await.unwrap();
        handle.close().await.unwrap();

        assert_eq!(bus.messages("events"), vec!["hello"]);
        assert_eq!(bus.send_count(), 1);
        assert_eq!(bus.close_count(), 1);
        assert_eq!(bus.open_handles(), 0);
    }

    #[tokio::test]
    async fn test_send_after_close_fails() {
        let bus = InMemoryBus::new(1024);
        let mut handle = bus.connect("memory://local", "events").await.unwrap();
        handle.close().await.unwrap();

        let batch = MessageBatch::new(1024);
        assert!(matches!(
            handle.send(&batch).await,
            Err(RelayError::Transport(_))
        ));
        assert_eq!(bus.send_count(), 0);
    }

    #[tokio::test]
    async fn test_unreachable_topic() {
        let bus = InMemoryBus::new(1024);
        bus.mark_unreachable("events");
        assert!(matches!(
            bus.connect("memory://local", "events").await,
            Err(RelayError::Connection(_))
        ));
        assert_eq!(bus.connect_count(), 0);
    }
}
