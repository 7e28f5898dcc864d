//! Size-bounded message batches
//!
//! A batch's size is the exact byte length of the JSON array the Service Bus
//! REST transport sends:
//! `[{"Body":"..","BrokerProperties":{"MessageId":".."}}, ...]`.
//! A batch is transmitted whole or not at all.

use crate::bus::PublisherHandle;
use crate::error::{RelayError, RelayResult};
use crate::models::OutboundMessage;
use serde::Serialize;

/// Wire representation of one message inside a batch
#[derive(Serialize)]
pub(crate) struct WireMessage<'a> {
    #[serde(rename = "Body")]
    body: &'a str,
    #[serde(rename = "BrokerProperties")]
    broker_properties: BrokerProperties,
}

#[derive(Serialize)]
struct BrokerProperties {
    #[serde(rename = "MessageId")]
    message_id: String,
}

impl<'a> From<&'a OutboundMessage> for WireMessage<'a> {
    fn from(message: &'a OutboundMessage) -> Self {
        Self {
            body: &message.body,
            broker_properties: BrokerProperties {
                message_id: message.id.to_string(),
            },
        }
    }
}

/// Serialized size of a single message entry
pub fn encoded_len(message: &OutboundMessage) -> usize {
    serde_json::to_vec(&WireMessage::from(message))
        .map(|encoded| encoded.len())
        .unwrap_or(usize::MAX)
}

/// Ordered messages whose serialized form stays within `max_size_bytes`
#[derive(Debug, Clone)]
pub struct MessageBatch {
    max_size_bytes: usize,
    size_bytes: usize,
    messages: Vec<OutboundMessage>,
}

impl MessageBatch {
    /// Empty batch with a fixed capacity ceiling
    pub fn new(max_size_bytes: usize) -> Self {
        Self {
            max_size_bytes,
            size_bytes: 2, // "[]"
            messages: Vec::new(),
        }
    }

    /// Append the message if the batch stays within its ceiling.
    /// Returns false and leaves the batch untouched otherwise.
    pub fn try_add(&mut self, message: OutboundMessage) -> bool {
        let separator = usize::from(!self.messages.is_empty());
        let grown = self
            .size_bytes
            .saturating_add(separator)
            .saturating_add(encoded_len(&message));
        if grown > self.max_size_bytes {
            return false;
        }
        self.size_bytes = grown;
        self.messages.push(message);
        true
    }

    pub fn messages(&self) -> &[OutboundMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Current serialized size in bytes
    pub fn size_bytes(&self) -> usize {
        self.size_bytes
    }

    pub fn max_size_bytes(&self) -> usize {
        self.max_size_bytes
    }

    /// The JSON array sent on the wire
    pub fn to_wire_json(&self) -> RelayResult<Vec<u8>> {
        let wire: Vec<WireMessage<'_>> = self.messages.iter().map(WireMessage::from).collect();
        serde_json::to_vec(&wire)
            .map_err(|e| RelayError::Transport(format!("Failed to encode batch: {}", e)))
    }
}

/// Creates batches and hands them to a publisher
#[derive(Debug, Clone, Copy)]
pub struct MessageBatcher {
    max_size_bytes: usize,
}

impl MessageBatcher {
    pub fn new(max_size_bytes: usize) -> Self {
        Self { max_size_bytes }
    }

    /// Batch bounded by both the configured limit and the publisher's limit
    pub fn new_batch_for(&self, handle: &PublisherHandle) -> MessageBatch {
        MessageBatch::new(self.max_size_bytes.min(handle.max_batch_size_bytes()))
    }

    /// Transmit a batch; an empty batch is not sent
    pub async fn send(&self, batch: &MessageBatch, handle: &mut PublisherHandle) -> RelayResult<()> {
        if batch.is_empty() {
            return Ok(());
        }
        tracing::debug!(
            transport = handle.transport(),
            topic = handle.topic(),
            messages = batch.len(),
            size_bytes = batch.size_bytes(),
            "Sending batch"
        );
        handle.send(batch).await
    }
}
