//! Relay service: config read/write and message publishing
//!
//! Operations are independent and stateless apart from the config store.
//! Publishing follows one linear sequence per call: read config, connect,
//! batch, send, close. The handle is closed on every path once connect has
//! succeeded, and no step is retried.

use crate::batch::{encoded_len, MessageBatcher};
use crate::bus::{BusClientFactory, PublisherHandle};
use crate::error::{RelayError, RelayResult};
use crate::models::{ConnectorConfig, OutboundMessage, RelayRequest, RelayResponse};
use crate::services::logging::{log_error, log_relay_event};
use crate::store::ConfigStore;
use serde_json::Value;
use std::sync::Arc;

/// Orchestrates the config store, bus factory and batcher
#[derive(Clone)]
pub struct RelayService {
    store: Arc<dyn ConfigStore>,
    bus: Arc<dyn BusClientFactory>,
    batcher: MessageBatcher,
}

impl RelayService {
    pub fn new(
        store: Arc<dyn ConfigStore>,
        bus: Arc<dyn BusClientFactory>,
        batcher: MessageBatcher,
    ) -> Self {
        Self {
            store,
            bus,
            batcher,
        }
    }

    /// Replace the stored connector configuration
    pub async fn save_config(&self, config: &ConnectorConfig) -> RelayResult<()> {
        if config.is_partial() {
            tracing::warn!(
                topic = %config.topic_name,
                "Saving connector config with only one of connectionString/topicName set"
            );
        }
        match self.store.save(config).await {
            Ok(()) => {
                log_relay_event("saveConfig", &config.topic_name, None);
                Ok(())
            }
            Err(e) => {
                log_error(&e.to_string(), Some("saveConfig"));
                Err(e)
            }
        }
    }

    /// Stored connector configuration; empty fields when nothing was saved
    pub async fn get_config(&self) -> RelayResult<ConnectorConfig> {
        self.store.get().await.inspect_err(|e| {
            log_error(&e.to_string(), Some("getConfig"));
        })
    }

    /// Publish one message to the configured topic
    pub async fn publish(&self, body: &str) -> RelayResult<()> {
        match self.try_publish(body).await {
            Ok(topic) => {
                log_relay_event("sendMessage", &topic, Some("message sent"));
                Ok(())
            }
            Err(e) => {
                log_error(&e.to_string(), Some("sendMessage"));
                Err(e)
            }
        }
    }

    async fn try_publish(&self, body: &str) -> RelayResult<String> {
        // An empty config is not checked here; connect reports it.
        let config = self.store.get().await?;

        let mut handle = self
            .bus
            .connect(&config.connection_string, &config.topic_name)
            .await?;

        let outcome = self.send_one(&mut handle, OutboundMessage::new(body)).await;

        if let Err(e) = handle.close().await {
            tracing::warn!(
                transport = handle.transport(),
                topic = handle.topic(),
                error = %e,
                "Failed to close publisher"
            );
        }

        outcome.map(|()| handle.topic().to_string())
    }

    async fn send_one(
        &self,
        handle: &mut PublisherHandle,
        message: OutboundMessage,
    ) -> RelayResult<()> {
        let mut batch = self.batcher.new_batch_for(handle);
        let size = encoded_len(&message);
        if !batch.try_add(message) {
            return Err(RelayError::MessageTooLarge {
                size,
                max: batch.max_size_bytes(),
            });
        }
        self.batcher.send(&batch, handle).await
    }

    /// Execute a parsed request and build its response envelope
    pub async fn handle(&self, request: RelayRequest) -> RelayResponse {
        tracing::debug!(operation = request.operation(), "Handling relay request");
        let result = match request {
            RelayRequest::SaveConfig(config) => self
                .save_config(&config)
                .await
                .map(|()| RelayResponse::no_content()),
            RelayRequest::GetConfig => match self.get_config().await {
                Ok(config) => RelayResponse::connector_config(&config),
                Err(e) => Err(e),
            },
            RelayRequest::SendMessage(message) => {
                self.publish(&message).await.map(|()| RelayResponse::ok())
            }
            RelayRequest::Forward(payload) => match serde_json::to_string(&payload) {
                Ok(body) => self.publish(&body).await.map(|()| RelayResponse::ok()),
                Err(e) => Err(RelayError::InvalidRequest(format!(
                    "payload cannot be forwarded: {}",
                    e
                ))),
            },
        };

        result.unwrap_or_else(|e| RelayResponse::error(&e))
    }

    /// Parse a raw JSON payload and execute it
    pub async fn handle_value(&self, payload: Value) -> RelayResponse {
        match RelayRequest::from_value(payload) {
            Ok(request) => self.handle(request).await,
            Err(e) => {
                log_error(&e.to_string(), Some("parseRequest"));
                RelayResponse::error(&e)
            }
        }
    }
}
