//! Azure Service Bus transport over the REST send API

use super::{BusClientFactory, ConnectionString, Publisher, PublisherHandle};
use crate::batch::MessageBatch;
use crate::error::{RelayError, RelayResult};
use crate::models::TransportSettings;
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use hmac::{Hmac, Mac};
use reqwest::Client;
use sha2::Sha256;
use std::time::Duration;
use url::Url;

const BATCH_CONTENT_TYPE: &str = "application/vnd.microsoft.servicebus.json";
const TOKEN_LIFETIME_SECS: i64 = 3600;

/// Build a SharedAccessSignature authorization value for `resource`
pub fn shared_access_signature(
    resource: &str,
    key_name: &str,
    key: &str,
    expiry_unix_secs: i64,
) -> RelayResult<String> {
    let encoded_resource = urlencoding::encode(resource);
    let string_to_sign = format!("{}\n{}", encoded_resource, expiry_unix_secs);

    let mut mac = Hmac::<Sha256>::new_from_slice(key.as_bytes())
        .map_err(|e| RelayError::Connection(format!("invalid shared access key: {}", e)))?;
    mac.update(string_to_sign.as_bytes());
    let signature = BASE64.encode(mac.finalize().into_bytes());

    Ok(format!(
        "SharedAccessSignature sr={}&sig={}&se={}&skn={}",
        encoded_resource,
        urlencoding::encode(&signature),
        expiry_unix_secs,
        urlencoding::encode(key_name)
    ))
}

/// Map the namespace endpoint to the HTTP base used by the REST API.
/// `sb://` becomes `https://`; `http(s)://` is kept as given.
fn http_base(endpoint: &Url) -> RelayResult<Url> {
    match endpoint.scheme() {
        "http" | "https" => Ok(endpoint.clone()),
        "sb" => {
            let host = endpoint.host_str().filter(|h| !h.is_empty()).ok_or_else(|| {
                RelayError::Connection("Endpoint has no namespace host".to_string())
            })?;
            let authority = match endpoint.port() {
                Some(port) => format!("{}:{}", host, port),
                None => host.to_string(),
            };
            Url::parse(&format!("https://{}{}", authority, endpoint.path()))
                .map_err(|e| RelayError::Connection(format!("malformed Endpoint: {}", e)))
        }
        other => Err(RelayError::Connection(format!(
            "unsupported endpoint scheme for Service Bus: {}",
            other
        ))),
    }
}

/// Factory for Service Bus publishers
pub struct ServiceBusFactory {
    client: Client,
    connect_timeout: Duration,
    max_batch_size_bytes: usize,
}

impl ServiceBusFactory {
    pub fn new(settings: &TransportSettings) -> RelayResult<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(settings.connect_timeout_secs))
            .timeout(Duration::from_secs(settings.send_timeout_secs))
            .build()
            .map_err(|e| RelayError::Connection(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            connect_timeout: Duration::from_secs(settings.connect_timeout_secs),
            max_batch_size_bytes: settings.max_batch_size_bytes,
        })
    }

    /// Resolve the namespace host so an unreachable target fails here, not on send
    async fn resolve(&self, base: &Url) -> RelayResult<()> {
        let host = base
            .host_str()
            .ok_or_else(|| RelayError::Connection("Endpoint has no namespace host".to_string()))?
            .trim_start_matches('[')
            .trim_end_matches(']')
            .to_string();
        let port = base.port_or_known_default().unwrap_or(443);

        let looked =
            tokio::time::timeout(self.connect_timeout, tokio::net::lookup_host((host.as_str(), port)))
                .await;
        let resolved = match looked {
            Ok(Ok(mut addrs)) => {
                if addrs.next().is_some() {
                    Ok(())
                } else {
                    Err(RelayError::Connection(format!(
                        "namespace host {} resolved to no addresses",
                        host
                    )))
                }
            }
            Ok(Err(e)) => Err(RelayError::Connection(format!(
                "namespace host {} is unreachable: {}",
                host, e
            ))),
            Err(_) => Err(RelayError::Connection(format!(
                "timed out resolving namespace host {}",
                host
            ))),
        };
        resolved
    }
}

#[async_trait]
impl BusClientFactory for ServiceBusFactory {
    async fn connect(
        &self,
        connection_string: &str,
        topic_name: &str,
    ) -> RelayResult<PublisherHandle> {
        let parsed = ConnectionString::parse(connection_string)?;
        let (key_name, key) = parsed.credentials().ok_or_else(|| {
            RelayError::Connection(
                "connection string has no SharedAccessKeyName/SharedAccessKey".to_string(),
            )
        })?;
        let topic = parsed.resolve_topic(topic_name)?;

        let base = http_base(&parsed.endpoint)?;
        self.resolve(&base).await?;

        let mut topic_url = base.clone();
        topic_url
            .path_segments_mut()
            .map_err(|_| RelayError::Connection("Endpoint cannot carry a path".to_string()))?
            .pop_if_empty()
            .push(&topic);
        let mut send_url = topic_url.clone();
        send_url
            .path_segments_mut()
            .map_err(|_| RelayError::Connection("Endpoint cannot carry a path".to_string()))?
            .push("messages");

        tracing::debug!(topic = %topic, endpoint = %base, "Connected Service Bus publisher");

        Ok(PublisherHandle::new(Box::new(ServiceBusPublisher {
            client: self.client.clone(),
            resource: topic_url.to_string(),
            send_url,
            topic,
            key_name: key_name.to_string(),
            key: key.to_string(),
            max_batch_size_bytes: self.max_batch_size_bytes,
            closed: false,
        })))
    }
}

/// Publisher posting batches to `<endpoint>/<topic>/messages`
pub struct ServiceBusPublisher {
    client: Client,
    resource: String,
    send_url: Url,
    topic: String,
    key_name: String,
    key: String,
    max_batch_size_bytes: usize,
    closed: bool,
}

#[async_trait]
impl Publisher for ServiceBusPublisher {
    fn name(&self) -> &str {
        "servicebus"
    }

    fn topic(&self) -> &str {
        &self.topic
    }

    fn max_batch_size_bytes(&self) -> usize {
        self.max_batch_size_bytes
    }

    async fn send_batch(&mut self, batch: &MessageBatch) -> RelayResult<()> {
        if self.closed {
            return Err(RelayError::Transport("publisher is closed".to_string()));
        }

        let expiry = chrono::Utc::now().timestamp() + TOKEN_LIFETIME_SECS;
        let token = shared_access_signature(&self.resource, &self.key_name, &self.key, expiry)?;
        let body = batch.to_wire_json()?;

        let res = self
            .client
            .post(self.send_url.clone())
            .header(reqwest::header::AUTHORIZATION, token)
            .header(reqwest::header::CONTENT_TYPE, BATCH_CONTENT_TYPE)
            .body(body)
            .send()
            .await
            .map_err(|e| RelayError::Transport(format!("Service Bus request failed: {}", e)))?;

        if !res.status().is_success() {
            let status = res.status();
            let err_body = res.text().await.unwrap_or_default();
            return Err(RelayError::Transport(format!(
                "Service Bus API error {}: {}",
                status, err_body
            )));
        }
        Ok(())
    }

    async fn close(&mut self) -> RelayResult<()> {
        // The HTTP client pool is shared with the factory; only this publisher is retired.
        self.closed = true;
        Ok(())
    }
}
