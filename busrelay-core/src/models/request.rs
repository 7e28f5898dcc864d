//! Request and response envelopes for relay operations

use super::ConnectorConfig;
use crate::error::{RelayError, RelayResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Operations accepted by the relay
#[derive(Debug, Clone, PartialEq)]
pub enum RelayRequest {
    SaveConfig(ConnectorConfig),
    GetConfig,
    SendMessage(String),
    /// Payload without an `operation` field, forwarded verbatim as the message body
    Forward(Value),
}

impl RelayRequest {
    /// Interpret a JSON request payload
    pub fn from_value(payload: Value) -> RelayResult<Self> {
        let operation = match payload.get("operation") {
            None => return Ok(RelayRequest::Forward(payload)),
            Some(Value::String(op)) => op.clone(),
            Some(other) => {
                return Err(RelayError::InvalidRequest(format!(
                    "operation must be a string, got {}",
                    other
                )))
            }
        };

        match operation.as_str() {
            "saveConfig" => {
                let config = payload.get("connectorConfig").ok_or_else(|| {
                    RelayError::InvalidRequest("saveConfig requires connectorConfig".to_string())
                })?;
                Ok(RelayRequest::SaveConfig(ConnectorConfig {
                    connection_string: required_string(config, "connectionString")?,
                    topic_name: required_string(config, "topicName")?,
                }))
            }
            "getConfig" => Ok(RelayRequest::GetConfig),
            "sendMessage" => match payload.get("message") {
                Some(Value::String(text)) => Ok(RelayRequest::SendMessage(text.clone())),
                Some(Value::Null) | None => Err(RelayError::InvalidRequest(
                    "sendMessage requires message".to_string(),
                )),
                Some(other) => Ok(RelayRequest::SendMessage(other.to_string())),
            },
            other => Err(RelayError::InvalidRequest(format!(
                "unknown operation: {}",
                other
            ))),
        }
    }

    /// Operation name used in logs
    pub fn operation(&self) -> &'static str {
        match self {
            RelayRequest::SaveConfig(_) => "saveConfig",
            RelayRequest::GetConfig => "getConfig",
            RelayRequest::SendMessage(_) => "sendMessage",
            RelayRequest::Forward(_) => "forward",
        }
    }
}

fn required_string(config: &Value, field: &str) -> RelayResult<String> {
    match config.get(field) {
        Some(Value::String(value)) => Ok(value.clone()),
        Some(_) => Err(RelayError::InvalidRequest(format!(
            "connectorConfig.{} must be a string",
            field
        ))),
        None => Err(RelayError::InvalidRequest(format!(
            "connectorConfig.{} is required",
            field
        ))),
    }
}

/// Response envelope returned for every request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayResponse {
    pub status_code: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
}

impl RelayResponse {
    /// 204 acknowledgement without a body
    pub fn no_content() -> Self {
        Self {
            status_code: 204,
            body: None,
        }
    }

    /// 200 acknowledgement without a body
    pub fn ok() -> Self {
        Self {
            status_code: 200,
            body: None,
        }
    }

    /// 200 carrying the connector config as a JSON string
    pub fn connector_config(config: &ConnectorConfig) -> RelayResult<Self> {
        let encoded = serde_json::to_string(config)
            .map_err(|e| RelayError::Persistence(format!("Failed to encode config: {}", e)))?;
        Ok(Self {
            status_code: 200,
            body: Some(serde_json::json!({ "connectorConfig": encoded })),
        })
    }

    pub fn error(err: &RelayError) -> Self {
        Self {
            status_code: err.status_code(),
            body: Some(serde_json::json!({
                "error": err.to_string(),
                "kind": err.kind(),
            })),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }
}
