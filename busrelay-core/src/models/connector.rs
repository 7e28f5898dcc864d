//! Connector settings and outbound message structures

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Connection settings for the message bus topic
///
/// Both fields empty means unconfigured. An empty connection string with a
/// topic name is tolerated; the next publish surfaces it as a connection error.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectorConfig {
    pub connection_string: String,
    pub topic_name: String,
}

impl ConnectorConfig {
    pub fn new(connection_string: impl Into<String>, topic_name: impl Into<String>) -> Self {
        Self {
            connection_string: connection_string.into(),
            topic_name: topic_name.into(),
        }
    }

    /// True when nothing has been configured yet
    pub fn is_empty(&self) -> bool {
        self.connection_string.is_empty() && self.topic_name.is_empty()
    }

    /// True when exactly one of the two fields is set
    pub fn is_partial(&self) -> bool {
        self.connection_string.is_empty() != self.topic_name.is_empty()
    }
}

// Connection strings embed shared access keys; keep them out of logs.
impl fmt::Debug for ConnectorConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let connection_string = if self.connection_string.is_empty() {
            ""
        } else {
            "<redacted>"
        };
        f.debug_struct("ConnectorConfig")
            .field("connection_string", &connection_string)
            .field("topic_name", &self.topic_name)
            .finish()
    }
}

/// A single message to publish; not persisted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub id: Uuid,
    pub body: String,
}

impl OutboundMessage {
    pub fn new(body: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            body: body.into(),
        }
    }
}
