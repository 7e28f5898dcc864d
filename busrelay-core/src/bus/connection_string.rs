//! Connection string parsing
//!
//! Accepts the Service Bus key-value form
//! `Endpoint=sb://<namespace>/;SharedAccessKeyName=<name>;SharedAccessKey=<key>[;EntityPath=<topic>]`
//! or a bare endpoint URL such as `sb://namespace`, `file:///var/spool/relay` or
//! `memory://local`.

use crate::error::{RelayError, RelayResult};
use std::fmt;
use url::Url;

/// Parsed connection target and optional shared access credentials
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionString {
    pub endpoint: Url,
    pub shared_access_key_name: Option<String>,
    pub shared_access_key: Option<String>,
    pub entity_path: Option<String>,
}

impl ConnectionString {
    /// Parse a connection string. Errors never echo the input, which may hold a key.
    pub fn parse(raw: &str) -> RelayResult<Self> {
        let trimmed = raw.trim();

        if trimmed.is_empty() {
            return Err(RelayError::Connection(
                "connection string cannot be empty".to_string(),
            ));
        }

        if trimmed.contains(';') || trimmed.to_ascii_lowercase().starts_with("endpoint=") {
            Self::parse_key_values(trimmed)
        } else {
            let endpoint = Url::parse(trimmed).map_err(|e| {
                RelayError::Connection(format!("malformed connection string: {}", e))
            })?;
            Ok(Self {
                endpoint,
                shared_access_key_name: None,
                shared_access_key: None,
                entity_path: None,
            })
        }
    }

    fn parse_key_values(raw: &str) -> RelayResult<Self> {
        let mut endpoint = None;
        let mut key_name = None;
        let mut key = None;
        let mut entity_path = None;

        for part in raw.split(';').map(str::trim).filter(|p| !p.is_empty()) {
            let (name, value) = part.split_once('=').ok_or_else(|| {
                RelayError::Connection(
                    "malformed connection string: expected Key=Value pairs".to_string(),
                )
            })?;
            let value = value.trim();
            match name.trim().to_ascii_lowercase().as_str() {
                "endpoint" => endpoint = Some(value.to_string()),
                "sharedaccesskeyname" => key_name = Some(value.to_string()),
                "sharedaccesskey" => key = Some(value.to_string()),
                "entitypath" => entity_path = Some(value.to_string()).filter(|v| !v.is_empty()),
                // Other settings (e.g. TransportType) do not affect publishing
                _ => {}
            }
        }

        let endpoint = endpoint.filter(|e| !e.is_empty()).ok_or_else(|| {
            RelayError::Connection("connection string is missing Endpoint".to_string())
        })?;
        let endpoint = Url::parse(&endpoint)
            .map_err(|e| RelayError::Connection(format!("malformed Endpoint: {}", e)))?;

        let key_name = key_name.filter(|v| !v.is_empty());
        let key = key.filter(|v| !v.is_empty());
        if key_name.is_some() != key.is_some() {
            return Err(RelayError::Connection(
                "SharedAccessKeyName and SharedAccessKey must be given together".to_string(),
            ));
        }

        Ok(Self {
            endpoint,
            shared_access_key_name: key_name,
            shared_access_key: key,
            entity_path,
        })
    }

    /// Credentials as (key name, key), if present
    pub fn credentials(&self) -> Option<(&str, &str)> {
        match (&self.shared_access_key_name, &self.shared_access_key) {
            (Some(name), Some(key)) => Some((name.as_str(), key.as_str())),
            _ => None,
        }
    }

    /// Pick the topic to publish to from the requested name and `EntityPath`
    pub fn resolve_topic(&self, requested: &str) -> RelayResult<String> {
        let requested = requested.trim();
        match (requested.is_empty(), self.entity_path.as_deref()) {
            (true, Some(entity)) => Ok(entity.to_string()),
            (true, None) => Err(RelayError::Connection(
                "topic name cannot be empty".to_string(),
            )),
            (false, Some(entity)) if entity != requested => Err(RelayError::Connection(format!(
                "topic '{}' does not match EntityPath '{}' of the connection string",
                requested, entity
            ))),
            (false, _) => Ok(requested.to_string()),
        }
    }
}

impl fmt::Debug for ConnectionString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionString")
            .field("endpoint", &self.endpoint.as_str())
            .field("shared_access_key_name", &self.shared_access_key_name)
            .field(
                "shared_access_key",
                &self.shared_access_key.as_ref().map(|_| "<redacted>"),
            )
            .field("entity_path", &self.entity_path)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL: &str = "Endpoint=sb://relay-ns.servicebus.windows.net/;SharedAccessKeyName=RootManageSharedAccessKey;SharedAccessKey=c2VjcmV0a2V5PQ==";

    #[test]
    fn test_parse_service_bus_form() {
        let parsed = ConnectionString::parse(FULL).unwrap();
        assert_eq!(parsed.endpoint.scheme(), "sb");
        assert_eq!(
            parsed.endpoint.host_str(),
            Some("relay-ns.servicebus.windows.net")
        );
        assert_eq!(
            parsed.credentials(),
            Some(("RootManageSharedAccessKey", "c2VjcmV0a2V5PQ=="))
        );
        assert_eq!(parsed.entity_path, None);
    }

    #[test]
    fn test_keys_are_case_insensitive() {
        let parsed = ConnectionString::parse(
            "endpoint=sb://ns/;sharedaccesskeyname=k;sharedaccesskey=s;entitypath=events;",
        )
        .unwrap();
        assert_eq!(parsed.credentials(), Some(("k", "s")));
        assert_eq!(parsed.entity_path.as_deref(), Some("events"));
    }

    #[test]
    fn test_parse_bare_endpoint() {
        let parsed = ConnectionString::parse("sb://ns").unwrap();
        assert_eq!(parsed.endpoint.host_str(), Some("ns"));
        assert_eq!(parsed.credentials(), None);
    }

    #[test]
    fn test_rejects_empty_and_malformed() {
        assert!(matches!(
            ConnectionString::parse("   "),
            Err(RelayError::Connection(_))
        ));
        assert!(ConnectionString::parse("not a url").is_err());
        assert!(ConnectionString::parse("SharedAccessKeyName=k;SharedAccessKey=s").is_err());
        assert!(ConnectionString::parse("Endpoint=sb://ns/;SharedAccessKeyName=k").is_err());
        assert!(ConnectionString::parse("Endpoint=sb://ns/;garbage").is_err());
    }

    #[test]
    fn test_errors_do_not_leak_keys() {
        let err = ConnectionString::parse("Endpoint=::bad::;SharedAccessKeyName=k;SharedAccessKey=topsecret")
            .unwrap_err();
        assert!(!err.to_string().contains("topsecret"));

        let parsed = ConnectionString::parse(FULL).unwrap();
        assert!(!format!("{:?}", parsed).contains("c2VjcmV0a2V5PQ=="));
    }

    #[test]
    fn test_resolve_topic() {
        let plain = ConnectionString::parse("sb://ns").unwrap();
        assert_eq!(plain.resolve_topic("events").unwrap(), "events");
        assert!(plain.resolve_topic("").is_err());

        let scoped = ConnectionString::parse("Endpoint=sb://ns/;EntityPath=events").unwrap();
        assert_eq!(scoped.resolve_topic("").unwrap(), "events");
        assert_eq!(scoped.resolve_topic("events").unwrap(), "events");
        assert!(scoped.resolve_topic("other").is_err());
    }
}
