//! Operation mode detection
//!
//! `send` either publishes in-process (direct mode) or posts the request
//! envelope to a running relay server. `BUSRELAY_SERVER` takes precedence
//! over the `--server` flag.

use std::env;
use thiserror::Error;
use url::Url;

pub const SERVER_ENV_VAR: &str = "BUSRELAY_SERVER";

#[derive(Debug, Error)]
pub enum ModeDetectionError {
    #[error("Invalid server URL format: {0}")]
    InvalidServerUrl(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrecedenceSource {
    EnvVar,
    ServerFlag,
    Default,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationMode {
    Direct,
    Server { url: Url, source: PrecedenceSource },
}

impl OperationMode {
    pub fn source(&self) -> PrecedenceSource {
        match self {
            OperationMode::Direct => PrecedenceSource::Default,
            OperationMode::Server { source, .. } => *source,
        }
    }
}

pub fn determine_operation_mode(
    server_flag: Option<String>,
) -> Result<OperationMode, ModeDetectionError> {
    determine_operation_mode_with_env(server_flag, env::var(SERVER_ENV_VAR).ok())
}

/// Same as `determine_operation_mode` with the environment value passed in
pub fn determine_operation_mode_with_env(
    server_flag: Option<String>,
    env_server: Option<String>,
) -> Result<OperationMode, ModeDetectionError> {
    let env_server = env_server.filter(|s| !s.trim().is_empty());

    if let Some(env_url) = env_server {
        Ok(OperationMode::Server {
            url: parse_server_url(&env_url)?,
            source: PrecedenceSource::EnvVar,
        })
    } else if let Some(flag_url) = server_flag {
        Ok(OperationMode::Server {
            url: parse_server_url(&flag_url)?,
            source: PrecedenceSource::ServerFlag,
        })
    } else {
        Ok(OperationMode::Direct)
    }
}

/// Accepts http(s) URLs; a bare `host:port` is treated as http
fn parse_server_url(raw: &str) -> Result<Url, ModeDetectionError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ModeDetectionError::InvalidServerUrl(
            "URL cannot be empty".to_string(),
        ));
    }

    let candidate = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("http://{}", trimmed)
    };

    let url = Url::parse(&candidate)
        .map_err(|e| ModeDetectionError::InvalidServerUrl(format!("{}: {}", trimmed, e)))?;

    match url.scheme() {
        "http" | "https" if url.host_str().is_some() => Ok(url),
        "http" | "https" => Err(ModeDetectionError::InvalidServerUrl(format!(
            "{}: missing host",
            trimmed
        ))),
        other => Err(ModeDetectionError::InvalidServerUrl(format!(
            "unsupported scheme '{}'",
            other
        ))),
    }
}

/// Endpoint accepting request envelopes on a relay server
pub fn relay_endpoint(base: &Url) -> Result<Url, ModeDetectionError> {
    base.join("/api/v1/relay")
        .map_err(|e| ModeDetectionError::InvalidServerUrl(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direct_mode_without_flag_or_env() {
        let mode = determine_operation_mode_with_env(None, None).unwrap();
        assert_eq!(mode, OperationMode::Direct);
        assert_eq!(mode.source(), PrecedenceSource::Default);
    }

    #[test]
    fn test_flag_selects_server_mode() {
        let mode =
            determine_operation_mode_with_env(Some("http://127.0.0.1:8080".into()), None).unwrap();
        assert!(matches!(mode, OperationMode::Server { .. }));
        assert_eq!(mode.source(), PrecedenceSource::ServerFlag);
    }

    #[test]
    fn test_env_takes_precedence_over_flag() {
        let mode = determine_operation_mode_with_env(
            Some("http://flag:1".into()),
            Some("http://env:2".into()),
        )
        .unwrap();
        match mode {
            OperationMode::Server { url, source } => {
                assert_eq!(url.host_str(), Some("env"));
                assert_eq!(source, PrecedenceSource::EnvVar);
            }
            OperationMode::Direct => panic!("expected server mode"),
        }
    }

    #[test]
    fn test_blank_env_is_ignored() {
        let mode = determine_operation_mode_with_env(None, Some("  ".into())).unwrap();
        assert_eq!(mode, OperationMode::Direct);
    }

    #[test]
    fn test_bare_host_port_defaults_to_http() {
        let mode = determine_operation_mode_with_env(Some("localhost:9000".into()), None).unwrap();
        match mode {
            OperationMode::Server { url, .. } => {
                assert_eq!(url.scheme(), "http");
                assert_eq!(url.port(), Some(9000));
            }
            OperationMode::Direct => panic!("expected server mode"),
        }
    }

    #[test]
    fn test_rejects_non_http_scheme() {
        assert!(determine_operation_mode_with_env(Some("ws://host:1".into()), None).is_err());
        assert!(determine_operation_mode_with_env(Some("".into()), None).is_err());
    }

    #[test]
    fn test_relay_endpoint() {
        let base = Url::parse("http://127.0.0.1:8080/ignored").unwrap();
        assert_eq!(
            relay_endpoint(&base).unwrap().as_str(),
            "http://127.0.0.1:8080/api/v1/relay"
        );
    }
}
