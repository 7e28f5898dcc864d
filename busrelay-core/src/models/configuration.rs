//! Configuration data structures

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Logging level configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum LogLevel {
    #[serde(rename = "error")]
    Error,
    #[serde(rename = "warn")]
    Warn,
    #[serde(rename = "info")]
    #[default]
    Info,
    #[serde(rename = "debug")]
    Debug,
    #[serde(rename = "trace")]
    Trace,
}

/// Backend holding the connector configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    File,
    Memory,
}

/// Message bus transport used for publishing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    #[default]
    ServiceBus,
    File,
    Memory,
}

/// Connector configuration storage settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    pub backend: StoreBackend,
    /// State file location (file backend only)
    pub path: PathBuf,
}

impl Default for StoreSettings {
    fn default() -> Self {
        let path = dirs::data_dir()
            .map(|dir| dir.join("busrelay").join("state.json"))
            .unwrap_or_else(|| PathBuf::from("busrelay-state.json"));
        Self {
            backend: StoreBackend::File,
            path,
        }
    }
}

/// Transport settings; the bounded waits for connect and send live here
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportSettings {
    pub kind: TransportKind,
    /// Upper bound for a serialized batch in bytes
    pub max_batch_size_bytes: usize,
    pub connect_timeout_secs: u64,
    pub send_timeout_secs: u64,
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            kind: TransportKind::ServiceBus,
            max_batch_size_bytes: 262_144, // 256KB
            connect_timeout_secs: 10,
            send_timeout_secs: 30,
        }
    }
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Configuration {
    /// Logging verbosity level
    pub log_level: LogLevel,
    /// Server bind address
    pub server_host: String,
    /// Server port number
    pub server_port: u16,
    /// Maximum accepted HTTP request body in bytes
    pub max_request_size: u64,
    pub store: StoreSettings,
    pub transport: TransportSettings,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Info,
            server_host: "127.0.0.1".to_string(),
            server_port: 8080,
            max_request_size: 1_048_576, // 1MB
            store: StoreSettings::default(),
            transport: TransportSettings::default(),
        }
    }
}

impl Configuration {
    /// Load configuration from file
    pub fn load_from_file(path: &PathBuf) -> Result<Self, Box<dyn std::error::Error>> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Configuration = toml::from_str(&content)?;
            Ok(config)
        } else {
            // Return default configuration if file doesn't exist
            Ok(Configuration::default())
        }
    }

    /// Save configuration to file
    pub fn save_to_file(&self, path: &PathBuf) -> Result<(), Box<dyn std::error::Error>> {
        let content = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the XDG config directory path
    pub fn default_config_path() -> Result<PathBuf, Box<dyn std::error::Error>> {
        let config_dir = dirs::config_dir().ok_or("Could not determine config directory")?;
        Ok(config_dir.join("busrelay").join("config.toml"))
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.server_host.trim().is_empty() {
            errors.push("server_host cannot be empty".to_string());
        }

        // Validate port (u16 is already 0-65535, so only check minimum)
        if self.server_port < 1024 {
            errors.push(
                "server_port must be at least 1024 (privileged ports not allowed)".to_string(),
            );
        }

        if self.max_request_size == 0 || self.max_request_size > 16_777_216 {
            errors.push("max_request_size must be between 1 and 16777216 bytes (16MB)".to_string());
        }

        let batch_limit = self.transport.max_batch_size_bytes;
        if batch_limit == 0 || batch_limit > 1_048_576 {
            errors.push(
                "transport.max_batch_size_bytes must be between 1 and 1048576 bytes (1MB)"
                    .to_string(),
            );
        }

        if self.transport.connect_timeout_secs == 0 {
            errors.push("transport.connect_timeout_secs must be greater than 0".to_string());
        }

        if self.transport.send_timeout_secs == 0 {
            errors.push("transport.send_timeout_secs must be greater than 0".to_string());
        }

        if self.store.backend == StoreBackend::File && self.store.path.as_os_str().is_empty() {
            errors.push("store.path is required for the file backend".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_configuration() {
        let config = Configuration::default();
        assert_eq!(config.server_port, 8080);
        assert_eq!(config.transport.kind, TransportKind::ServiceBus);
        assert_eq!(config.transport.max_batch_size_bytes, 262_144);
        assert_eq!(config.store.backend, StoreBackend::File);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_configuration_validation() {
        let mut config = Configuration {
            server_port: 80,          // Invalid: privileged port
            max_request_size: 0,      // Invalid: zero
            ..Configuration::default()
        };
        config.transport.max_batch_size_bytes = 2_000_000;
        config.transport.send_timeout_secs = 0;

        let errors = config.validate().unwrap_err();
        assert_eq!(errors.len(), 4);
        assert!(errors.iter().any(|e| e.contains("server_port")));
        assert!(errors.iter().any(|e| e.contains("max_request_size")));
        assert!(errors.iter().any(|e| e.contains("max_batch_size_bytes")));
        assert!(errors.iter().any(|e| e.contains("send_timeout_secs")));
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: Configuration = toml::from_str(
            r#"
            server_port = 9090

            [transport]
            kind = "memory"
            "#,
        )
        .unwrap();
        assert_eq!(config.server_port, 9090);
        assert_eq!(config.transport.kind, TransportKind::Memory);
        assert_eq!(config.transport.connect_timeout_secs, 10);
        assert_eq!(config.server_host, "127.0.0.1");
    }

    #[test]
    fn test_config_file_operations() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("test_config.toml");

        let mut config = Configuration {
            server_port: 9000,
            log_level: LogLevel::Debug,
            ..Configuration::default()
        };
        config.store.path = temp_dir.path().join("state.json");

        // Save configuration
        config.save_to_file(&config_path).unwrap();
        assert!(config_path.exists());

        // Load configuration
        let loaded_config = Configuration::load_from_file(&config_path).unwrap();
        assert_eq!(loaded_config.server_port, 9000);
        assert_eq!(loaded_config.log_level, LogLevel::Debug);
        assert_eq!(loaded_config.store.path, temp_dir.path().join("state.json"));
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let temp_dir = tempdir().unwrap();
        let config =
            Configuration::load_from_file(&temp_dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.server_port, 8080);
    }
}
