//! CLI command handlers

use anyhow::{Context, Result};
use busrelay_core::models::{Configuration, ConnectorConfig, StoreBackend};
use busrelay_core::server::RelayServer;
use busrelay_core::services::logging::init_logging;
use busrelay_core::RelayService;
use std::path::PathBuf;
use std::sync::Arc;

use crate::mode::{determine_operation_mode, relay_endpoint, OperationMode};

fn resolve_config_path(config_file: Option<String>) -> Result<PathBuf> {
    match config_file {
        Some(path) => Ok(PathBuf::from(path)),
        None => Configuration::default_config_path()
            .map_err(|e| anyhow::anyhow!("Failed to determine config path: {}", e)),
    }
}

fn load_config(config_file: Option<String>) -> Result<(Configuration, PathBuf)> {
    let path = resolve_config_path(config_file)?;
    let config = Configuration::load_from_file(&path)
        .map_err(|e| anyhow::anyhow!("Failed to load config from {}: {}", path.display(), e))?;
    Ok((config, path))
}

fn build_service(config: &Configuration) -> Result<Arc<RelayService>> {
    Ok(RelayServer::from_config(config)?.service())
}

/// Handle the 'serve' command
pub async fn handle_serve(
    config_file: Option<String>,
    host: Option<String>,
    port: Option<u16>,
) -> Result<()> {
    let (mut config, path) = load_config(config_file)?;
    if let Some(host) = host {
        config.server_host = host;
    }
    if let Some(port) = port {
        config.server_port = port;
    }

    init_logging(config.log_level)
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;
    tracing::debug!(config = %path.display(), "Loaded configuration");

    if config.store.backend == StoreBackend::Memory {
        tracing::warn!("Memory store selected; connector config is lost on restart");
    }

    println!(
        "🚀 Starting busrelay server on {}:{}",
        config.server_host, config.server_port
    );
    println!("📮 Relay endpoint: /api/v1/relay");
    println!("🛑 Press Ctrl+C to stop");

    RelayServer::from_config(&config)?.start().await
}

/// Handle 'config init'
pub async fn handle_config_init(config_file: Option<String>, force: bool) -> Result<()> {
    let path = resolve_config_path(config_file)?;
    if path.exists() && !force {
        anyhow::bail!(
            "Config file already exists at {} (use --force to overwrite)",
            path.display()
        );
    }

    Configuration::default()
        .save_to_file(&path)
        .map_err(|e| anyhow::anyhow!("Failed to write config to {}: {}", path.display(), e))?;

    println!("✅ Wrote default configuration to {}", path.display());
    Ok(())
}

/// Handle 'config show'
pub async fn handle_config_show(config_file: Option<String>, json: bool) -> Result<()> {
    let (config, path) = load_config(config_file)?;
    let connector = build_service(&config)?
        .get_config()
        .await
        .context("Failed to read connector config")?;

    if json {
        let output = serde_json::json!({
            "configFile": path.display().to_string(),
            "storePath": config.store.path.display().to_string(),
            "connectorConfig": {
                "connectionString": redact(&connector.connection_string),
                "topicName": connector.topic_name,
            },
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!("📄 Config file: {}", path.display());
    println!("💾 Store: {}", config.store.path.display());
    if connector.is_empty() {
        println!("⚠️  No connector configuration saved");
    } else {
        println!(
            "🔌 Connection string: {}",
            redact(&connector.connection_string)
        );
        println!("🏷️  Topic: {}", connector.topic_name);
    }
    Ok(())
}

/// Handle 'config set'
pub async fn handle_config_set(
    config_file: Option<String>,
    connection_string: String,
    topic: String,
) -> Result<()> {
    let (config, _) = load_config(config_file)?;
    if config.store.backend == StoreBackend::Memory {
        anyhow::bail!("Store backend is 'memory'; settings would not outlive this command");
    }

    let connector = ConnectorConfig::new(connection_string, topic);
    build_service(&config)?
        .save_config(&connector)
        .await
        .context("Failed to save connector config")?;

    println!("✅ Connector config saved (topic: {})", connector.topic_name);
    Ok(())
}

/// Handle the 'send' command
pub async fn handle_send(
    config_file: Option<String>,
    message: String,
    server: Option<String>,
) -> Result<()> {
    let mode = determine_operation_mode(server)
        .map_err(|e| anyhow::anyhow!("Failed to determine operation mode: {}", e))?;
    tracing::debug!(source = ?mode.source(), "Selected operation mode");

    match mode {
        OperationMode::Server { url, .. } => send_via_server(&url, message).await,
        OperationMode::Direct => {
            let (config, _) = load_config(config_file)?;
            init_logging(config.log_level)
                .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;
            build_service(&config)?
                .publish(&message)
                .await
                .context("Failed to publish message")?;
            println!("📤 Message sent");
            Ok(())
        }
    }
}

async fn send_via_server(base: &url::Url, message: String) -> Result<()> {
    let endpoint = relay_endpoint(base)?;
    let envelope = serde_json::json!({
        "operation": "sendMessage",
        "message": message,
    });

    let response = reqwest::Client::new()
        .post(endpoint.clone())
        .json(&envelope)
        .send()
        .await
        .with_context(|| format!("Failed to reach relay server at {}", endpoint))?;

    let status = response.status();
    if status.is_success() {
        println!("📤 Message sent via {}", base);
        return Ok(());
    }

    let body: serde_json::Value = response.json().await.unwrap_or_default();
    let error = body
        .get("error")
        .and_then(|v| v.as_str())
        .unwrap_or("unknown error");
    let kind = body
        .get("kind")
        .and_then(|v| v.as_str())
        .unwrap_or("unknown");
    anyhow::bail!("Relay server returned {} ({}): {}", status, kind, error)
}

/// Keep the namespace visible, hide credentials
fn redact(connection_string: &str) -> String {
    if connection_string.is_empty() {
        return String::new();
    }
    connection_string
        .split(';')
        .filter(|part| !part.trim().is_empty())
        .map(|part| match part.split_once('=') {
            Some((key, _)) if key.trim().eq_ignore_ascii_case("SharedAccessKey") => {
                format!("{}=***", key)
            }
            _ => part.to_string(),
        })
        .collect::<Vec<_>>()
        .join(";")
}
