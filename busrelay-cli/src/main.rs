mod cli;
mod mode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use cli::config::ConfigCommands;
use cli::handlers;

#[derive(Parser)]
#[command(name = "busrelay")]
#[command(version)]
#[command(about = "Message-publishing relay for hosted message bus topics")]
struct Cli {
    /// Path to configuration file (default: ~/.config/busrelay/config.toml)
    #[arg(long, global = true)]
    config_file: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the relay HTTP server
    ///
    /// Endpoints:
    ///   POST /api/v1/relay      request envelope (saveConfig, getConfig, sendMessage, raw events)
    ///   GET  /api/v1/config     current connector config
    ///   PUT  /api/v1/config     replace connector config
    ///   POST /api/v1/messages   publish {"message": "..."}
    ///   GET  /api/v1/health     health check
    Serve {
        /// Server bind address (overrides config file)
        #[arg(long)]
        host: Option<String>,

        /// Server port number (overrides config file)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Inspect or change the connector configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },

    /// Publish a message to the configured topic
    ///
    /// Examples:
    ///   busrelay send "hello"
    ///   busrelay send "hello" --server http://127.0.0.1:8080
    Send {
        /// Message body
        message: String,

        /// Relay server URL; publishes locally when omitted and BUSRELAY_SERVER is unset
        #[arg(long)]
        server: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config_file = cli.config_file;

    match cli.command {
        Commands::Serve { host, port } => {
            handlers::handle_serve(config_file, host, port).await?;
        }
        Commands::Config { command } => match command {
            ConfigCommands::Init { force } => {
                handlers::handle_config_init(config_file, force).await?;
            }
            ConfigCommands::Show { json } => {
                handlers::handle_config_show(config_file, json).await?;
            }
            ConfigCommands::Set {
                connection_string,
                topic,
            } => {
                handlers::handle_config_set(config_file, connection_string, topic).await?;
            }
        },
        Commands::Send { message, server } => {
            handlers::handle_send(config_file, message, server).await?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_config_set() {
        let cli = Cli::try_parse_from([
            "busrelay",
            "config",
            "set",
            "--connection-string",
            "sb://ns",
            "--topic",
            "events",
            "--config-file",
            "/tmp/busrelay.toml",
        ])
        .unwrap();
        assert_eq!(cli.config_file.as_deref(), Some("/tmp/busrelay.toml"));
        match cli.command {
            Commands::Config {
                command:
                    ConfigCommands::Set {
                        connection_string,
                        topic,
                    },
            } => {
                assert_eq!(connection_string, "sb://ns");
                assert_eq!(topic, "events");
            }
            _ => panic!("expected config set"),
        }
    }

    #[test]
    fn test_parse_send_with_server() {
        let cli = Cli::try_parse_from(["busrelay", "send", "hi", "--server", "http://h:1"]).unwrap();
        match cli.command {
            Commands::Send { message, server } => {
                assert_eq!(message, "hi");
                assert_eq!(server.as_deref(), Some("http://h:1"));
            }
            _ => panic!("expected send"),
        }
    }

    #[test]
    fn test_serve_overrides_are_optional() {
        let cli = Cli::try_parse_from(["busrelay", "serve"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Serve {
                host: None,
                port: None
            }
        ));
    }
}
