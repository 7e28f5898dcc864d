//! Connector configuration CLI commands

use clap::Subcommand;

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Write a configuration file with default settings
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Show the stored connector configuration
    Show {
        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Replace the stored connector configuration
    Set {
        /// Message bus connection string
        #[arg(long)]
        connection_string: String,

        /// Topic to publish to
        #[arg(short, long)]
        topic: String,
    },
}
