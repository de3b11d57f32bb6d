//! roomwatch - incremental chat room poller
//!
#![doc = "roomwatch - incremental chat room poller"]
#![doc = "Main entry point for the roomwatch CLI."]

use anyhow::{Context, Result};

use roomwatch::cli::{Cli, Commands};
use roomwatch::commands;
use roomwatch::config::Config;
use roomwatch::watcher::logging::{bootstrap_subscriber, init_logging};

fn main() -> Result<()> {
    // Parse command line arguments
    let cli = Cli::parse_args();

    // Load configuration; its warnings go to the bootstrap subscriber
    let config_path = cli.config.as_deref().unwrap_or("config/config.yaml");
    let config = tracing::subscriber::with_default(bootstrap_subscriber(), || {
        Config::load(config_path, &cli)
    })
    .with_context(|| format!("Failed to load configuration from {}", config_path))?;

    init_logging(&config.logging).context("Failed to initialize logging")?;

    // Validate configuration
    config.validate()?;

    // Execute command
    match cli.command {
        Commands::Poll { json, .. } => {
            tracing::info!("Starting single poll");
            commands::poll::run_poll(&config, json)
        }
        Commands::Watch { json, .. } => {
            tracing::info!("Starting watch mode");
            commands::poll::run_watch(&config, json)
        }
        Commands::Rooms => commands::rooms::handle_rooms(&config),
        Commands::Watermark { command, .. } => {
            commands::watermark::handle_watermark(&config, command)
        }
    }
}
