//! Command-line interface definition for roomwatch
//!
//! This module defines the CLI structure using clap's derive API,
//! providing commands for polling a room, watching it, listing rooms,
//! and inspecting the stored watermark.

use clap::{Parser, Subcommand};

/// roomwatch - incremental chat room poller
///
/// Fetches new messages from a chat room, filters them, prints the ones
/// that pass, and remembers where it left off.
#[derive(Parser, Debug, Clone)]
#[command(name = "roomwatch")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/config.yaml")]
    pub config: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands for roomwatch
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Run a single fetch-filter-process cycle
    Poll {
        /// Room name (overrides config)
        #[arg(short, long)]
        room: Option<String>,

        /// Maximum messages to fetch (overrides config)
        #[arg(short, long)]
        max_results: Option<usize>,

        /// Print one compact JSON object per message
        #[arg(long)]
        json: bool,
    },

    /// Poll repeatedly until interrupted
    Watch {
        /// Room name (overrides config)
        #[arg(short, long)]
        room: Option<String>,

        /// Seconds between cycles (overrides config)
        #[arg(short, long)]
        interval: Option<u64>,

        /// Print one compact JSON object per message
        #[arg(long)]
        json: bool,
    },

    /// List the rooms visible to the configured token
    Rooms,

    /// Inspect or edit the stored watermark
    Watermark {
        /// Room name (overrides config)
        #[arg(short, long, global = true)]
        room: Option<String>,

        /// Watermark subcommand
        #[command(subcommand)]
        command: WatermarkCommand,
    },
}

/// Watermark subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum WatermarkCommand {
    /// Show the stored watermark
    Show,

    /// Overwrite the stored watermark
    Set {
        /// Message id to store
        id: String,
    },

    /// Remove the watermark so the next poll starts from the beginning
    Clear,
}

impl Commands {
    /// Room override carried by the command, if any.
    pub fn room(&self) -> Option<&str> {
        match self {
            Commands::Poll { room, .. }
            | Commands::Watch { room, .. }
            | Commands::Watermark { room, .. } => room.as_deref(),
            Commands::Rooms => None,
        }
    }

    /// Page size override carried by the command, if any.
    pub fn max_results(&self) -> Option<usize> {
        match self {
            Commands::Poll { max_results, .. } => *max_results,
            _ => None,
        }
    }

    /// Interval override carried by the command, if any.
    pub fn interval(&self) -> Option<u64> {
        match self {
            Commands::Watch { interval, .. } => *interval,
            _ => None,
        }
    }
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
