use crate::cli::WatermarkCommand;
use crate::commands::build_store;
use crate::config::Config;
use crate::storage::MessageStore;
use anyhow::{Context, Result};
use colored::Colorize;

/// Handle watermark commands for the configured room
pub fn handle_watermark(config: &Config, command: WatermarkCommand) -> Result<()> {
    let room = config.room_name()?;
    let mut store = build_store(config, room).context("Failed to open watermark store")?;

    let line = apply(store.as_mut(), &command)
        .with_context(|| format!("Watermark command failed for room {}", room))?;
    println!("{}", line);

    Ok(())
}

/// Apply a watermark command to `store` and describe the outcome.
pub fn apply(store: &mut dyn MessageStore, command: &WatermarkCommand) -> Result<String> {
    let line = match command {
        WatermarkCommand::Show => match store.get_last_id()? {
            Some(id) => format!("Watermark: {}", id.cyan()),
            None => "No watermark stored".yellow().to_string(),
        },
        WatermarkCommand::Set { id } => {
            store.set_last_id(id)?;
            format!("Watermark set to {}", id).green().to_string()
        }
        WatermarkCommand::Clear => {
            store.clear_last_id()?;
            "Watermark cleared".green().to_string()
        }
    };

    Ok(line)
}
