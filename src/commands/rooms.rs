use crate::commands::build_client;
use crate::config::Config;
use crate::source::{MessageSource, Room};
use anyhow::{Context, Result};
use colored::Colorize;
use prettytable::{format, Table};

/// Topics longer than this are truncated in the table.
const MAX_TOPIC_WIDTH: usize = 40;

/// List the rooms visible to the configured token
pub fn handle_rooms(config: &Config) -> Result<()> {
    let client = build_client(config).context("Failed to create API client")?;
    let rooms = client.list_rooms().context("Failed to list rooms")?;

    if rooms.is_empty() {
        println!("{}", "No rooms found.".yellow());
        return Ok(());
    }

    println!("\nRooms:");
    rooms_table(&rooms, config.room.as_deref()).printstd();
    println!();
    println!(
        "Use {} to poll one of them.",
        "roomwatch poll --room <NAME>".cyan()
    );
    println!();

    Ok(())
}

/// Build the room table; the configured room is highlighted.
pub fn rooms_table(rooms: &[Room], current: Option<&str>) -> Table {
    let mut table = Table::new();
    table.set_format(*format::consts::FORMAT_BORDERS_ONLY);

    table.add_row(prettytable::row![
        "ID".bold(),
        "Name".bold(),
        "Privacy".bold(),
        "Topic".bold()
    ]);

    for room in rooms {
        let name = if current == Some(room.name.as_str()) {
            room.name.green().bold()
        } else {
            room.name.normal()
        };
        let privacy = room.privacy.clone().unwrap_or_else(|| "-".to_string());
        let topic = room.topic.as_deref().map(truncate).unwrap_or_default();

        table.add_row(prettytable::row![room.id.cyan(), name, privacy, topic]);
    }

    table
}

fn truncate(text: &str) -> String {
    if text.chars().count() > MAX_TOPIC_WIDTH {
        let head: String = text.chars().take(MAX_TOPIC_WIDTH - 3).collect();
        format!("{}...", head)
    } else {
        text.to_string()
    }
}
