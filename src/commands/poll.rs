//! `poll` and `watch` command handlers.

use std::io::{self, Write};
use std::sync::mpsc::{self, Receiver};
use std::time::Duration;

use anyhow::{Context, Result};
use colored::Colorize;

use crate::commands::{build_client, build_poller};
use crate::config::Config;
use crate::error::RoomWatchError;
use crate::source::{Message, MessageSource};
use crate::storage::MessageStore;
use crate::watcher::{MessageHandler, PollReport, Poller};

/// Prints every processed message.
///
/// In JSON mode each message is one compact JSON line, otherwise a colored
/// header line (date, sender, id) followed by the pretty-printed message.
pub struct PrintHandler<W: Write> {
    out: W,
    json: bool,
}

impl PrintHandler<io::Stdout> {
    /// Print to standard output.
    pub fn stdout(json: bool) -> Self {
        Self::new(io::stdout(), json)
    }
}

impl<W: Write> PrintHandler<W> {
    pub fn new(out: W, json: bool) -> Self {
        Self { out, json }
    }

    fn write_message(&mut self, message: &Message) -> io::Result<()> {
        if self.json {
            let line = serde_json::to_string(message.as_value())?;
            return writeln!(self.out, "{}", line);
        }

        let date = message
            .date()
            .map(|d| d.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| "-".to_string());
        let sender = message.sender().unwrap_or_else(|| "unknown".to_string());
        let id = message.id().unwrap_or_else(|| "-".to_string());

        writeln!(
            self.out,
            "{} {} {}",
            date.dimmed(),
            sender.cyan().bold(),
            format!("#{}", id).yellow()
        )?;
        writeln!(self.out, "{}", serde_json::to_string_pretty(message.as_value())?)?;
        writeln!(self.out)
    }
}

impl<W: Write> MessageHandler for PrintHandler<W> {
    fn process_message(&mut self, message: &Message) -> crate::error::Result<()> {
        self.write_message(message)
            .and_then(|()| self.out.flush())
            .map_err(|e| RoomWatchError::Handler(format!("Failed to print message: {}", e)))
    }
}

/// One-line description of a poll cycle.
pub fn summary_line(report: &PollReport) -> String {
    let watermark = report.watermark.as_deref().unwrap_or("none");
    if report.processed == 0 {
        format!(
            "No new messages ({} fetched, watermark: {})",
            report.fetched, watermark
        )
    } else {
        format!(
            "Processed {} of {} fetched messages (watermark: {})",
            report.processed, report.fetched, watermark
        )
    }
}

fn print_summary(report: &PollReport, json: bool) {
    let line = summary_line(report);
    if json {
        // Keep stdout to one JSON object per line.
        eprintln!("{}", line);
    } else if report.processed == 0 {
        println!("{}", line.yellow());
    } else {
        println!("{}", line.green());
    }
}

/// Run a single poll cycle for the configured room.
///
/// # Arguments
///
/// * `config` - Validated configuration
/// * `json` - Print compact JSON lines instead of pretty output
pub fn run_poll(config: &Config, json: bool) -> Result<()> {
    let client = build_client(config).context("Failed to create API client")?;
    let mut poller = build_poller(config, client)
        .context("Failed to set up poller")?
        .with_handler(PrintHandler::stdout(json));

    let report = poll_cycle(&mut poller)?;
    print_summary(&report, json);
    Ok(())
}

/// Run one cycle of an already configured poller.
pub fn poll_cycle<S, T>(poller: &mut Poller<'_, S, T>) -> Result<PollReport>
where
    S: MessageSource,
    T: MessageStore,
{
    poller
        .poll_once()
        .with_context(|| format!("Poll of room {} failed", poller.room().name))
}

/// Poll the configured room until Ctrl-C.
///
/// # Arguments
///
/// * `config` - Validated configuration
/// * `json` - Print compact JSON lines instead of pretty output
pub fn run_watch(config: &Config, json: bool) -> Result<()> {
    let client = build_client(config).context("Failed to create API client")?;
    let mut poller = build_poller(config, client)
        .context("Failed to set up poller")?
        .with_handler(PrintHandler::stdout(json));

    let shutdown = shutdown_on_ctrl_c()?;
    let interval = Duration::from_secs(config.poll.interval_secs);

    let summary = poller
        .watch(interval, &shutdown)
        .with_context(|| format!("Watch of room {} failed", poller.room().name))?;

    let line = format!(
        "Stopped after {} cycles, {} messages processed",
        summary.cycles, summary.processed
    );
    if json {
        eprintln!("{}", line);
    } else {
        println!("{}", line.green());
    }
    Ok(())
}

/// Spawn a thread that signals the returned channel on Ctrl-C.
///
/// The watch loop is synchronous, so the signal listener gets its own
/// single-threaded runtime.
pub fn shutdown_on_ctrl_c() -> Result<Receiver<()>> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to start signal listener")?;

    let (tx, rx) = mpsc::channel();

    std::thread::Builder::new()
        .name("ctrl-c".to_string())
        .spawn(move || {
            runtime.block_on(async {
                match tokio::signal::ctrl_c().await {
                    Ok(()) => tracing::info!("Received Ctrl-C, stopping after current cycle"),
                    Err(e) => tracing::error!(error = %e, "Failed to listen for Ctrl-C"),
                }
            });
            let _ = tx.send(());
        })
        .context("Failed to spawn signal listener")?;

    Ok(rx)
}
