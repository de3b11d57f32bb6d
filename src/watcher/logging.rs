//! Structured logging setup
//!
//! Provides JSON-formatted and human-readable logging with optional file output.
//! Log lines go to STDERR so STDOUT stays reserved for message output.

use crate::config::LoggingConfig;
use anyhow::Result;
use std::fs::OpenOptions;
use std::sync::Arc;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Level used until the configured subscriber is installed.
pub const BOOTSTRAP_LEVEL: &str = "warn";

/// Stderr subscriber for the window before [`init_logging`] runs.
///
/// Loading the configuration can itself log warnings (missing file, bad
/// environment values), so the binary runs it under this subscriber with
/// `tracing::subscriber::with_default`. `RUST_LOG` takes precedence over
/// [`BOOTSTRAP_LEVEL`].
pub fn bootstrap_subscriber() -> impl tracing::Subscriber + Send + Sync {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(BOOTSTRAP_LEVEL));

    tracing_subscriber::registry().with(env_filter).with(
        fmt::layer()
            .with_target(true)
            .with_level(true)
            .with_writer(std::io::stderr),
    )
}

/// Initialize logging based on configuration.
///
/// `RUST_LOG` takes precedence over the configured level.
///
/// # Arguments
///
/// * `config` - Logging configuration
///
/// # Examples
///
/// ```no_run
/// use roomwatch::config::LoggingConfig;
/// use roomwatch::watcher::logging::init_logging;
///
/// let config = LoggingConfig {
///     level: "debug".to_string(),
///     json_format: true,
///     file_path: None,
/// };
///
/// init_logging(&config).unwrap();
/// ```
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&config.level))?;

    let registry = tracing_subscriber::registry().with(env_filter);

    if config.json_format {
        let stderr_layer = fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_writer(std::io::stderr);

        if let Some(file_path) = &config.file_path {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(file_path)?;

            let file_layer = fmt::layer()
                .json()
                .with_current_span(true)
                .with_span_list(true)
                .with_writer(Arc::new(file));

            registry.with(stderr_layer).with(file_layer).try_init()?;
        } else {
            registry.with(stderr_layer).try_init()?;
        }
    } else {
        let stderr_layer = fmt::layer()
            .with_target(true)
            .with_level(true)
            .with_writer(std::io::stderr);

        if let Some(file_path) = &config.file_path {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(file_path)?;

            let file_layer = fmt::layer()
                .with_target(true)
                .with_level(true)
                .with_ansi(false)
                .with_writer(Arc::new(file));

            registry.with(stderr_layer).with(file_layer).try_init()?;
        } else {
            registry.with(stderr_layer).try_init()?;
        }
    }

    Ok(())
}

/// Create a `message` span carrying a message's identifying fields.
///
/// # Examples
///
/// ```
/// use roomwatch::message_span;
/// use roomwatch::source::Message;
/// use serde_json::json;
///
/// let message = Message::new(json!({"id": "42", "from": "JIRA"}));
/// let span = message_span!(message);
/// let _guard = span.enter();
/// tracing::debug!("inside the message span");
/// ```
#[macro_export]
macro_rules! message_span {
    ($message:expr) => {
        tracing::debug_span!(
            "message",
            message_id = $message.id().as_deref().unwrap_or("-"),
            sender = $message.sender().as_deref().unwrap_or("-"),
        )
    };
}
