//! Configuration management for roomwatch
//!
//! This module handles loading, parsing, validating, and managing
//! configuration from files, environment variables, and CLI overrides.

use crate::error::{Result, RoomWatchError};
use crate::source::client::DEFAULT_BASE_URL;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Upper bound accepted upstream for a single history page.
pub const MAX_PAGE_SIZE: usize = 1000;

/// Main configuration structure for roomwatch
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Name of the room to poll
    #[serde(default)]
    pub room: Option<String>,

    /// Chat API connection settings
    #[serde(default)]
    pub source: SourceConfig,

    /// Poll cycle settings
    #[serde(default)]
    pub poll: PollConfig,

    /// Watermark storage settings
    #[serde(default)]
    pub storage: StorageConfig,

    /// Message filters; a message must pass all of them
    #[serde(default)]
    pub filters: Vec<FilterConfig>,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Chat API connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Base URL of the chat API
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// API token (prefer env var ROOMWATCH_TOKEN)
    #[serde(default)]
    pub token: Option<String>,

    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// Poll cycle settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollConfig {
    /// Maximum messages fetched per cycle
    #[serde(default = "default_max_results")]
    pub max_results: usize,

    /// Delay between cycles in watch mode
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
}

/// Watermark storage backend
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    /// One-line text file
    #[default]
    File,
    /// SQLite database, one row per room
    Sqlite,
    /// Process memory only (nothing persists across runs)
    Memory,
}

impl std::str::FromStr for StorageBackend {
    type Err = RoomWatchError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "file" => Ok(Self::File),
            "sqlite" => Ok(Self::Sqlite),
            "memory" => Ok(Self::Memory),
            other => Err(RoomWatchError::Config(format!(
                "Invalid storage backend: {}. Must be one of: file, sqlite, memory",
                other
            ))),
        }
    }
}

/// Watermark storage settings
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StorageConfig {
    /// Backend type
    #[serde(default)]
    pub backend: StorageBackend,

    /// File or database path (backend default when unset)
    #[serde(default)]
    pub path: Option<PathBuf>,
}

/// Message filter configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct FilterConfig {
    /// Keys that must all appear somewhere in the message
    #[serde(default)]
    pub mandatory_fields: Option<Vec<String>>,

    /// Keys that must not appear anywhere in the message
    #[serde(default)]
    pub without_fields: Option<Vec<String>>,

    /// Regex the message text must match
    #[serde(default)]
    pub message_pattern: Option<String>,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Enable JSON-formatted logs
    #[serde(default)]
    pub json_format: bool,

    /// Log file path (if None, STDERR only)
    #[serde(default)]
    pub file_path: Option<PathBuf>,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_max_results() -> usize {
    500
}

fn default_interval_secs() -> u64 {
    60
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            token: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            max_results: default_max_results(),
            interval_secs: default_interval_secs(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json_format: false,
            file_path: None,
        }
    }
}

impl Config {
    /// Load configuration from file with environment and CLI overrides
    ///
    /// A missing file is not an error: defaults are used instead.
    ///
    /// # Arguments
    ///
    /// * `path` - Path to configuration file
    /// * `cli` - CLI arguments for overrides
    ///
    /// # Errors
    ///
    /// Returns error if the file exists but cannot be read or parsed
    pub fn load(path: &str, cli: &crate::cli::Cli) -> Result<Self> {
        let mut config = if Path::new(path).exists() {
            Self::from_file(path)?
        } else {
            tracing::warn!("Config file not found at {}, using defaults", path);
            Self::default()
        };

        config.apply_env_vars();
        config.apply_cli_overrides(cli);

        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| RoomWatchError::Config(format!("Failed to read config file: {}", e)))?;
        serde_yaml::from_str(&contents)
            .map_err(|e| RoomWatchError::Config(format!("Failed to parse config: {}", e)))
    }

    fn apply_env_vars(&mut self) {
        if let Ok(room) = std::env::var("ROOMWATCH_ROOM") {
            tracing::debug!(room = %room, "Env override: ROOMWATCH_ROOM");
            self.room = Some(room);
        }

        if let Ok(base_url) = std::env::var("ROOMWATCH_BASE_URL") {
            tracing::debug!(base_url = %base_url, "Env override: ROOMWATCH_BASE_URL");
            self.source.base_url = base_url;
        }

        if let Ok(token) = std::env::var("ROOMWATCH_TOKEN") {
            self.source.token = Some(token);
        }

        if let Ok(max_results) = std::env::var("ROOMWATCH_MAX_RESULTS") {
            match max_results.parse::<usize>() {
                Ok(v) => {
                    self.poll.max_results = v;
                    tracing::debug!(max_results = v, "Env override: ROOMWATCH_MAX_RESULTS");
                }
                Err(_) => {
                    tracing::warn!("Invalid value for ROOMWATCH_MAX_RESULTS: {}", max_results);
                }
            }
        }

        if let Ok(interval) = std::env::var("ROOMWATCH_INTERVAL_SECS") {
            match interval.parse::<u64>() {
                Ok(v) => {
                    self.poll.interval_secs = v;
                    tracing::debug!(interval_secs = v, "Env override: ROOMWATCH_INTERVAL_SECS");
                }
                Err(_) => {
                    tracing::warn!("Invalid value for ROOMWATCH_INTERVAL_SECS: {}", interval);
                }
            }
        }

        if let Ok(backend) = std::env::var("ROOMWATCH_STORAGE_BACKEND") {
            match backend.parse::<StorageBackend>() {
                Ok(v) => {
                    self.storage.backend = v;
                    tracing::debug!(backend = ?v, "Env override: ROOMWATCH_STORAGE_BACKEND");
                }
                Err(e) => tracing::warn!("{}", e),
            }
        }

        if let Ok(path) = std::env::var("ROOMWATCH_STORAGE_PATH") {
            tracing::debug!(path = %path, "Env override: ROOMWATCH_STORAGE_PATH");
            self.storage.path = Some(PathBuf::from(path));
        }

        if let Ok(level) = std::env::var("ROOMWATCH_LOG_LEVEL") {
            tracing::debug!(level = %level, "Env override: ROOMWATCH_LOG_LEVEL");
            self.logging.level = level;
        }

        if let Ok(json_logs) = std::env::var("ROOMWATCH_JSON_LOGS") {
            match json_logs.parse::<bool>() {
                Ok(v) => {
                    self.logging.json_format = v;
                    tracing::debug!(json_logs = v, "Env override: ROOMWATCH_JSON_LOGS");
                }
                Err(_) => {
                    tracing::warn!("Invalid value for ROOMWATCH_JSON_LOGS: {}", json_logs);
                }
            }
        }
    }

    fn apply_cli_overrides(&mut self, cli: &crate::cli::Cli) {
        if cli.verbose {
            self.logging.level = "debug".to_string();
        }

        if let Some(room) = cli.command.room() {
            self.room = Some(room.to_string());
        }

        if let Some(max_results) = cli.command.max_results() {
            self.poll.max_results = max_results;
        }

        if let Some(interval) = cli.command.interval() {
            self.poll.interval_secs = interval;
        }
    }

    /// The configured room name.
    ///
    /// # Errors
    ///
    /// Returns `RoomWatchError::Config` if no room was configured.
    pub fn room_name(&self) -> Result<&str> {
        self.room.as_deref().filter(|r| !r.is_empty()).ok_or_else(|| {
            RoomWatchError::Config(
                "No room configured (set `room`, ROOMWATCH_ROOM or --room)".to_string(),
            )
        })
    }

    /// Validate the configuration
    ///
    /// Ensures all configuration values are within acceptable ranges
    /// and that every filter pattern compiles.
    ///
    /// # Errors
    ///
    /// Returns error if any validation check fails
    pub fn validate(&self) -> Result<()> {
        url::Url::parse(&self.source.base_url).map_err(|e| {
            RoomWatchError::Config(format!(
                "Invalid source.base_url {}: {}",
                self.source.base_url, e
            ))
        })?;

        if self.source.timeout_secs == 0 {
            return Err(RoomWatchError::Config(
                "source.timeout_secs must be greater than 0".to_string(),
            ));
        }

        if self.poll.max_results == 0 || self.poll.max_results > MAX_PAGE_SIZE {
            return Err(RoomWatchError::Config(format!(
                "poll.max_results must be between 1 and {}",
                MAX_PAGE_SIZE
            )));
        }

        if self.poll.interval_secs == 0 {
            return Err(RoomWatchError::Config(
                "poll.interval_secs must be greater than 0".to_string(),
            ));
        }

        if self.logging.level.trim().is_empty() {
            return Err(RoomWatchError::Config(
                "logging.level cannot be empty".to_string(),
            ));
        }

        for (index, filter) in self.filters.iter().enumerate() {
            if let Some(pattern) = &filter.message_pattern {
                regex::Regex::new(pattern).map_err(|e| {
                    RoomWatchError::Config(format!(
                        "filters[{}].message_pattern is not a valid regex: {}",
                        index, e
                    ))
                })?;
            }
        }

        Ok(())
    }
}
