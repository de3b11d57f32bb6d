//! Error types for roomwatch
//!
//! This module defines the error type shared by the library components,
//! using `thiserror` for ergonomic error handling. Every variant maps onto
//! one kind (configuration, storage, fetch or handler) so callers can tell
//! "nothing new" (an `Ok` poll report) apart from "something broke".

use thiserror::Error;

/// Main error type for roomwatch operations
///
/// Covers room resolution and configuration problems, watermark storage
/// failures, and upstream message source failures.
#[derive(Error, Debug)]
pub enum RoomWatchError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// No room with the requested name exists upstream
    #[error("No room with name {0}")]
    RoomNotFound(String),

    /// Watermark storage errors other than I/O
    #[error("Storage error: {0}")]
    Storage(String),

    /// Message source errors (malformed responses, missing data)
    #[error("Fetch error: {0}")]
    Fetch(String),

    /// A message handler failed to process a message
    #[error("Handler error: {0}")]
    Handler(String),

    /// Authentication errors (e.g., 401 Unauthorized)
    #[error("Authentication error: {0}")]
    Authentication(String),

    /// Non-success response from the chat API
    #[error("API error ({status}): {message}")]
    Api {
        /// HTTP status code
        status: u16,
        /// Response body returned by the API
        message: String,
    },

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// SQLite watermark database errors
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
}

/// Coarse classification of a [`RoomWatchError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Startup problems: bad configuration, unknown room
    Config,
    /// Watermark could not be read or written
    Storage,
    /// The message source failed
    Fetch,
    /// The message handler failed
    Handler,
}

impl RoomWatchError {
    /// Classify the error into one of the error kinds.
    ///
    /// # Examples
    ///
    /// ```
    /// use roomwatch::error::{ErrorKind, RoomWatchError};
    ///
    /// let err = RoomWatchError::RoomNotFound("Tech_stuff".to_string());
    /// assert_eq!(err.kind(), ErrorKind::Config);
    /// ```
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Config(_) | Self::RoomNotFound(_) | Self::Yaml(_) => ErrorKind::Config,
            Self::Storage(_) | Self::Io(_) | Self::Database(_) => ErrorKind::Storage,
            Self::Fetch(_)
            | Self::Authentication(_)
            | Self::Api { .. }
            | Self::Http(_)
            | Self::Serialization(_) => ErrorKind::Fetch,
            Self::Handler(_) => ErrorKind::Handler,
        }
    }
}

/// Result type alias for roomwatch library operations
pub type Result<T> = std::result::Result<T, RoomWatchError>;
