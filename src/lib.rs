//! roomwatch - incremental chat room poller library
//!
//! This library polls a chat room's message history, runs every new message
//! through a chain of filters, hands the survivors to a handler, and persists
//! a watermark (the id of the last processed message) so each run only sees
//! what was posted since the previous one.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//!
//! - `source`: Message source trait, HipChat v2 HTTP client, and an in-memory fake
//! - `storage`: Watermark persistence (file, SQLite, memory)
//! - `watcher`: Filters, the poller, and logging setup
//! - `config`: Configuration management and validation
//! - `error`: Error types and result aliases
//! - `cli` / `commands`: Command-line interface and its handlers
//!
//! # Example
//!
//! ```no_run
//! use roomwatch::source::HttpRoomClient;
//! use roomwatch::storage::FileStore;
//! use roomwatch::watcher::{MessageFilter, Poller};
//!
//! fn main() -> anyhow::Result<()> {
//!     let client = HttpRoomClient::from_env()?;
//!     let store = FileStore::for_room("Tech_stuff");
//!
//!     let mut poller = Poller::new(client, store, "Tech_stuff")?
//!         .with_filter(MessageFilter::new().with_mandatory_fields(["message_links"]))
//!         .with_handler(|message: &roomwatch::Message| {
//!             println!("{:?}", message.id());
//!             Ok(())
//!         });
//!
//!     let report = poller.poll_once()?;
//!     println!("processed {} messages", report.processed);
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod source;
pub mod storage;
pub mod watcher;

// Re-export commonly used types
pub use config::Config;
pub use error::{ErrorKind, Result, RoomWatchError};
pub use source::{Message, MessageSource, Room};
pub use storage::MessageStore;
pub use watcher::{FilterChain, MessageFilter, MessageHandler, PollReport, Poller};
