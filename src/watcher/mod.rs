//! Watcher module for polling a chat room
//!
//! This module turns a message source and a watermark store into an
//! incremental poller: it fetches the messages posted since the last run,
//! filters them, hands the survivors to a handler, and remembers where it
//! stopped.
//!
//! # Modules
//!
//! - [`filter`]: Message filtering by field presence and custom predicates
//! - [`logging`]: Structured logging configuration
//! - [`poller`]: Poll cycle and watch loop

pub mod filter;
pub mod logging;
pub mod poller;

pub use filter::{FilterChain, MessageFilter, Validator};
pub use poller::{MessageHandler, NoopHandler, PollReport, Poller, WatchSummary};
