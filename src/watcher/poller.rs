//! Poll cycle and watch loop
//!
//! A [`Poller`] binds a message source, a watermark store and a room. Each
//! call to [`Poller::poll_once`] runs one cycle:
//!
//! 1. read the stored watermark
//! 2. fetch up to `max_results` messages strictly newer than it
//! 3. hand every message that passes the filter chain to the handler
//! 4. store the id of the newest processed message
//!
//! The watermark is only written when at least one message was processed,
//! so a cycle that finds nothing new leaves the store untouched. A handler
//! error ends the cycle before the store is written.

use std::sync::mpsc::{Receiver, RecvTimeoutError, TryRecvError};
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::error::Result;
use crate::message_span;
use crate::source::{resolve_room, Message, MessageSource, Room};
use crate::storage::MessageStore;
use crate::watcher::filter::{FilterChain, MessageFilter};

/// Page size used when none is configured.
pub const DEFAULT_MAX_RESULTS: usize = 500;

/// Receives every message that passes the filter chain.
pub trait MessageHandler {
    /// Process one message.
    ///
    /// An error aborts the poll cycle and leaves the watermark where it was,
    /// so the message is offered again on the next cycle.
    fn process_message(&mut self, message: &Message) -> Result<()>;
}

impl<F> MessageHandler for F
where
    F: FnMut(&Message) -> Result<()>,
{
    fn process_message(&mut self, message: &Message) -> Result<()> {
        self(message)
    }
}

/// Handler that ignores every message.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopHandler;

impl MessageHandler for NoopHandler {
    fn process_message(&mut self, _message: &Message) -> Result<()> {
        Ok(())
    }
}

/// Outcome of a single poll cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PollReport {
    /// Messages returned by the source.
    pub fetched: usize,
    /// Messages that passed the filters and reached the handler.
    pub processed: usize,
    /// Watermark read at the start of the cycle.
    pub previous_watermark: Option<String>,
    /// Watermark after the cycle.
    pub watermark: Option<String>,
    /// Whether a new watermark was written.
    pub advanced: bool,
}

/// Totals for a watch loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WatchSummary {
    /// Completed poll cycles.
    pub cycles: usize,
    /// Messages processed across all cycles.
    pub processed: usize,
}

/// Incremental poller for one room.
///
/// # Examples
///
/// ```
/// use roomwatch::source::FakeSource;
/// use roomwatch::storage::{MemoryStore, MessageStore};
/// use roomwatch::watcher::{MessageFilter, Poller};
/// use serde_json::json;
///
/// let source = FakeSource::new().with_room("1", "Tech_stuff");
/// source.push_message("1", json!({"id": "1", "card": {"url": "https://example.com"}}));
///
/// let mut seen = Vec::new();
/// let mut poller = Poller::new(source, MemoryStore::new(), "Tech_stuff")
///     .unwrap()
///     .with_filter(MessageFilter::new().with_mandatory_fields(["card"]))
///     .with_handler(|m: &roomwatch::source::Message| {
///         seen.push(m.id());
///         Ok(())
///     });
///
/// let report = poller.poll_once().unwrap();
/// assert_eq!(report.processed, 1);
/// assert_eq!(poller.store().get_last_id().unwrap().as_deref(), Some("1"));
///
/// let report = poller.poll_once().unwrap();
/// assert_eq!(report.processed, 0);
/// drop(poller);
/// assert_eq!(seen, vec![Some("1".to_string())]);
/// ```
pub struct Poller<'h, S, T> {
    source: S,
    store: T,
    room: Room,
    filters: FilterChain,
    handler: Box<dyn MessageHandler + 'h>,
    max_results: usize,
}

impl<'h, S, T> Poller<'h, S, T>
where
    S: MessageSource,
    T: MessageStore,
{
    /// Create a poller for the room named `room_name`.
    ///
    /// The room is resolved immediately.
    ///
    /// # Errors
    ///
    /// Returns `RoomWatchError::RoomNotFound` if no room has that name, or the
    /// source's error if the room cannot be fetched.
    pub fn new(source: S, store: T, room_name: &str) -> Result<Self> {
        let room = resolve_room(&source, room_name)?;
        Ok(Self::with_room(source, store, room))
    }

    /// Create a poller for an already resolved room.
    pub fn with_room(source: S, store: T, room: Room) -> Self {
        Self {
            source,
            store,
            room,
            filters: FilterChain::new(),
            handler: Box::new(NoopHandler),
            max_results: DEFAULT_MAX_RESULTS,
        }
    }

    /// Append a filter to the chain.
    pub fn with_filter(mut self, filter: MessageFilter) -> Self {
        self.filters.push(filter);
        self
    }

    /// Replace the filter chain.
    pub fn with_filters(mut self, filters: FilterChain) -> Self {
        self.filters = filters;
        self
    }

    /// Set the handler that receives passing messages.
    pub fn with_handler<H>(mut self, handler: H) -> Self
    where
        H: MessageHandler + 'h,
    {
        self.handler = Box::new(handler);
        self
    }

    /// Set the page size requested from the source.
    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = max_results;
        self
    }

    pub fn room(&self) -> &Room {
        &self.room
    }

    pub fn filters(&self) -> &FilterChain {
        &self.filters
    }

    pub fn store(&self) -> &T {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut T {
        &mut self.store
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn max_results(&self) -> usize {
        self.max_results
    }

    /// Whether `message` passes every filter.
    pub fn is_message_valid(&self, message: &Message) -> bool {
        self.filters.accepts(message)
    }

    /// Run one fetch-filter-process cycle.
    ///
    /// # Errors
    ///
    /// Storage, fetch and handler errors are returned as-is. When the cycle
    /// fails the stored watermark is left unchanged.
    pub fn poll_once(&mut self) -> Result<PollReport> {
        let previous = self.store.get_last_id()?;

        debug!(
            room = %self.room.name,
            after = previous.as_deref().unwrap_or("-"),
            max_results = self.max_results,
            "Fetching messages"
        );

        let messages = self
            .source
            .latest(&self.room, previous.as_deref(), self.max_results)?;

        let mut processed = 0;
        let mut candidate: Option<String> = None;

        for message in &messages {
            let span = message_span!(message);
            let _guard = span.enter();

            if !self.filters.accepts(message) {
                debug!("Message filtered out");
                continue;
            }

            debug!("Processing message");
            self.handler.process_message(message)?;
            processed += 1;

            match message.id() {
                Some(id) => candidate = Some(id),
                None => warn!("Processed message has no id, watermark not advanced past it"),
            }
        }

        let advanced = match &candidate {
            Some(id) => {
                self.store.set_last_id(id)?;
                true
            }
            None => false,
        };

        let watermark = if advanced { candidate } else { previous.clone() };

        info!(
            room = %self.room.name,
            fetched = messages.len(),
            processed,
            watermark = watermark.as_deref().unwrap_or("-"),
            "Poll cycle complete"
        );

        Ok(PollReport {
            fetched: messages.len(),
            processed,
            previous_watermark: previous,
            watermark,
            advanced,
        })
    }

    /// Alias for [`Poller::poll_once`].
    pub fn run(&mut self) -> Result<PollReport> {
        self.poll_once()
    }

    /// Poll repeatedly until `shutdown` receives a message or disconnects.
    ///
    /// Cycles run back to back with `interval` between them. The shutdown
    /// signal is only observed between cycles. The first failing cycle ends
    /// the loop with its error.
    pub fn watch(&mut self, interval: Duration, shutdown: &Receiver<()>) -> Result<WatchSummary> {
        let mut summary = WatchSummary::default();

        info!(
            room = %self.room.name,
            interval_secs = interval.as_secs(),
            filters = %self.filters.summary(),
            "Watching room"
        );

        loop {
            match shutdown.try_recv() {
                Ok(()) | Err(TryRecvError::Disconnected) => break,
                Err(TryRecvError::Empty) => {}
            }

            let report = self.poll_once()?;
            summary.cycles += 1;
            summary.processed += report.processed;

            match shutdown.recv_timeout(interval) {
                Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                Err(RecvTimeoutError::Timeout) => {}
            }
        }

        info!(
            cycles = summary.cycles,
            processed = summary.processed,
            "Watch stopped"
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ErrorKind, RoomWatchError};
    use crate::source::{FakeSource, FetchRequest};
    use crate::storage::MemoryStore;
    use serde_json::json;
    use std::cell::RefCell;
    use std::rc::Rc;
    use std::sync::mpsc;

    const ROOM_ID: &str = "100";
    const ROOM: &str = "Tech_stuff";

    fn source_with(messages: Vec<serde_json::Value>) -> FakeSource {
        let source = FakeSource::new().with_room(ROOM_ID, ROOM);
        for message in messages {
            source.push_message(ROOM_ID, message);
        }
        source
    }

    fn recorder() -> (Rc<RefCell<Vec<String>>>, impl FnMut(&Message) -> Result<()>) {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        let handler = move |message: &Message| {
            sink.borrow_mut()
                .push(message.id().unwrap_or_else(|| "<none>".to_string()));
            Ok(())
        };
        (seen, handler)
    }

    fn card_filter() -> MessageFilter {
        MessageFilter::new().with_mandatory_fields(["card"])
    }

    #[test]
    fn test_new_resolves_room() {
        let poller = Poller::new(source_with(vec![]), MemoryStore::new(), ROOM).unwrap();
        assert_eq!(poller.room().id, ROOM_ID);
        assert_eq!(poller.max_results(), DEFAULT_MAX_RESULTS);
        assert!(poller.filters().is_empty());
    }

    #[test]
    fn test_unknown_room_is_config_error() {
        let err = Poller::new(source_with(vec![]), MemoryStore::new(), "Random")
            .err()
            .unwrap();
        assert!(matches!(err, RoomWatchError::RoomNotFound(_)));
        assert_eq!(err.kind(), ErrorKind::Config);
    }

    #[test]
    fn test_first_run_fetches_without_watermark() {
        let source = source_with(vec![json!({"id": "1"})]);
        let mut poller = Poller::new(source.clone(), MemoryStore::new(), ROOM).unwrap();

        poller.poll_once().unwrap();

        assert_eq!(
            source.requests(),
            vec![FetchRequest {
                room_id: ROOM_ID.to_string(),
                after: None,
                max_results: DEFAULT_MAX_RESULTS,
            }]
        );
    }

    #[test]
    fn test_watermark_is_last_passing_message() {
        let source = source_with(vec![
            json!({"id": "m1", "card": {}}),
            json!({"id": "m2", "message": "plain"}),
            json!({"id": "m3", "card": {}}),
        ]);
        let store = MemoryStore::new();
        let (seen, handler) = recorder();

        let mut poller = Poller::new(source, store.clone(), ROOM)
            .unwrap()
            .with_filter(card_filter())
            .with_handler(handler);

        let report = poller.poll_once().unwrap();

        assert_eq!(report.fetched, 3);
        assert_eq!(report.processed, 2);
        assert!(report.advanced);
        assert_eq!(report.watermark.as_deref(), Some("m3"));
        assert_eq!(*seen.borrow(), vec!["m1", "m3"]);
        assert_eq!(store.get_last_id().unwrap().as_deref(), Some("m3"));
    }

    #[test]
    fn test_second_cycle_is_idempotent() {
        let source = source_with(vec![json!({"id": "1"}), json!({"id": "2"})]);
        let store = MemoryStore::new();
        let mut poller = Poller::new(source.clone(), store.clone(), ROOM).unwrap();

        let first = poller.poll_once().unwrap();
        assert_eq!(first.processed, 2);
        assert_eq!(store.write_count(), 1);

        let second = poller.poll_once().unwrap();
        assert_eq!(second.processed, 0);
        assert!(!second.advanced);
        assert_eq!(second.previous_watermark.as_deref(), Some("2"));
        assert_eq!(second.watermark.as_deref(), Some("2"));
        assert_eq!(store.write_count(), 1);

        assert_eq!(source.requests()[1].after.as_deref(), Some("2"));
    }

    #[test]
    fn test_only_new_messages_are_processed() {
        let source = source_with(vec![json!({"id": "1"})]);
        let (seen, handler) = recorder();
        let mut poller = Poller::new(source.clone(), MemoryStore::new(), ROOM)
            .unwrap()
            .with_handler(handler);

        poller.poll_once().unwrap();
        source.push_message(ROOM_ID, json!({"id": "2"}));
        source.push_message(ROOM_ID, json!({"id": "3"}));
        let report = poller.poll_once().unwrap();

        assert_eq!(report.processed, 2);
        assert_eq!(*seen.borrow(), vec!["1", "2", "3"]);
    }

    #[test]
    fn test_nothing_passing_leaves_watermark() {
        let source = source_with(vec![json!({"id": "5", "message": "hi"})]);
        let store = MemoryStore::with_last_id("4");
        let mut poller = Poller::new(source, store.clone(), ROOM)
            .unwrap()
            .with_filter(card_filter());

        let report = poller.poll_once().unwrap();

        assert_eq!(report.fetched, 1);
        assert_eq!(report.processed, 0);
        assert!(!report.advanced);
        assert_eq!(store.get_last_id().unwrap().as_deref(), Some("4"));
        assert_eq!(store.write_count(), 0);
    }

    #[test]
    fn test_fetch_error_keeps_watermark() {
        let source = source_with(vec![json!({"id": "2"})]);
        let store = MemoryStore::with_last_id("1");
        let mut poller = Poller::new(source.clone(), store.clone(), ROOM).unwrap();

        source.fail_next_fetch("connection reset");
        let err = poller.poll_once().unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Fetch);
        assert_eq!(store.get_last_id().unwrap().as_deref(), Some("1"));
        assert_eq!(store.write_count(), 0);
    }

    #[test]
    fn test_handler_error_keeps_watermark() {
        let source = source_with(vec![json!({"id": "a"}), json!({"id": "b"})]);
        let store = MemoryStore::with_last_id("0");
        let mut calls = 0;
        let mut poller = Poller::new(source.clone(), store.clone(), ROOM)
            .unwrap()
            .with_handler(|message: &Message| {
                calls += 1;
                match message.id().as_deref() {
                    Some("b") => Err(RoomWatchError::Handler("broken pipe".to_string())),
                    _ => Ok(()),
                }
            });

        let err = poller.poll_once().unwrap_err();
        drop(poller);

        assert_eq!(err.kind(), ErrorKind::Handler);
        assert_eq!(calls, 2);
        assert_eq!(store.get_last_id().unwrap().as_deref(), Some("0"));
        assert_eq!(store.write_count(), 0);
    }

    #[test]
    fn test_failed_message_is_offered_again() {
        let source = source_with(vec![json!({"id": "1"})]);
        let store = MemoryStore::new();
        let mut fail = true;
        let mut poller = Poller::new(source.clone(), store.clone(), ROOM)
            .unwrap()
            .with_handler(move |_: &Message| {
                if std::mem::take(&mut fail) {
                    Err(RoomWatchError::Handler("stdout closed".to_string()))
                } else {
                    Ok(())
                }
            });

        assert!(poller.poll_once().is_err());
        let report = poller.poll_once().unwrap();

        assert_eq!(report.processed, 1);
        assert_eq!(source.requests()[1].after, None);
        assert_eq!(store.get_last_id().unwrap().as_deref(), Some("1"));
    }

    #[test]
    fn test_message_without_id_is_processed_but_not_stored() {
        let source = source_with(vec![json!({"id": "1"}), json!({"message": "no id"})]);
        let store = MemoryStore::new();
        let (seen, handler) = recorder();
        let mut poller = Poller::new(source, store.clone(), ROOM)
            .unwrap()
            .with_handler(handler);

        let report = poller.poll_once().unwrap();

        assert_eq!(report.processed, 2);
        assert_eq!(*seen.borrow(), vec!["1", "<none>"]);
        assert_eq!(store.get_last_id().unwrap().as_deref(), Some("1"));
    }

    #[test]
    fn test_max_results_is_forwarded() {
        let source = source_with((1..=5).map(|i| json!({"id": i.to_string()})).collect());
        let mut poller = Poller::new(source.clone(), MemoryStore::new(), ROOM)
            .unwrap()
            .with_max_results(2);

        let report = poller.run().unwrap();

        assert_eq!(report.fetched, 2);
        assert_eq!(report.watermark.as_deref(), Some("5"));
        assert_eq!(source.requests()[0].max_results, 2);
    }

    #[test]
    fn test_is_message_valid_uses_chain() {
        let poller = Poller::new(source_with(vec![]), MemoryStore::new(), ROOM)
            .unwrap()
            .with_filters(vec![card_filter()].into());

        assert!(poller.is_message_valid(&Message::new(json!({"card": {}}))));
        assert!(!poller.is_message_valid(&Message::new(json!({"message": "x"}))));
    }

    #[test]
    fn test_store_mut_allows_reset() {
        let source = source_with(vec![json!({"id": "1"})]);
        let mut poller = Poller::new(source, MemoryStore::new(), ROOM).unwrap();

        poller.poll_once().unwrap();
        poller.store_mut().clear_last_id().unwrap();
        let report = poller.poll_once().unwrap();

        assert_eq!(report.previous_watermark, None);
        assert_eq!(report.processed, 1);
    }

    #[test]
    fn test_watch_stops_on_pending_shutdown() {
        let source = source_with(vec![json!({"id": "1"})]);
        let mut poller = Poller::new(source.clone(), MemoryStore::new(), ROOM).unwrap();

        let (tx, rx) = mpsc::channel();
        tx.send(()).unwrap();

        let summary = poller.watch(Duration::from_secs(60), &rx).unwrap();

        assert_eq!(summary, WatchSummary::default());
        assert!(source.requests().is_empty());
    }

    #[test]
    fn test_watch_runs_until_sender_dropped() {
        let source = source_with(vec![json!({"id": "1"})]);
        let mut poller = Poller::new(source.clone(), MemoryStore::new(), ROOM).unwrap();

        let (tx, rx) = mpsc::channel::<()>();
        let stopper = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(50));
            drop(tx);
        });

        let summary = poller.watch(Duration::from_millis(5), &rx).unwrap();
        stopper.join().unwrap();

        assert!(summary.cycles >= 1);
        assert_eq!(summary.processed, 1);
    }

    #[test]
    fn test_watch_returns_first_error() {
        let source = source_with(vec![]);
        let mut poller = Poller::new(source.clone(), MemoryStore::new(), ROOM).unwrap();
        let (_tx, rx) = mpsc::channel();

        source.fail_next_fetch("boom");
        let err = poller.watch(Duration::from_millis(1), &rx).unwrap_err();

        assert!(matches!(err, RoomWatchError::Fetch(_)));
        assert_eq!(source.requests().len(), 1);
    }
}
