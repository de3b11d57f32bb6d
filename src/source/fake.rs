//! In-process fake message source for unit and integration tests
//!
//! [`FakeSource`] keeps rooms and their message logs in memory. Clones share
//! the same state, so a test can hand one clone to a
//! [`Poller`](crate::watcher::Poller) and keep another to append messages
//! between cycles or inspect the requests the poller made.
//!
//! # Example
//!
//! ```
//! use roomwatch::source::{FakeSource, MessageSource, Room};
//! use serde_json::json;
//!
//! let source = FakeSource::new().with_room("1", "Tech_stuff");
//! source.push_message("1", json!({"id": "a"}));
//! source.push_message("1", json!({"id": "b"}));
//!
//! let room = Room::new("1", "Tech_stuff");
//! let newer = source.latest(&room, Some("a"), 10).unwrap();
//! assert_eq!(newer.len(), 1);
//! assert_eq!(source.requests().len(), 1);
//! ```

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use serde_json::Value as JsonValue;

use crate::error::{Result, RoomWatchError};
use crate::source::{Message, MessageSource, Room};

/// A `latest` call recorded by [`FakeSource`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    /// Room id the messages were requested for.
    pub room_id: String,
    /// Watermark passed as the lower bound.
    pub after: Option<String>,
    /// Page size requested.
    pub max_results: usize,
}

#[derive(Debug, Default)]
struct FakeState {
    rooms: Vec<Room>,
    history: BTreeMap<String, Vec<Message>>,
    requests: Vec<FetchRequest>,
    fail_next: Option<String>,
}

/// In-memory [`MessageSource`] for tests.
#[derive(Debug, Clone, Default)]
pub struct FakeSource {
    state: Arc<Mutex<FakeState>>,
}

impl FakeSource {
    /// Create an empty source with no rooms.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a room, builder style.
    pub fn with_room(self, id: &str, name: &str) -> Self {
        self.lock().rooms.push(Room::new(id, name));
        self
    }

    /// Append a message to a room's history (newest last).
    pub fn push_message(&self, room_id: &str, message: JsonValue) {
        self.lock()
            .history
            .entry(room_id.to_string())
            .or_default()
            .push(Message::new(message));
    }

    /// Make the next `latest` call fail with a fetch error.
    pub fn fail_next_fetch(&self, reason: &str) {
        self.lock().fail_next = Some(reason.to_string());
    }

    /// All `latest` calls made so far, oldest first.
    pub fn requests(&self) -> Vec<FetchRequest> {
        self.lock().requests.clone()
    }

    fn lock(&self) -> MutexGuard<'_, FakeState> {
        // A panicking test thread must not hide the state from the others.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl MessageSource for FakeSource {
    fn list_rooms(&self) -> Result<Vec<Room>> {
        Ok(self.lock().rooms.clone())
    }

    fn get_room(&self, id: &str) -> Result<Room> {
        self.lock()
            .rooms
            .iter()
            .find(|room| room.id == id)
            .cloned()
            .ok_or_else(|| RoomWatchError::Api {
                status: 404,
                message: format!("Room {} not found", id),
            })
    }

    fn latest(
        &self,
        room: &Room,
        after: Option<&str>,
        max_results: usize,
    ) -> Result<Vec<Message>> {
        let mut state = self.lock();
        state.requests.push(FetchRequest {
            room_id: room.id.clone(),
            after: after.map(str::to_string),
            max_results,
        });

        if let Some(reason) = state.fail_next.take() {
            return Err(RoomWatchError::Fetch(reason));
        }

        let history = state.history.get(&room.id).cloned().unwrap_or_default();

        let start = match after {
            Some(id) => history
                .iter()
                .position(|message| message.id().as_deref() == Some(id))
                .map(|index| index + 1)
                .unwrap_or(0),
            None => 0,
        };

        let newer = &history[start..];
        let skip = newer.len().saturating_sub(max_results);
        Ok(newer[skip..].to_vec())
    }
}
