//! Message source abstraction
//!
//! The poller only needs three capabilities from a chat service: list the
//! rooms, fetch one room by id, and fetch a bounded page of the newest
//! messages in a room, optionally constrained to those after a known id.
//! This module defines that capability as the [`MessageSource`] trait.
//!
//! # Submodules
//!
//! - [`client`]: HTTP client for the HipChat v2 room history API
//! - [`fake`]: In-memory source for tests
//! - [`message`]: Message and room types

pub mod client;
pub mod fake;
pub mod message;

pub use client::{HttpClientConfig, HttpRoomClient};
pub use fake::{FakeSource, FetchRequest};
pub use message::{Message, Room};

use crate::error::{Result, RoomWatchError};
use tracing::debug;

/// Read-only view of a chat service's rooms and their history.
pub trait MessageSource {
    /// List the rooms visible to the configured credentials.
    fn list_rooms(&self) -> Result<Vec<Room>>;

    /// Fetch a single room by its upstream id.
    fn get_room(&self, id: &str) -> Result<Room>;

    /// Fetch up to `max_results` of the latest messages in `room`.
    ///
    /// Messages are ordered oldest to newest. When `after` is set, only
    /// messages strictly newer than the message with that id are returned.
    fn latest(&self, room: &Room, after: Option<&str>, max_results: usize)
        -> Result<Vec<Message>>;
}

impl<S: MessageSource + ?Sized> MessageSource for Box<S> {
    fn list_rooms(&self) -> Result<Vec<Room>> {
        (**self).list_rooms()
    }

    fn get_room(&self, id: &str) -> Result<Room> {
        (**self).get_room(id)
    }

    fn latest(
        &self,
        room: &Room,
        after: Option<&str>,
        max_results: usize,
    ) -> Result<Vec<Message>> {
        (**self).latest(room, after, max_results)
    }
}

impl<S: MessageSource + ?Sized> MessageSource for &S {
    fn list_rooms(&self) -> Result<Vec<Room>> {
        (**self).list_rooms()
    }

    fn get_room(&self, id: &str) -> Result<Room> {
        (**self).get_room(id)
    }

    fn latest(
        &self,
        room: &Room,
        after: Option<&str>,
        max_results: usize,
    ) -> Result<Vec<Message>> {
        (**self).latest(room, after, max_results)
    }
}

/// Resolve a human-readable room name to a room handle.
///
/// The first room whose name matches exactly wins; it is then re-fetched by
/// id so the handle carries the full room details.
///
/// # Errors
///
/// Returns `RoomWatchError::RoomNotFound` if no room has that name, or the
/// source's error if listing or fetching fails.
///
/// # Examples
///
/// ```
/// use roomwatch::source::{resolve_room, FakeSource};
///
/// let source = FakeSource::new().with_room("7", "Tech_stuff");
/// let room = resolve_room(&source, "Tech_stuff").unwrap();
/// assert_eq!(room.id, "7");
/// assert!(resolve_room(&source, "Random").is_err());
/// ```
pub fn resolve_room<S: MessageSource + ?Sized>(source: &S, name: &str) -> Result<Room> {
    let rooms = source.list_rooms()?;
    let summary = rooms
        .into_iter()
        .find(|room| room.name == name)
        .ok_or_else(|| RoomWatchError::RoomNotFound(name.to_string()))?;

    debug!(room_id = %summary.id, room = %name, "Resolved room");
    source.get_room(&summary.id)
}
