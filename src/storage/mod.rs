//! Watermark storage
//!
//! A watermark is the id of the last message that was processed for a room.
//! The poller reads it once at the start of every cycle and writes it at
//! most once at the end, so backends only need to store a single value.
//!
//! # Backends
//!
//! - [`FileStore`]: one-line text file (the reference backend)
//! - [`SqliteStore`]: one row per room in a SQLite database
//! - [`MemoryStore`]: process-local, for tests and dry runs

pub mod file;
pub mod sqlite;

pub use file::FileStore;
pub use sqlite::SqliteStore;

use crate::error::{Result, RoomWatchError};
use std::sync::{Arc, Mutex, MutexGuard};

/// Persistence for the last processed message id.
pub trait MessageStore {
    /// Returns the saved watermark, or `None` if nothing was saved yet.
    ///
    /// A missing backing file or row is not an error.
    fn get_last_id(&self) -> Result<Option<String>>;

    /// Persist `id` as the watermark, replacing any previous value.
    ///
    /// Empty ids and ids spanning several lines are rejected with a storage
    /// error and leave the stored value unchanged.
    fn set_last_id(&mut self, id: &str) -> Result<()>;

    /// Forget the watermark so the next cycle starts from the beginning.
    fn clear_last_id(&mut self) -> Result<()>;
}

impl<T: MessageStore + ?Sized> MessageStore for Box<T> {
    fn get_last_id(&self) -> Result<Option<String>> {
        (**self).get_last_id()
    }

    fn set_last_id(&mut self, id: &str) -> Result<()> {
        (**self).set_last_id(id)
    }

    fn clear_last_id(&mut self) -> Result<()> {
        (**self).clear_last_id()
    }
}

impl<T: MessageStore + ?Sized> MessageStore for &mut T {
    fn get_last_id(&self) -> Result<Option<String>> {
        (**self).get_last_id()
    }

    fn set_last_id(&mut self, id: &str) -> Result<()> {
        (**self).set_last_id(id)
    }

    fn clear_last_id(&mut self) -> Result<()> {
        (**self).clear_last_id()
    }
}

/// In-memory watermark store.
///
/// Clones share the same value, which lets a test keep a handle on the store
/// after moving it into a poller.
///
/// # Examples
///
/// ```
/// use roomwatch::storage::{MemoryStore, MessageStore};
///
/// let mut store = MemoryStore::new();
/// let observer = store.clone();
/// store.set_last_id("42").unwrap();
/// assert_eq!(observer.get_last_id().unwrap().as_deref(), Some("42"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    last_id: Arc<Mutex<Option<String>>>,
    writes: Arc<Mutex<usize>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store that already holds a watermark.
    pub fn with_last_id(id: &str) -> Self {
        let store = Self::new();
        *lock(&store.last_id) = Some(id.to_string());
        store
    }

    /// Number of successful `set_last_id` calls.
    pub fn write_count(&self) -> usize {
        *lock(&self.writes)
    }
}

impl MessageStore for MemoryStore {
    fn get_last_id(&self) -> Result<Option<String>> {
        Ok(lock(&self.last_id).clone())
    }

    fn set_last_id(&mut self, id: &str) -> Result<()> {
        validate_id(id)?;
        *lock(&self.last_id) = Some(id.to_string());
        *lock(&self.writes) += 1;
        Ok(())
    }

    fn clear_last_id(&mut self) -> Result<()> {
        *lock(&self.last_id) = None;
        Ok(())
    }
}

/// Reject ids that a backend could not read back unchanged.
pub(crate) fn validate_id(id: &str) -> Result<()> {
    if id.is_empty() || id.contains(['\n', '\r']) {
        return Err(RoomWatchError::Storage(format!(
            "Invalid watermark id: {:?}",
            id
        )));
    }
    Ok(())
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
