//! SQLite watermark backend.
//!
//! Keeps one row per room in a `watermarks` table, so a single database can
//! serve several poller configurations.

use chrono::Utc;
use directories::ProjectDirs;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{Result, RoomWatchError};
use crate::storage::{validate_id, MessageStore};

/// Watermark stored as a row in a SQLite database.
pub struct SqliteStore {
    db_path: PathBuf,
    key: String,
}

impl SqliteStore {
    /// Open the default database in the user's data directory.
    ///
    /// The `ROOMWATCH_STORE_DB` environment variable overrides the location.
    pub fn new(key: &str) -> Result<Self> {
        if let Ok(override_path) = std::env::var("ROOMWATCH_STORE_DB") {
            return Self::new_with_path(override_path, key);
        }

        Self::new_with_path(default_db_path()?, key)
    }

    /// Open (and initialize) the database at `db_path`, keyed by `key`.
    ///
    /// # Examples
    ///
    /// ```
    /// use roomwatch::storage::{MessageStore, SqliteStore};
    ///
    /// let dir = tempfile::tempdir().unwrap();
    /// let mut store = SqliteStore::new_with_path(dir.path().join("w.db"), "Tech_stuff").unwrap();
    /// store.set_last_id("42").unwrap();
    /// assert_eq!(store.get_last_id().unwrap().as_deref(), Some("42"));
    /// ```
    pub fn new_with_path<P: Into<PathBuf>>(db_path: P, key: &str) -> Result<Self> {
        let db_path = db_path.into();

        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let store = Self {
            db_path,
            key: key.to_string(),
        };
        store.init()?;
        Ok(store)
    }

    /// Path of the database file.
    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    fn open(&self) -> Result<Connection> {
        Ok(Connection::open(&self.db_path)?)
    }

    fn init(&self) -> Result<()> {
        self.open()?.execute(
            "CREATE TABLE IF NOT EXISTS watermarks (
                room TEXT PRIMARY KEY,
                last_id TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )",
            [],
        )?;
        Ok(())
    }
}

/// Default database location in the platform data directory.
pub fn default_db_path() -> Result<PathBuf> {
    let proj_dirs = ProjectDirs::from("com", "roomwatch", "roomwatch")
        .ok_or_else(|| RoomWatchError::Storage("Could not determine data directory".into()))?;
    Ok(proj_dirs.data_dir().join("watermarks.db"))
}

impl MessageStore for SqliteStore {
    fn get_last_id(&self) -> Result<Option<String>> {
        let last_id = self
            .open()?
            .query_row(
                "SELECT last_id FROM watermarks WHERE room = ?",
                params![self.key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(last_id.filter(|id| !id.is_empty()))
    }

    fn set_last_id(&mut self, id: &str) -> Result<()> {
        validate_id(id)?;
        let now = Utc::now().to_rfc3339();
        self.open()?.execute(
            "INSERT INTO watermarks (room, last_id, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(room) DO UPDATE SET last_id = excluded.last_id,
                                             updated_at = excluded.updated_at",
            params![self.key, id, now],
        )?;

        debug!(room = %self.key, last_id = %id, "Saved watermark");
        Ok(())
    }

    fn clear_last_id(&mut self) -> Result<()> {
        self.open()?
            .execute("DELETE FROM watermarks WHERE room = ?", params![self.key])?;
        Ok(())
    }
}
