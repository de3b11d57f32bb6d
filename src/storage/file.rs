//! One-line text file watermark backend.
//!
//! The file holds exactly one line: the watermark followed by `\n`. A
//! missing file or an empty first line both mean "no watermark".

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{Result, RoomWatchError};
use crate::storage::{validate_id, MessageStore};

/// Template for the default watermark file name; `{}` is the room name.
pub const DEFAULT_FILE_TEMPLATE: &str = "{}_last_message_db.info";

/// Watermark stored in a single text file.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    /// Use the watermark file at `path`.
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    /// Use the default file name for `room` in the current directory.
    ///
    /// # Examples
    ///
    /// ```
    /// use roomwatch::storage::FileStore;
    ///
    /// let store = FileStore::for_room("Tech stuff/ops");
    /// assert_eq!(
    ///     store.path().to_str(),
    ///     Some("Tech_stuff_ops_last_message_db.info")
    /// );
    /// ```
    pub fn for_room(room: &str) -> Self {
        Self::new(default_file_name(room))
    }

    /// Path of the watermark file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

/// Default watermark file name for a room.
///
/// Characters outside `[A-Za-z0-9_.-]` are replaced with `_` so any room
/// name yields a single, portable file name.
pub fn default_file_name(room: &str) -> String {
    let safe: String = room
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    DEFAULT_FILE_TEMPLATE.replace("{}", &safe)
}

impl MessageStore for FileStore {
    fn get_last_id(&self) -> Result<Option<String>> {
        let contents = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No watermark file");
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        let contents = String::from_utf8(contents).map_err(|_| {
            RoomWatchError::Storage(format!(
                "Watermark file {} is not valid UTF-8",
                self.path.display()
            ))
        })?;

        let first_line = contents.lines().next().unwrap_or_default();
        let last_id = first_line.trim_end_matches('\r');

        if last_id.is_empty() {
            Ok(None)
        } else {
            Ok(Some(last_id.to_string()))
        }
    }

    fn set_last_id(&mut self, id: &str) -> Result<()> {
        validate_id(id)?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let temp = self.temp_path();
        fs::write(&temp, format!("{}\n", id))?;
        fs::rename(&temp, &self.path)?;

        debug!(path = %self.path.display(), last_id = %id, "Saved watermark");
        Ok(())
    }

    fn clear_last_id(&mut self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
