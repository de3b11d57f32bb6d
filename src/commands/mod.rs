/*!
Command handlers for the CLI

This module provides command handlers invoked by the CLI entrypoint.

- `poll`: One poll cycle, or a watch loop until Ctrl-C
- `rooms`: List the rooms visible to the token
- `watermark`: Inspect or edit the stored watermark

The builders below turn a validated [`Config`] into the library components
the handlers drive.
*/

pub mod poll;
pub mod rooms;
pub mod watermark;

use crate::config::{Config, StorageBackend};
use crate::error::{Result, RoomWatchError};
use crate::source::{HttpClientConfig, HttpRoomClient, MessageSource};
use crate::storage::{FileStore, MemoryStore, MessageStore, SqliteStore};
use crate::watcher::{FilterChain, Poller};

/// Build the HTTP message source from configuration.
///
/// # Errors
///
/// Returns `RoomWatchError::Config` if no token is configured.
pub fn build_client(config: &Config) -> Result<HttpRoomClient> {
    let token = config.source.token.clone().ok_or_else(|| {
        RoomWatchError::Config(
            "No API token configured (set source.token or ROOMWATCH_TOKEN)".to_string(),
        )
    })?;

    HttpRoomClient::new(HttpClientConfig {
        base_url: config.source.base_url.clone(),
        token,
        timeout_secs: config.source.timeout_secs,
    })
}

/// Build the watermark store for `room` from configuration.
///
/// Without an explicit `storage.path`, the file backend writes
/// `<room>_last_message_db.info` in the working directory and the SQLite
/// backend uses the platform data directory.
pub fn build_store(config: &Config, room: &str) -> Result<Box<dyn MessageStore>> {
    let store: Box<dyn MessageStore> = match (config.storage.backend, &config.storage.path) {
        (StorageBackend::File, Some(path)) => Box::new(FileStore::new(path)),
        (StorageBackend::File, None) => Box::new(FileStore::for_room(room)),
        (StorageBackend::Sqlite, Some(path)) => Box::new(SqliteStore::new_with_path(path, room)?),
        (StorageBackend::Sqlite, None) => Box::new(SqliteStore::new(room)?),
        (StorageBackend::Memory, _) => Box::new(MemoryStore::new()),
    };

    tracing::debug!(backend = ?config.storage.backend, room = %room, "Opened watermark store");
    Ok(store)
}

/// Build a poller for the configured room on top of `source`.
///
/// # Errors
///
/// Fails if no room is configured, the room does not exist, a filter does
/// not compile or the store cannot be opened.
pub fn build_poller<'h, S: MessageSource>(
    config: &Config,
    source: S,
) -> Result<Poller<'h, S, Box<dyn MessageStore>>> {
    let room = config.room_name()?;
    let filters = FilterChain::from_configs(&config.filters)?;
    let store = build_store(config, room)?;

    tracing::info!(room = %room, filters = %filters.summary(), "Configured poller");

    Ok(Poller::new(source, store, room)?
        .with_filters(filters)
        .with_max_results(config.poll.max_results))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FilterConfig;
    use crate::error::ErrorKind;
    use crate::source::FakeSource;
    use serde_json::json;
    use tempfile::TempDir;

    fn file_config(dir: &TempDir) -> Config {
        let mut config = Config::default();
        config.room = Some("Tech_stuff".to_string());
        config.storage.path = Some(dir.path().join("watermark.info"));
        config
    }

    #[test]
    fn test_build_client_requires_token() {
        let err = build_client(&Config::default()).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::Config);

        let mut config = Config::default();
        config.source.token = Some("secret".to_string());
        assert!(build_client(&config).is_ok());
    }

    #[test]
    fn test_build_store_file_backend() {
        let dir = TempDir::new().unwrap();
        let config = file_config(&dir);

        let mut store = build_store(&config, "Tech_stuff").unwrap();
        store.set_last_id("9").unwrap();

        let contents = std::fs::read_to_string(dir.path().join("watermark.info")).unwrap();
        assert_eq!(contents, "9\n");
    }

    #[test]
    fn test_build_store_sqlite_backend() {
        let dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.storage.backend = StorageBackend::Sqlite;
        config.storage.path = Some(dir.path().join("watermarks.db"));

        let mut store = build_store(&config, "Tech_stuff").unwrap();
        store.set_last_id("9").unwrap();
        assert_eq!(store.get_last_id().unwrap().as_deref(), Some("9"));
        assert!(dir.path().join("watermarks.db").exists());
    }

    #[test]
    fn test_build_store_memory_backend() {
        let mut config = Config::default();
        config.storage.backend = StorageBackend::Memory;

        let store = build_store(&config, "Tech_stuff").unwrap();
        assert_eq!(store.get_last_id().unwrap(), None);
    }

    #[test]
    fn test_build_poller_applies_config() {
        let dir = TempDir::new().unwrap();
        let mut config = file_config(&dir);
        config.poll.max_results = 50;
        config.filters.push(FilterConfig {
            mandatory_fields: Some(vec!["card".to_string()]),
            ..Default::default()
        });

        let source = FakeSource::new().with_room("7", "Tech_stuff");
        source.push_message("7", json!({"id": "1", "message": "plain"}));
        source.push_message("7", json!({"id": "2", "card": {}}));

        let mut poller = build_poller(&config, source.clone()).unwrap();
        assert_eq!(poller.max_results(), 50);
        assert_eq!(poller.filters().len(), 1);

        let report = poller.poll_once().unwrap();
        assert_eq!(report.processed, 1);
        assert_eq!(report.watermark.as_deref(), Some("2"));
    }

    #[test]
    fn test_build_poller_requires_room() {
        let err = build_poller(&Config::default(), FakeSource::new())
            .err()
            .unwrap();
        assert_eq!(err.kind(), ErrorKind::Config);
    }
}
