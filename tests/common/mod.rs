use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

use roomwatch::source::FakeSource;

/// Room id and name used by the shared fixtures.
#[allow(dead_code)]
pub const ROOM_ID: &str = "2042";
#[allow(dead_code)]
pub const ROOM_NAME: &str = "Tech_stuff";

#[allow(dead_code)]
pub fn temp_config_file(contents: &str) -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().expect("failed to create tempdir");
    let config_path = temp_dir.path().join("config.yaml");
    fs::write(&config_path, contents).expect("failed to write config file");
    (temp_dir, config_path)
}

/// Fake source holding the fixture room and no messages.
#[allow(dead_code)]
pub fn fixture_source() -> FakeSource {
    FakeSource::new()
        .with_room("1", "Random")
        .with_room(ROOM_ID, ROOM_NAME)
}

/// A link card message in the shape the room history API returns.
#[allow(dead_code)]
pub fn card_message(id: &str, url: &str) -> serde_json::Value {
    serde_json::json!({
        "id": id,
        "date": "2016-03-01T12:30:00.000000+00:00",
        "from": {"id": 7, "name": "Ada Lovelace", "mention_name": "ada"},
        "message": url,
        "type": "message",
        "card": {
            "style": "link",
            "url": url,
            "title": "Link",
            "description": {"format": "text", "value": "A link"}
        },
        "message_links": [{"type": "link", "url": url}]
    })
}

/// A plain text message without cards or links.
#[allow(dead_code)]
pub fn text_message(id: &str, text: &str) -> serde_json::Value {
    serde_json::json!({
        "id": id,
        "date": "2016-03-01T12:31:00.000000+00:00",
        "from": {"id": 8, "name": "Grace Hopper", "mention_name": "grace"},
        "message": text,
        "type": "message"
    })
}
