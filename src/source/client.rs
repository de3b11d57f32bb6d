//! HTTP client for the HipChat v2 room API.
//!
//! Implements [`MessageSource`] on top of three read-only endpoints:
//!
//! - `GET /v2/room` lists rooms
//! - `GET /v2/room/{id}` fetches one room
//! - `GET /v2/room/{id}/history/latest` fetches the newest page of history
//!
//! The client is blocking: a poll cycle is strictly sequential, so there is
//! nothing to gain from an async runtime here.
//!
//! # Example
//!
//! ```rust,no_run
//! use roomwatch::source::{HttpClientConfig, HttpRoomClient, MessageSource};
//!
//! let config = HttpClientConfig {
//!     base_url: "https://api.hipchat.com".to_string(),
//!     token: "your-token".to_string(),
//!     timeout_secs: 30,
//! };
//! let client = HttpRoomClient::new(config)?;
//! for room in client.list_rooms()? {
//!     println!("{} {}", room.id, room.name);
//! }
//! # Ok::<(), roomwatch::RoomWatchError>(())
//! ```

use reqwest::blocking::{Client, Response};
use reqwest::StatusCode;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

use crate::error::{Result, RoomWatchError};
use crate::source::{Message, MessageSource, Room};

/// Default API endpoint.
pub const DEFAULT_BASE_URL: &str = "https://api.hipchat.com";

/// Page size used when listing rooms.
const ROOM_LIST_PAGE_SIZE: usize = 1000;

/// Collection envelope returned by list endpoints.
#[derive(Debug, Deserialize)]
struct ItemsResponse<T> {
    items: Vec<T>,
}

/// HTTP client configuration.
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Base URL of the chat API.
    pub base_url: String,
    /// Bearer token for authentication.
    pub token: String,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl HttpClientConfig {
    /// Creates configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// * `ROOMWATCH_BASE_URL` - Base URL (default: https://api.hipchat.com)
    /// * `ROOMWATCH_TOKEN` - API token (required)
    ///
    /// # Errors
    ///
    /// Returns `RoomWatchError::Authentication` if `ROOMWATCH_TOKEN` is not set.
    pub fn from_env() -> Result<Self> {
        let base_url =
            std::env::var("ROOMWATCH_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());

        let token = std::env::var("ROOMWATCH_TOKEN")
            .map_err(|_| RoomWatchError::Authentication("ROOMWATCH_TOKEN not set".to_string()))?;

        Ok(Self {
            base_url,
            token,
            timeout_secs: 30,
        })
    }
}

/// Blocking client for the room history API.
pub struct HttpRoomClient {
    client: Client,
    base_url: Url,
    token: String,
}

impl HttpRoomClient {
    /// Creates a new client.
    ///
    /// # Errors
    ///
    /// Returns `RoomWatchError::Config` if the base URL is invalid or the
    /// token is empty, and `RoomWatchError::Http` if the HTTP client cannot
    /// be built.
    pub fn new(config: HttpClientConfig) -> Result<Self> {
        if config.token.trim().is_empty() {
            return Err(RoomWatchError::Config(
                "An API token is required (source.token or ROOMWATCH_TOKEN)".to_string(),
            ));
        }

        let base_url = Url::parse(&config.base_url).map_err(|e| {
            RoomWatchError::Config(format!("Invalid base URL {}: {}", config.base_url, e))
        })?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url,
            token: config.token,
        })
    }

    /// Creates a client from environment variables.
    pub fn from_env() -> Result<Self> {
        Self::new(HttpClientConfig::from_env()?)
    }

    /// Build an absolute URL from path segments below the base URL.
    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| {
                RoomWatchError::Config(format!("Base URL cannot be a base: {}", self.base_url))
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Send an authenticated GET and map error statuses.
    fn get(&self, url: Url, query: &[(&str, String)]) -> Result<Response> {
        debug!(url = %url, "GET");
        let response = self
            .client
            .get(url)
            .bearer_auth(&self.token)
            .query(query)
            .send()?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().unwrap_or_default();
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                Err(RoomWatchError::Authentication(format!("{}: {}", status, body)))
            }
            _ => Err(RoomWatchError::Api {
                status: status.as_u16(),
                message: body,
            }),
        }
    }
}

impl MessageSource for HttpRoomClient {
    fn list_rooms(&self) -> Result<Vec<Room>> {
        let url = self.endpoint(&["v2", "room"])?;
        let response = self.get(url, &[("max-results", ROOM_LIST_PAGE_SIZE.to_string())])?;
        let rooms: ItemsResponse<Room> = response.json()?;

        debug!(count = rooms.items.len(), "Listed rooms");
        Ok(rooms.items)
    }

    fn get_room(&self, id: &str) -> Result<Room> {
        let url = self.endpoint(&["v2", "room", id])?;
        let room: Room = self.get(url, &[])?.json()?;
        info!(room_id = %room.id, room = %room.name, "Fetched room");
        Ok(room)
    }

    fn latest(
        &self,
        room: &Room,
        after: Option<&str>,
        max_results: usize,
    ) -> Result<Vec<Message>> {
        let url = self.endpoint(&["v2", "room", &room.id, "history", "latest"])?;

        let mut query = vec![("max-results", max_results.to_string())];
        if let Some(id) = after {
            query.push(("not-before", id.to_string()));
        }

        let page: ItemsResponse<Message> = self.get(url, &query)?.json()?;
        let messages = drop_through(page.items, after);

        debug!(
            room_id = %room.id,
            count = messages.len(),
            "Fetched latest messages"
        );
        Ok(messages)
    }
}

/// Drop every message up to and including the one with id `after`.
///
/// `not-before` is inclusive upstream, so the watermark message itself comes
/// back at the head of the page. If the id is not in the page, the page is
/// returned unchanged.
fn drop_through(messages: Vec<Message>, after: Option<&str>) -> Vec<Message> {
    let Some(after) = after else {
        return messages;
    };

    match messages
        .iter()
        .position(|message| message.id().as_deref() == Some(after))
    {
        Some(index) => messages.into_iter().skip(index + 1).collect(),
        None => messages,
    }
}
