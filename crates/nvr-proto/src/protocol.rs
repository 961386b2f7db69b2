//! Home Assistant websocket API messages used by the recordings browser.
//!
//! Only the `media_source` commands and the auth handshake are modelled;
//! everything else the server sends deserializes to [`ServerMessage::Other`].

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// `code` of a failed result when browsing a path that is not there.
pub const BROWSE_MEDIA_FAILED: &str = "browse_media_failed";
/// `message` paired with [`BROWSE_MEDIA_FAILED`] for a missing path.
pub const PATH_DOES_NOT_EXIST: &str = "Path does not exist.";
/// Generic `code` some integrations use for missing media.
pub const NOT_FOUND: &str = "not_found";

/// Media classification reported by `media_source/browse_media`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaClass {
    Album,
    App,
    Artist,
    Channel,
    Composer,
    ContributingArtist,
    Directory,
    Episode,
    Game,
    Genre,
    Image,
    Movie,
    Music,
    Playlist,
    Podcast,
    Season,
    Track,
    TvShow,
    Url,
    Video,
    #[serde(other)]
    Unknown,
}

/// One node of a media source tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrowseMedia {
    pub media_class: MediaClass,
    pub media_content_id: String,
    #[serde(default)]
    pub media_content_type: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub can_play: bool,
    #[serde(default)]
    pub can_expand: bool,
    #[serde(default)]
    pub children: Vec<BrowseMedia>,
    #[serde(default)]
    pub children_media_class: Option<MediaClass>,
    #[serde(default)]
    pub thumbnail: Option<String>,
    #[serde(default)]
    pub not_shown: u32,
}

impl BrowseMedia {
    pub fn directory(content_id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            media_class: MediaClass::Directory,
            media_content_id: content_id.into(),
            media_content_type: String::new(),
            title: title.into(),
            can_play: false,
            can_expand: true,
            children: Vec::new(),
            children_media_class: None,
            thumbnail: None,
            not_shown: 0,
        }
    }

    pub fn leaf(
        media_class: MediaClass,
        content_id: impl Into<String>,
        title: impl Into<String>,
    ) -> Self {
        Self {
            media_class,
            media_content_id: content_id.into(),
            media_content_type: String::new(),
            title: title.into(),
            can_play: true,
            can_expand: false,
            children: Vec::new(),
            children_media_class: None,
            thumbnail: None,
            not_shown: 0,
        }
    }

    pub fn with_children(mut self, children: Vec<BrowseMedia>) -> Self {
        self.children = children;
        self
    }
}

/// Result of `media_source/resolve_media`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedMedia {
    pub url: String,
    pub mime_type: String,
}

/// Commands sent after authentication. Each goes out wrapped in a [`Request`].
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum Command {
    #[serde(rename = "media_source/browse_media")]
    BrowseMedia { media_content_id: String },
    #[serde(rename = "media_source/resolve_media")]
    ResolveMedia { media_content_id: String, expires: u32 },
}

/// A command plus the id the server echoes back in its result.
#[derive(Debug, Serialize)]
pub struct Request<'a> {
    pub id: u64,
    #[serde(flatten)]
    pub command: &'a Command,
}

/// The single message sent during the auth phase.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename = "auth")]
pub struct Auth<'a> {
    pub access_token: &'a str,
}

/// `error` object of a failed result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub code: String,
    #[serde(default)]
    pub message: String,
}

impl ErrorPayload {
    /// Whether the server is telling us the requested path does not exist.
    pub fn is_not_found(&self) -> bool {
        (self.code == BROWSE_MEDIA_FAILED && self.message == PATH_DOES_NOT_EXIST)
            || self.code == NOT_FOUND
    }
}

/// Messages received from Home Assistant.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    AuthRequired {
        #[serde(default)]
        ha_version: Option<String>,
    },
    AuthOk {
        #[serde(default)]
        ha_version: Option<String>,
    },
    AuthInvalid {
        #[serde(default)]
        message: Option<String>,
    },
    Result {
        id: u64,
        success: bool,
        #[serde(default)]
        result: Option<Value>,
        #[serde(default)]
        error: Option<ErrorPayload>,
    },
    #[serde(other)]
    Other,
}
