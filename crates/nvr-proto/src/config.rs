use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::platform;

/// Environment variable that overrides `hass.token`, so the token can stay out
/// of the config file.
pub const TOKEN_ENV: &str = "NVR_HASS_TOKEN";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub hass: HassConfig,
    #[serde(default)]
    pub card: CardConfig,
    #[serde(default)]
    pub http: HttpConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// Home Assistant `media_source` over the websocket API.
    #[default]
    Hass,
    /// A local directory laid out like Home Assistant's `/media` share.
    Local,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    #[serde(default)]
    pub kind: SourceKind,
    /// Directory backing `media-source://media_source/local/` in local mode.
    #[serde(default = "default_local_root")]
    pub local_root: PathBuf,
    /// Expiry hint passed to `resolve_media`, in seconds.
    #[serde(default = "default_resolve_expires_secs")]
    pub resolve_expires_secs: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HassConfig {
    #[serde(default = "default_hass_url")]
    pub url: String,
    /// Long-lived access token.
    #[serde(default)]
    pub token: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

/// What the recordings card shows and where it finds it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CardConfig {
    #[serde(default)]
    pub header: String,
    /// Media source id holding one folder per day.
    #[serde(default = "default_content_id")]
    pub content_id: String,
    /// Day → folder name template, e.g. `YYYYMMDD`.
    #[serde(default = "default_folder_format")]
    pub folder_format: String,
    /// File title → start time template, e.g. `YYYYMMDD_HHmmss`.
    #[serde(default = "default_file_name_format")]
    pub file_name_format: String,
    /// Template for recording labels.
    #[serde(default = "default_display_format")]
    pub display_format: String,
    /// Seconds into each recording where playback should begin.
    #[serde(default)]
    pub start_at: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_http_enabled")]
    pub enabled: bool,
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            kind: SourceKind::default(),
            local_root: default_local_root(),
            resolve_expires_secs: default_resolve_expires_secs(),
        }
    }
}

impl Default for HassConfig {
    fn default() -> Self {
        Self {
            url: default_hass_url(),
            token: String::new(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl Default for CardConfig {
    fn default() -> Self {
        Self {
            header: String::new(),
            content_id: default_content_id(),
            folder_format: default_folder_format(),
            file_name_format: default_file_name_format(),
            display_format: default_display_format(),
            start_at: None,
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            enabled: default_http_enabled(),
            bind_address: default_bind_address(),
            port: default_port(),
        }
    }
}

fn default_local_root() -> PathBuf {
    PathBuf::from("/media")
}

fn default_resolve_expires_secs() -> u32 {
    60 * 60
}

fn default_hass_url() -> String {
    "ws://homeassistant.local:8123/api/websocket".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_content_id() -> String {
    "media-source://media_source/local/camera".to_string()
}

fn default_folder_format() -> String {
    "YYYYMMDD".to_string()
}

fn default_file_name_format() -> String {
    "YYYYMMDD_HHmmss".to_string()
}

fn default_display_format() -> String {
    "HH:mm:ss".to_string()
}

fn default_http_enabled() -> bool {
    true
}

fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8990
}

impl CardConfig {
    /// `content_id` with a guaranteed trailing `/`, ready to have a day folder appended.
    pub fn content_root(&self) -> String {
        if self.content_id.ends_with('/') {
            self.content_id.clone()
        } else {
            format!("{}/", self.content_id)
        }
    }

    /// Header text, or `None` when the card should render without one.
    pub fn header(&self) -> Option<&str> {
        let header = self.header.trim();
        (!header.is_empty()).then_some(header)
    }
}

impl HassConfig {
    /// The access token, preferring `NVR_HASS_TOKEN` over the config file.
    pub fn token(&self) -> String {
        match std::env::var(TOKEN_ENV) {
            Ok(token) if !token.trim().is_empty() => token.trim().to_string(),
            _ => self.token.clone(),
        }
    }
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let config_path = Self::config_path();

        if !config_path.exists() {
            let config = Self::default();
            config.save()?;
            return Ok(config);
        }

        Self::load_from(&config_path)
    }

    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let config_path = Self::config_path();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(&config_path, content)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        platform::config_dir().join("config.toml")
    }
}
