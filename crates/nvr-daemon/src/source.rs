use std::time::Duration;

use anyhow::bail;
use nvr_core::hass::HassClient;
use nvr_core::local::LocalMediaSource;
use nvr_core::source::{MediaSource, SourceError};
use nvr_proto::config::{Config, SourceKind, TOKEN_ENV};
use nvr_proto::protocol::{BrowseMedia, ResolvedMedia};
use tracing::info;

/// The media source picked by `source.kind`.
pub enum AnySource {
    Hass(HassClient),
    Local(LocalMediaSource),
}

impl AnySource {
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        match config.source.kind {
            SourceKind::Hass => {
                let token = config.hass.token();
                if token.trim().is_empty() {
                    bail!(
                        "no Home Assistant token: set hass.token in {} or {}",
                        Config::config_path().display(),
                        TOKEN_ENV
                    );
                }
                info!("Using Home Assistant at {}", config.hass.url);
                Ok(Self::Hass(HassClient::new(
                    config.hass.url.clone(),
                    token,
                    Duration::from_secs(config.hass.request_timeout_secs),
                )))
            }
            SourceKind::Local => {
                info!("Using local media under {:?}", config.source.local_root);
                Ok(Self::Local(LocalMediaSource::new(
                    config.source.local_root.clone(),
                )))
            }
        }
    }
}

impl MediaSource for AnySource {
    async fn browse(&self, content_id: &str) -> Result<BrowseMedia, SourceError> {
        match self {
            Self::Hass(client) => client.browse(content_id).await,
            Self::Local(local) => local.browse(content_id).await,
        }
    }

    async fn resolve(
        &self,
        content_id: &str,
        expires: Duration,
    ) -> Result<ResolvedMedia, SourceError> {
        match self {
            Self::Hass(client) => client.resolve(content_id, expires).await,
            Self::Local(local) => local.resolve(content_id, expires).await,
        }
    }
}
