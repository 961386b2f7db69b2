//! The browse/resolve boundary every media backend implements.

use std::future::Future;
use std::time::Duration;

use nvr_proto::protocol::{BrowseMedia, ResolvedMedia};
use thiserror::Error;

/// Why a browse or resolve failed.
///
/// `NotFound` is reserved for "the requested path does not exist"; the crawler
/// treats it as an empty day when it hits the day folder itself. Everything
/// else is `Transport`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SourceError {
    #[error("{content_id}: path does not exist")]
    NotFound { content_id: String },

    #[error("{content_id}: {message}")]
    Transport { content_id: String, message: String },
}

impl SourceError {
    pub fn not_found(content_id: impl Into<String>) -> Self {
        Self::NotFound {
            content_id: content_id.into(),
        }
    }

    pub fn transport(content_id: impl Into<String>, message: impl ToString) -> Self {
        Self::Transport {
            content_id: content_id.into(),
            message: message.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub fn content_id(&self) -> &str {
        match self {
            Self::NotFound { content_id } | Self::Transport { content_id, .. } => content_id,
        }
    }

    /// Demotes `NotFound` to `Transport`, for call sites where a missing path is a real failure.
    pub fn into_transport(self) -> Self {
        match self {
            Self::NotFound { content_id } => Self::Transport {
                content_id,
                message: "path does not exist".to_string(),
            },
            other => other,
        }
    }
}

/// A media source tree: folders to enumerate, leaves to resolve into playable urls.
pub trait MediaSource: Send + Sync {
    fn browse(
        &self,
        content_id: &str,
    ) -> impl Future<Output = Result<BrowseMedia, SourceError>> + Send;

    /// Turns a leaf into a playable url valid for roughly `expires`.
    fn resolve(
        &self,
        content_id: &str,
        expires: Duration,
    ) -> impl Future<Output = Result<ResolvedMedia, SourceError>> + Send;
}

impl<S: MediaSource> MediaSource for std::sync::Arc<S> {
    fn browse(
        &self,
        content_id: &str,
    ) -> impl Future<Output = Result<BrowseMedia, SourceError>> + Send {
        (**self).browse(content_id)
    }

    fn resolve(
        &self,
        content_id: &str,
        expires: Duration,
    ) -> impl Future<Output = Result<ResolvedMedia, SourceError>> + Send {
        (**self).resolve(content_id, expires)
    }
}
