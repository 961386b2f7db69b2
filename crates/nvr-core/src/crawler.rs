//! Recursive, concurrent walk of a media source folder.
//!
//! ```text
//!   crawl(day folder)
//!     browse ──► children
//!                 ├── directory ──► crawl_folder (recursive)  ┐
//!                 ├── video     ──► resolve + parse title     ├─ all in flight together
//!                 └── anything else: skipped                  ┘
//! ```
//!
//! Any failure below the day folder aborts the whole crawl; the sibling
//! futures still in flight are dropped with it.

use std::time::Duration;

use chrono::NaiveDateTime;
use futures_util::future::{self, BoxFuture, FutureExt};
use nvr_proto::protocol::{BrowseMedia, MediaClass};
use serde::Serialize;
use tracing::{debug, warn};

use crate::source::{MediaSource, SourceError};
use crate::timestamp::{parse_title, DayKey, Pattern};

/// A leaf resolved into something a player can open.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recording {
    pub mime_type: String,
    pub url: String,
    /// Display title of the leaf the recording came from.
    pub title: String,
    /// Parsed from `title`; `None` when the title does not match the file-name template.
    pub start: Option<NaiveDateTime>,
    pub duration: Option<Duration>,
}

pub struct Crawler<S> {
    source: S,
    file_name_pattern: Pattern,
    resolve_expires: Duration,
}

impl<S: MediaSource> Crawler<S> {
    pub fn new(source: S, file_name_pattern: Pattern, resolve_expires: Duration) -> Self {
        Self {
            source,
            file_name_pattern,
            resolve_expires,
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Every recording below `root`, the folder holding `day`, in no particular order.
    ///
    /// A `root` that does not exist is an empty day, not an error.
    pub async fn crawl(&self, root: &str, day: DayKey) -> Result<Vec<Recording>, SourceError> {
        let node = match self.source.browse(root).await {
            Ok(node) => node,
            Err(e) if e.is_not_found() => {
                debug!("crawl: {} does not exist, treating as empty", root);
                return Ok(Vec::new());
            }
            Err(e) => return Err(e),
        };

        let recordings = self.crawl_children(node, day).await?;
        debug!("crawl: {} → {} recordings", root, recordings.len());
        Ok(recordings)
    }

    fn crawl_folder(
        &self,
        content_id: String,
        day: DayKey,
    ) -> BoxFuture<'_, Result<Vec<Recording>, SourceError>> {
        async move {
            let node = self.source.browse(&content_id).await?;
            self.crawl_children(node, day).await
        }
        .boxed()
    }

    async fn crawl_children(&self, node: BrowseMedia, day: DayKey) -> Result<Vec<Recording>, SourceError> {
        let mut folders = Vec::new();
        let mut videos = Vec::new();

        for child in node.children {
            match child.media_class {
                MediaClass::Directory => folders.push(self.crawl_folder(child.media_content_id, day)),
                MediaClass::Video => videos.push(self.resolve_leaf(child, day)),
                other => debug!("crawl: skipping {:?} {}", other, child.media_content_id),
            }
        }

        let (nested, resolved) =
            future::try_join(future::try_join_all(folders), future::try_join_all(videos)).await?;

        let mut recordings: Vec<Recording> = nested.into_iter().flatten().collect();
        recordings.extend(resolved);
        Ok(recordings)
    }

    async fn resolve_leaf(&self, leaf: BrowseMedia, day: DayKey) -> Result<Recording, SourceError> {
        let resolved = self
            .source
            .resolve(&leaf.media_content_id, self.resolve_expires)
            .await
            .map_err(SourceError::into_transport)?;

        let start = parse_title(&leaf.title, &self.file_name_pattern, day);
        if start.is_none() {
            warn!(
                "crawl: title {:?} does not match {:?}",
                leaf.title,
                self.file_name_pattern.template()
            );
        }

        Ok(Recording {
            mime_type: resolved.mime_type,
            url: resolved.url,
            title: leaf.title,
            start,
            duration: None,
        })
    }
}
