//! Selection state plus the day cache, behind one lock.
//!
//! `StateManager` is the only writer. Every mutation bumps `rev` so pollers can
//! tell whether anything changed since they last looked.

use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDateTime;
use nvr_proto::config::{CardConfig, SourceConfig};
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{debug, error, info};

use crate::cache::DayCache;
use crate::crawler::{Crawler, Recording};
use crate::source::MediaSource;
use crate::timestamp::{folder_path, DayKey, Pattern};

/// What the user is looking at.
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    pub day: DayKey,
    pub selected_url: Option<String>,
    /// True while the selected day is being crawled.
    pub loading: bool,
    pub last_error: Option<String>,
    pub rev: u64,
}

impl Selection {
    pub fn new(day: DayKey) -> Self {
        Self {
            day,
            selected_url: None,
            loading: false,
            last_error: None,
            rev: 1,
        }
    }

    /// Selected url with a `#t=` start offset, the way the player expects it.
    pub fn player_url(&self, start_at: Option<u32>) -> Option<String> {
        let url = self.selected_url.as_ref()?;
        Some(match start_at {
            Some(secs) if secs > 0 => format!("{}#t={}", url, secs),
            _ => url.clone(),
        })
    }
}

/// Everything the card derives from config rather than from the source.
#[derive(Debug, Clone)]
pub struct CardSettings {
    pub content_root: String,
    pub folder_pattern: Pattern,
    pub file_name_pattern: Pattern,
    pub display_pattern: Pattern,
    pub start_at: Option<u32>,
    pub header: Option<String>,
    pub resolve_expires: Duration,
}

impl CardSettings {
    pub fn from_config(card: &CardConfig, source: &SourceConfig) -> Self {
        Self {
            content_root: card.content_root(),
            folder_pattern: Pattern::new(&card.folder_format),
            file_name_pattern: Pattern::new(&card.file_name_format),
            display_pattern: Pattern::new(&card.display_format),
            start_at: card.start_at,
            header: card.header().map(str::to_string),
            resolve_expires: Duration::from_secs(u64::from(source.resolve_expires_secs)),
        }
    }

    /// Content id of the folder holding `day`'s recordings.
    pub fn day_folder(&self, day: DayKey) -> String {
        format!(
            "{}{}",
            self.content_root,
            folder_path(day, &self.folder_pattern)
        )
    }
}

/// One row of the recordings list.
#[derive(Debug, Clone, Serialize)]
pub struct RecordingView {
    pub label: String,
    pub url: String,
    pub mime_type: String,
    pub title: String,
    pub start: Option<NaiveDateTime>,
    pub selected: bool,
}

/// Read-only snapshot handed to whatever renders the card.
#[derive(Debug, Clone, Serialize)]
pub struct View {
    pub rev: u64,
    pub header: Option<String>,
    pub day: DayKey,
    pub loading: bool,
    pub last_error: Option<String>,
    pub selected_url: Option<String>,
    pub player_url: Option<String>,
    pub recordings: Vec<RecordingView>,
}

struct State {
    cache: DayCache,
    selection: Selection,
}

struct Inner<S> {
    crawler: Crawler<S>,
    settings: CardSettings,
    state: RwLock<State>,
}

/// Cheaply cloneable handle over the selection and the day cache.
pub struct StateManager<S> {
    inner: Arc<Inner<S>>,
}

impl<S> Clone for StateManager<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: MediaSource> StateManager<S> {
    /// Starts on today with nothing cached. Call `select_day` to load something.
    pub fn new(source: S, settings: CardSettings) -> Self {
        Self::starting_on(source, settings, DayKey::today())
    }

    pub fn starting_on(source: S, settings: CardSettings, day: DayKey) -> Self {
        let crawler = Crawler::new(
            source,
            settings.file_name_pattern.clone(),
            settings.resolve_expires,
        );
        Self {
            inner: Arc::new(Inner {
                crawler,
                settings,
                state: RwLock::new(State {
                    cache: DayCache::new(),
                    selection: Selection::new(day),
                }),
            }),
        }
    }

    pub fn settings(&self) -> &CardSettings {
        &self.inner.settings
    }

    pub fn source(&self) -> &S {
        self.inner.crawler.source()
    }

    /// Crawls `day` unless it is cached or already being crawled.
    ///
    /// Success is stored for good; failure stores nothing and lands in
    /// `last_error`, so the day can be tried again. The loading flag is only
    /// touched while `day` is the selected day.
    pub async fn ensure(&self, day: DayKey) {
        {
            let mut state = self.inner.state.write().await;
            if !state.cache.try_claim(day) {
                debug!("ensure: {} already cached or loading", day);
                return;
            }
            if state.selection.day == day {
                state.selection.loading = true;
                state.selection.last_error = None;
            }
            state.selection.rev += 1;
        }

        let root = self.inner.settings.day_folder(day);
        info!("Loading recordings for {} from {}", day, root);
        let result = self.inner.crawler.crawl(&root, day).await;

        let mut state = self.inner.state.write().await;
        match result {
            Ok(recordings) => {
                let stored = state.cache.store(day, recordings);
                info!("Cached {} recordings for {}", stored.len(), day);
            }
            Err(e) => {
                state.cache.release(day);
                error!("Failed to load {}: {}", day, e);
                state.selection.last_error = Some(e.to_string());
            }
        }
        if state.selection.day == day {
            state.selection.loading = false;
        }
        state.selection.rev += 1;
    }

    /// Makes `day` (today when `None`) current and loads it.
    ///
    /// A day whose last crawl failed is retried, even if it is already selected.
    pub async fn select_day(&self, day: Option<DayKey>) {
        let day = self.set_day(day).await;
        self.ensure(day).await;
    }

    /// Moves the selection `delta` calendar days and loads the new day.
    pub async fn navigate(&self, delta: i64) {
        let day = self.step_day(delta).await;
        self.ensure(day).await;
    }

    /// Makes `day` (today when `None`) current without loading it.
    ///
    /// The selection reads as loading until the day is cached; the caller is
    /// expected to follow up with [`StateManager::ensure`].
    pub async fn set_day(&self, day: Option<DayKey>) -> DayKey {
        let day = day.unwrap_or_else(DayKey::today);
        self.move_to(move |_| day).await
    }

    /// Like [`StateManager::set_day`], relative to the current day.
    pub async fn step_day(&self, delta: i64) -> DayKey {
        self.move_to(move |current| current.shift(delta)).await
    }

    async fn move_to(&self, pick: impl FnOnce(DayKey) -> DayKey) -> DayKey {
        let mut state = self.inner.state.write().await;
        let day = pick(state.selection.day);
        if state.selection.day != day {
            debug!("selection: {} -> {}", state.selection.day, day);
        }
        state.selection.day = day;
        state.selection.loading = !state.cache.contains(day);
        state.selection.rev += 1;
        day
    }

    pub async fn select_recording(&self, url: impl Into<String>) {
        let mut state = self.inner.state.write().await;
        state.selection.selected_url = Some(url.into());
        state.selection.rev += 1;
    }

    pub async fn current_day(&self) -> DayKey {
        self.inner.state.read().await.selection.day
    }

    pub async fn selection(&self) -> Selection {
        self.inner.state.read().await.selection.clone()
    }

    pub async fn cached(&self, day: DayKey) -> Option<Arc<[Recording]>> {
        self.inner.state.read().await.cache.get(day)
    }

    /// Recordings of the selected day; empty until it has loaded.
    pub async fn visible(&self) -> Arc<[Recording]> {
        let state = self.inner.state.read().await;
        state
            .cache
            .get(state.selection.day)
            .unwrap_or_else(|| Arc::from(Vec::new()))
    }

    pub async fn view(&self) -> View {
        let state = self.inner.state.read().await;
        let settings = &self.inner.settings;
        let selection = &state.selection;

        let recordings = state
            .cache
            .get(selection.day)
            .map(|recordings| {
                recordings
                    .iter()
                    .map(|r| RecordingView {
                        label: settings.display_pattern.format_or_invalid(r.start),
                        url: r.url.clone(),
                        mime_type: r.mime_type.clone(),
                        title: r.title.clone(),
                        start: r.start,
                        selected: selection.selected_url.as_deref() == Some(r.url.as_str()),
                    })
                    .collect()
            })
            .unwrap_or_default();

        View {
            rev: selection.rev,
            header: settings.header.clone(),
            day: selection.day,
            loading: selection.loading,
            last_error: selection.last_error.clone(),
            selected_url: selection.selected_url.clone(),
            player_url: selection.player_url(settings.start_at),
            recordings,
        }
    }
}
