//! Day-by-day browser over camera recordings stored in a media source.
//!
//! A day folder is crawled once, its video leaves resolved into playable urls
//! and ordered newest first by the time encoded in their titles.

pub mod cache;
pub mod crawler;
pub mod hass;
pub mod local;
pub mod source;
pub mod state;
pub mod timestamp;

pub use cache::DayCache;
pub use crawler::{Crawler, Recording};
pub use hass::HassClient;
pub use local::LocalMediaSource;
pub use source::{MediaSource, SourceError};
pub use state::{CardSettings, Selection, StateManager, View};
pub use timestamp::{DayKey, Pattern};
