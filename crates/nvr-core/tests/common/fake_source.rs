#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use nvr_core::source::{MediaSource, SourceError};
use nvr_core::state::CardSettings;
use nvr_core::timestamp::{DayKey, Pattern};
use nvr_proto::protocol::{BrowseMedia, MediaClass, ResolvedMedia};
use tokio::sync::{Barrier, Notify};

pub const ROOT: &str = "root/";

/// In-memory media tree with call counters and hooks for holding calls open.
///
/// Unknown folders browse as `NotFound`; unknown leaves fail to resolve.
#[derive(Default)]
pub struct FakeSource {
    folders: HashMap<String, Result<BrowseMedia, SourceError>>,
    leaves: HashMap<String, Result<ResolvedMedia, SourceError>>,
    gates: HashMap<String, Arc<Notify>>,
    flaky: Mutex<HashSet<String>>,
    resolve_barrier: Option<Arc<Barrier>>,
    browse_calls: AtomicUsize,
    resolve_calls: AtomicUsize,
    browsed: Mutex<Vec<String>>,
    resolved: Mutex<Vec<String>>,
}

impl FakeSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn folder(mut self, id: &str, children: Vec<BrowseMedia>) -> Self {
        let node = BrowseMedia::directory(id, id.rsplit('/').next().unwrap_or(id))
            .with_children(children);
        self.folders.insert(id.to_string(), Ok(node));
        self
    }

    pub fn broken_folder(mut self, id: &str, message: &str) -> Self {
        self.folders
            .insert(id.to_string(), Err(SourceError::transport(id, message)));
        self
    }

    /// Fails with a transport error on the first browse of `id`, then behaves normally.
    pub fn flaky_folder(self, id: &str) -> Self {
        self.flaky.lock().unwrap().insert(id.to_string());
        self
    }

    pub fn leaf(mut self, id: &str, url: &str) -> Self {
        self.leaves.insert(
            id.to_string(),
            Ok(ResolvedMedia {
                url: url.to_string(),
                mime_type: "video/mp4".to_string(),
            }),
        );
        self
    }

    pub fn missing_leaf(mut self, id: &str) -> Self {
        self.leaves
            .insert(id.to_string(), Err(SourceError::not_found(id)));
        self
    }

    /// Holds every browse of `id` until the returned handle is notified.
    pub fn gate(&mut self, id: &str) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.gates.insert(id.to_string(), gate.clone());
        gate
    }

    /// Every resolve waits until `n` resolves are in flight at once.
    pub fn resolve_barrier(mut self, n: usize) -> Self {
        self.resolve_barrier = Some(Arc::new(Barrier::new(n)));
        self
    }

    pub fn browse_calls(&self) -> usize {
        self.browse_calls.load(Ordering::SeqCst)
    }

    pub fn resolve_calls(&self) -> usize {
        self.resolve_calls.load(Ordering::SeqCst)
    }

    pub fn browsed(&self) -> Vec<String> {
        self.browsed.lock().unwrap().clone()
    }

    pub fn resolved(&self) -> Vec<String> {
        self.resolved.lock().unwrap().clone()
    }
}

impl MediaSource for FakeSource {
    async fn browse(&self, content_id: &str) -> Result<BrowseMedia, SourceError> {
        self.browse_calls.fetch_add(1, Ordering::SeqCst);
        self.browsed.lock().unwrap().push(content_id.to_string());

        if let Some(gate) = self.gates.get(content_id) {
            gate.notified().await;
        }
        tokio::task::yield_now().await;

        if self.flaky.lock().unwrap().remove(content_id) {
            return Err(SourceError::transport(content_id, "temporarily unavailable"));
        }

        self.folders
            .get(content_id)
            .cloned()
            .unwrap_or_else(|| Err(SourceError::not_found(content_id)))
    }

    async fn resolve(
        &self,
        content_id: &str,
        _expires: Duration,
    ) -> Result<ResolvedMedia, SourceError> {
        self.resolve_calls.fetch_add(1, Ordering::SeqCst);
        self.resolved.lock().unwrap().push(content_id.to_string());

        if let Some(barrier) = &self.resolve_barrier {
            barrier.wait().await;
        }
        tokio::task::yield_now().await;

        self.leaves
            .get(content_id)
            .cloned()
            .unwrap_or_else(|| Err(SourceError::transport(content_id, "no such leaf")))
    }
}

pub fn dir(id: &str) -> BrowseMedia {
    BrowseMedia::directory(id, id.rsplit('/').next().unwrap_or(id))
}

pub fn video(id: &str, title: &str) -> BrowseMedia {
    BrowseMedia::leaf(MediaClass::Video, id, title)
}

pub fn image(id: &str) -> BrowseMedia {
    BrowseMedia::leaf(MediaClass::Image, id, id)
}

pub fn day(y: i32, m: u32, d: u32) -> DayKey {
    DayKey::from_ymd(y, m, d).unwrap()
}

/// `root/` + `YYYYMMDD` day folders, `YYYYMMDD_HHmmss` file titles.
pub fn settings() -> CardSettings {
    CardSettings {
        content_root: ROOT.to_string(),
        folder_pattern: Pattern::new("YYYYMMDD"),
        file_name_pattern: Pattern::new("YYYYMMDD_HHmmss"),
        display_pattern: Pattern::new("HH:mm:ss"),
        start_at: None,
        header: None,
        resolve_expires: Duration::from_secs(3600),
    }
}
