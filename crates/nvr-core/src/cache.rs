//! Write-once store of crawled days.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::warn;

use crate::crawler::Recording;
use crate::timestamp::DayKey;

/// Recordings per day, newest first.
///
/// A day is claimed before it is crawled and either stored or released when the
/// crawl ends. Once stored it never changes and is never crawled again; a
/// released day can be claimed again later.
#[derive(Debug, Default)]
pub struct DayCache {
    entries: HashMap<DayKey, Arc<[Recording]>>,
    in_flight: HashSet<DayKey>,
}

impl DayCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, day: DayKey) -> Option<Arc<[Recording]>> {
        self.entries.get(&day).cloned()
    }

    pub fn contains(&self, day: DayKey) -> bool {
        self.entries.contains_key(&day)
    }

    pub fn is_in_flight(&self, day: DayKey) -> bool {
        self.in_flight.contains(&day)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Claims `day` for a crawl. `false` when it is already cached or being crawled.
    pub fn try_claim(&mut self, day: DayKey) -> bool {
        if self.entries.contains_key(&day) {
            return false;
        }
        self.in_flight.insert(day)
    }

    /// Sorts and stores a finished crawl, releasing the claim.
    pub fn store(&mut self, day: DayKey, mut recordings: Vec<Recording>) -> Arc<[Recording]> {
        self.in_flight.remove(&day);
        if let Some(existing) = self.entries.get(&day) {
            warn!("cache: {} already stored, keeping the first result", day);
            return existing.clone();
        }

        sort_newest_first(&mut recordings);
        let entry: Arc<[Recording]> = recordings.into();
        self.entries.insert(day, entry.clone());
        entry
    }

    /// Drops the claim on a day whose crawl failed.
    pub fn release(&mut self, day: DayKey) {
        self.in_flight.remove(&day);
    }
}

/// Descending by start; recordings without a start go last. Stable.
pub fn sort_newest_first(recordings: &mut [Recording]) {
    recordings.sort_by(|a, b| b.start.cmp(&a.start));
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn rec(url: &str, hms: Option<(u32, u32, u32)>) -> Recording {
        Recording {
            mime_type: "video/mp4".to_string(),
            url: url.to_string(),
            title: url.to_string(),
            start: hms.map(|(h, m, s)| {
                NaiveDate::from_ymd_opt(2024, 1, 1)
                    .unwrap()
                    .and_hms_opt(h, m, s)
                    .unwrap()
            }),
            duration: None,
        }
    }

    fn urls(recordings: &[Recording]) -> Vec<&str> {
        recordings.iter().map(|r| r.url.as_str()).collect()
    }

    fn day() -> DayKey {
        DayKey::from_ymd(2024, 1, 1).unwrap()
    }

    #[test]
    fn sorts_newest_first_with_invalid_last() {
        let mut recordings = vec![
            rec("bad1", None),
            rec("morning", Some((8, 0, 0))),
            rec("evening", Some((20, 0, 0))),
            rec("bad2", None),
            rec("noon", Some((12, 0, 0))),
        ];
        sort_newest_first(&mut recordings);
        assert_eq!(
            urls(&recordings),
            vec!["evening", "noon", "morning", "bad1", "bad2"]
        );
    }

    #[test]
    fn ties_keep_discovery_order() {
        let mut recordings = vec![
            rec("a", Some((9, 0, 0))),
            rec("b", Some((9, 0, 0))),
            rec("c", Some((9, 0, 0))),
        ];
        sort_newest_first(&mut recordings);
        assert_eq!(urls(&recordings), vec!["a", "b", "c"]);
    }

    #[test]
    fn claim_is_exclusive_until_settled() {
        let mut cache = DayCache::new();
        assert!(cache.try_claim(day()));
        assert!(cache.is_in_flight(day()));
        assert!(!cache.try_claim(day()));

        cache.release(day());
        assert!(!cache.is_in_flight(day()));
        assert!(!cache.contains(day()));
        assert!(cache.try_claim(day()));
    }

    #[test]
    fn stored_days_are_never_claimed_again() {
        let mut cache = DayCache::new();
        assert!(cache.try_claim(day()));
        let stored = cache.store(
            day(),
            vec![rec("early", Some((1, 0, 0))), rec("late", Some((23, 0, 0)))],
        );
        assert_eq!(urls(&stored), vec!["late", "early"]);
        assert!(!cache.is_in_flight(day()));
        assert!(!cache.try_claim(day()));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn second_store_keeps_first_result() {
        let mut cache = DayCache::new();
        cache.store(day(), vec![rec("first", None)]);
        let kept = cache.store(day(), vec![rec("second", None)]);
        assert_eq!(urls(&kept), vec!["first"]);
        assert_eq!(urls(&cache.get(day()).unwrap()), vec!["first"]);
    }

    #[test]
    fn empty_day_is_cached() {
        let mut cache = DayCache::new();
        assert!(cache.try_claim(day()));
        cache.store(day(), Vec::new());
        assert!(cache.contains(day()));
        assert!(cache.get(day()).unwrap().is_empty());
    }
}
