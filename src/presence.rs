//! Station-side cache of recently seen buses.
//!
//! One record per bus, refreshed on every received broadcast and swept
//! by age each receiver cycle. The owning loop injects the clock so the
//! eviction window is testable.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Last-seen state for one bus, as published in station updates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresenceRecord {
    pub bus_id: String,
    /// Estimated arrival in minutes, as announced by the bus
    pub eta: f64,
    /// Unix seconds when the broadcast was received
    pub last_seen: i64,
}

#[derive(Debug, Default)]
pub struct PresenceCache {
    records: HashMap<String, PresenceRecord>,
}

impl PresenceCache {
    pub fn new() -> Self {
        Self {
            records: HashMap::new(),
        }
    }

    /// Insert or replace the record for a bus. Newest write wins; there
    /// is no merging.
    pub fn upsert(&mut self, record: PresenceRecord) {
        self.records.insert(record.bus_id.clone(), record);
    }

    /// Full sweep removing every record older than the window. Returns
    /// the evicted bus ids.
    pub fn evict_stale(&mut self, now: i64, stale_window: Duration) -> Vec<String> {
        let cutoff = stale_window.as_secs() as i64;
        let mut evicted = Vec::new();
        self.records.retain(|bus_id, record| {
            if now - record.last_seen > cutoff {
                evicted.push(bus_id.clone());
                false
            } else {
                true
            }
        });
        evicted
    }

    /// Owned copy of all records, sorted by ascending ETA (ties by bus
    /// id) so rendering and publishing are deterministic.
    pub fn snapshot(&self) -> Vec<PresenceRecord> {
        let mut records: Vec<PresenceRecord> = self.records.values().cloned().collect();
        records.sort_by(|a, b| {
            a.eta
                .total_cmp(&b.eta)
                .then_with(|| a.bus_id.cmp(&b.bus_id))
        });
        records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_record(bus_id: &str, eta: f64, last_seen: i64) -> PresenceRecord {
        PresenceRecord {
            bus_id: bus_id.to_string(),
            eta,
            last_seen,
        }
    }

    const WINDOW: Duration = Duration::from_secs(300);

    #[test]
    fn upsert_replaces_existing_record() {
        let mut cache = PresenceCache::new();
        cache.upsert(make_record("7", 3.5, 100));
        cache.upsert(make_record("7", 1.0, 160));

        assert_eq!(cache.len(), 1);
        let snapshot = cache.snapshot();
        assert_eq!(snapshot[0].eta, 1.0);
        assert_eq!(snapshot[0].last_seen, 160);
    }

    #[test]
    fn eviction_respects_window_boundaries() {
        let t = 1_000_000;
        let mut cache = PresenceCache::new();
        cache.upsert(make_record("7", 3.5, t));

        // Within the window: record survives
        assert!(cache.evict_stale(t + 60, WINDOW).is_empty());
        assert_eq!(cache.len(), 1);

        // Exactly at the window boundary: still fresh
        assert!(cache.evict_stale(t + 300, WINDOW).is_empty());
        assert_eq!(cache.len(), 1);

        // Past the window: evicted
        let evicted = cache.evict_stale(t + 400, WINDOW);
        assert_eq!(evicted, vec!["7".to_string()]);
        assert!(cache.is_empty());
    }

    #[test]
    fn eviction_removes_only_stale_records() {
        let t = 1_000_000;
        let mut cache = PresenceCache::new();
        cache.upsert(make_record("old", 5.0, t - 400));
        cache.upsert(make_record("older", 6.0, t - 301));
        cache.upsert(make_record("fresh", 2.0, t - 10));

        let mut evicted = cache.evict_stale(t, WINDOW);
        evicted.sort();
        assert_eq!(evicted, vec!["old".to_string(), "older".to_string()]);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.snapshot()[0].bus_id, "fresh");
    }

    #[test]
    fn eviction_on_empty_cache_is_a_noop() {
        let mut cache = PresenceCache::new();
        assert!(cache.evict_stale(1_000_000, WINDOW).is_empty());
        assert!(cache.is_empty());
    }

    #[test]
    fn snapshot_is_sorted_by_eta_then_id() {
        let mut cache = PresenceCache::new();
        cache.upsert(make_record("12", 8.0, 100));
        cache.upsert(make_record("7", 2.0, 100));
        cache.upsert(make_record("3", 8.0, 100));

        let ids: Vec<String> = cache.snapshot().into_iter().map(|r| r.bus_id).collect();
        assert_eq!(
            ids,
            vec!["7".to_string(), "12".to_string(), "3".to_string()]
        );
    }

    #[test]
    fn snapshot_is_a_copy() {
        let mut cache = PresenceCache::new();
        cache.upsert(make_record("7", 2.0, 100));

        let mut snapshot = cache.snapshot();
        snapshot[0].eta = 99.0;
        assert_eq!(cache.snapshot()[0].eta, 2.0);
    }
}
