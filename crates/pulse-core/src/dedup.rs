use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;

/// Time-windowed record of event ids already forwarded to viewers.
///
/// Single-writer: only the active poller mutates it. Eviction piggybacks on
/// the poll cycle via `sweep`, so no background timer task is needed.
#[derive(Debug)]
pub struct DedupCache {
    ttl: Duration,
    entries: HashMap<String, DateTime<Utc>>,
}

impl DedupCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: HashMap::new(),
        }
    }

    pub fn has(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    /// Record `id` as first seen at `now`. Idempotent: re-marking keeps the
    /// original first-seen timestamp.
    pub fn mark(&mut self, id: &str, now: DateTime<Utc>) {
        self.entries.entry(id.to_string()).or_insert(now);
    }

    /// Drop every entry older than the TTL.
    pub fn sweep(&mut self, now: DateTime<Utc>) {
        let ttl = self.ttl;
        self.entries.retain(|_, first_seen| now - *first_seen <= ttl);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_750_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn entry_survives_until_ttl_expires() {
        let mut cache = DedupCache::new(Duration::minutes(5));
        cache.mark("evt_1", at(0));

        cache.sweep(at(4 * 60 + 59));
        assert!(cache.has("evt_1"));

        cache.sweep(at(5 * 60 + 1));
        assert!(!cache.has("evt_1"));
        assert!(cache.is_empty());
    }

    #[test]
    fn mark_is_idempotent() {
        let mut cache = DedupCache::new(Duration::minutes(5));
        cache.mark("evt_1", at(0));
        cache.mark("evt_1", at(4 * 60));
        assert_eq!(cache.len(), 1);

        // Re-marking must not refresh the first-seen timestamp.
        cache.sweep(at(5 * 60 + 1));
        assert!(!cache.has("evt_1"));
    }

    #[test]
    fn sweep_only_drops_expired_entries() {
        let mut cache = DedupCache::new(Duration::minutes(5));
        cache.mark("old", at(0));
        cache.mark("fresh", at(4 * 60));

        cache.sweep(at(6 * 60));
        assert!(!cache.has("old"));
        assert!(cache.has("fresh"));
        assert_eq!(cache.len(), 1);
    }
}
