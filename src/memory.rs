//! Memory Tier - Bounded In-Process Store
//!
//! A byte-budgeted key→entry map with least-recently-used eviction. The tier
//! is a plain data structure; the orchestrator serializes access behind its
//! lock, so no interior synchronization lives here.

use std::collections::HashMap;

use tracing::debug;

use crate::entry::CacheEntry;
use crate::key::CacheKey;
use crate::policy::TtlPolicy;

/// Bounded in-memory store with LRU eviction
#[derive(Debug)]
pub struct MemoryTier<T> {
    entries: HashMap<CacheKey, CacheEntry<T>>,
    total_bytes: u64,
}

impl<T> Default for MemoryTier<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> MemoryTier<T> {
    /// Create an empty tier
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
            total_bytes: 0,
        }
    }

    /// Insert an entry, returning the one it replaced (at most one entry
    /// per key at any time)
    pub fn insert(&mut self, key: CacheKey, entry: CacheEntry<T>) -> Option<CacheEntry<T>> {
        self.total_bytes += entry.size_bytes();
        let old = self.entries.insert(key, entry);
        if let Some(old_entry) = &old {
            self.total_bytes -= old_entry.size_bytes();
        }
        old
    }

    /// Mutable access to an entry (for access bookkeeping on hits)
    pub fn get_mut(&mut self, key: &CacheKey) -> Option<&mut CacheEntry<T>> {
        self.entries.get_mut(key)
    }

    /// Remove an entry
    pub fn remove(&mut self, key: &CacheKey) -> Option<CacheEntry<T>> {
        let removed = self.entries.remove(key);
        if let Some(entry) = &removed {
            self.total_bytes -= entry.size_bytes();
        }
        removed
    }

    /// Check whether a key is present
    pub fn contains(&self, key: &CacheKey) -> bool {
        self.entries.contains_key(key)
    }

    /// Number of resident entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when no entries are resident
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sum of resident entry sizes in bytes
    pub fn total_bytes(&self) -> u64 {
        self.total_bytes
    }

    /// Evict least-recently-used entries until `total_bytes <= limit_bytes`.
    ///
    /// Runs after every insert that could have pushed the tier over budget.
    /// Returns the number of evicted entries.
    pub fn enforce_limit(&mut self, limit_bytes: u64) -> usize {
        if self.total_bytes <= limit_bytes {
            return 0;
        }

        // Oldest last_access first; ties broken arbitrarily by sort order
        let mut candidates: Vec<(CacheKey, chrono::DateTime<chrono::Utc>)> = self
            .entries
            .iter()
            .map(|(key, entry)| (key.clone(), entry.metadata().last_access()))
            .collect();
        candidates.sort_by_key(|(_, last_access)| *last_access);

        let mut evicted = 0;
        for (key, _) in candidates {
            if self.total_bytes <= limit_bytes {
                break;
            }
            if let Some(entry) = self.remove(&key) {
                debug!(%key, freed = entry.size_bytes(), "evicted (LRU)");
                evicted += 1;
            }
        }
        evicted
    }

    /// Drop entries whose age exceeds their kind's TTL.
    ///
    /// Used by the optional background sweeper; correctness never depends on
    /// this running, since expiry is also checked on every access.
    pub fn purge_expired(&mut self, policy: &TtlPolicy) -> usize {
        let expired: Vec<CacheKey> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired(policy.ttl_for(&entry.metadata().tags().kind)))
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired {
            self.remove(key);
        }
        expired.len()
    }

    /// Remove entries whose tags match the supplied filters.
    ///
    /// A `None` filter matches everything for that dimension. Returns the
    /// number of entries removed.
    pub fn remove_matching(&mut self, subject: Option<&str>, kind: Option<&str>) -> usize {
        let matched: Vec<CacheKey> = self
            .entries
            .iter()
            .filter(|(_, entry)| {
                let tags = entry.metadata().tags();
                subject.map_or(true, |s| tags.subject == s) && kind.map_or(true, |k| tags.kind == k)
            })
            .map(|(key, _)| key.clone())
            .collect();

        for key in &matched {
            self.remove(key);
        }
        matched.len()
    }

    /// Remove everything, returning the number of entries dropped
    pub fn clear(&mut self) -> usize {
        let count = self.entries.len();
        self.entries.clear();
        self.total_bytes = 0;
        count
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::EntryTags;
    use crate::key::Params;

    fn key(name: &str) -> CacheKey {
        CacheKey::derive("basic_seo", name, &Params::new()).unwrap()
    }

    fn entry(subject: &str, payload_len: usize) -> CacheEntry<String> {
        CacheEntry::new(
            "x".repeat(payload_len),
            EntryTags::new("basic_seo", subject, Params::new()),
        )
    }

    #[test]
    fn test_insert_and_size_accounting() {
        let mut tier = MemoryTier::new();
        assert!(tier.is_empty());

        tier.insert(key("a"), entry("a", 100));
        assert_eq!(tier.len(), 1);
        // payload + JSON quotes
        assert_eq!(tier.total_bytes(), 102);

        tier.remove(&key("a"));
        assert!(tier.is_empty());
        assert_eq!(tier.total_bytes(), 0);
    }

    #[test]
    fn test_replace_keeps_one_entry_per_key() {
        let mut tier = MemoryTier::new();

        tier.insert(key("a"), entry("a", 100));
        tier.insert(key("a"), entry("a", 300));

        assert_eq!(tier.len(), 1);
        assert_eq!(tier.total_bytes(), 302);
    }

    #[test]
    fn test_enforce_limit_evicts_lru_first() {
        let mut tier = MemoryTier::new();

        // Insert in order a, b, c; access order leaves `a` the oldest
        tier.insert(key("a"), entry("a", 398));
        std::thread::sleep(std::time::Duration::from_millis(5));
        tier.insert(key("b"), entry("b", 398));
        std::thread::sleep(std::time::Duration::from_millis(5));
        tier.insert(key("c"), entry("c", 398));

        // 1200 resident bytes against a 1000-byte budget forces one eviction
        let evicted = tier.enforce_limit(1000);

        assert_eq!(evicted, 1);
        assert!(!tier.contains(&key("a")));
        assert!(tier.contains(&key("b")));
        assert!(tier.contains(&key("c")));
        assert!(tier.total_bytes() <= 1000);
    }

    #[test]
    fn test_access_protects_from_eviction() {
        let mut tier = MemoryTier::new();

        tier.insert(key("a"), entry("a", 398));
        std::thread::sleep(std::time::Duration::from_millis(5));
        tier.insert(key("b"), entry("b", 398));
        std::thread::sleep(std::time::Duration::from_millis(5));

        // Touching `a` makes `b` the LRU victim
        tier.get_mut(&key("a")).unwrap().touch();
        tier.insert(key("c"), entry("c", 398));
        tier.enforce_limit(1000);

        assert!(tier.contains(&key("a")));
        assert!(!tier.contains(&key("b")));
        assert!(tier.contains(&key("c")));
    }

    #[test]
    fn test_enforce_limit_noop_under_budget() {
        let mut tier = MemoryTier::new();
        tier.insert(key("a"), entry("a", 10));

        assert_eq!(tier.enforce_limit(1_000_000), 0);
        assert_eq!(tier.len(), 1);
    }

    #[test]
    fn test_capacity_invariant_after_many_inserts() {
        let mut tier = MemoryTier::new();

        for i in 0..50 {
            tier.insert(key(&format!("subject-{i}")), entry("s", 100));
            tier.enforce_limit(1000);
            assert!(tier.total_bytes() <= 1000);
        }
    }

    #[test]
    fn test_purge_expired() {
        let mut tier = MemoryTier::new();
        let policy = TtlPolicy::new(std::time::Duration::from_millis(10));

        tier.insert(key("a"), entry("a", 10));
        std::thread::sleep(std::time::Duration::from_millis(30));
        tier.insert(key("b"), entry("b", 10));

        let purged = tier.purge_expired(&policy);

        assert_eq!(purged, 1);
        assert!(!tier.contains(&key("a")));
        assert!(tier.contains(&key("b")));
    }

    #[test]
    fn test_remove_matching_by_subject() {
        let mut tier = MemoryTier::new();
        tier.insert(key("a"), entry("https://a.example", 10));
        tier.insert(key("b"), entry("https://b.example", 10));

        let removed = tier.remove_matching(Some("https://a.example"), None);

        assert_eq!(removed, 1);
        assert_eq!(tier.len(), 1);
        assert!(tier.contains(&key("b")));
    }

    #[test]
    fn test_remove_matching_requires_both_filters_to_match() {
        let mut tier = MemoryTier::new();
        tier.insert(key("a"), entry("https://a.example", 10));

        let removed = tier.remove_matching(Some("https://a.example"), Some("llm_analysis"));
        assert_eq!(removed, 0);
        assert_eq!(tier.len(), 1);
    }

    #[test]
    fn test_clear() {
        let mut tier = MemoryTier::new();
        tier.insert(key("a"), entry("a", 10));
        tier.insert(key("b"), entry("b", 10));

        assert_eq!(tier.clear(), 2);
        assert!(tier.is_empty());
        assert_eq!(tier.total_bytes(), 0);
    }
}
