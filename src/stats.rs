//! Cache Usage Analytics
//!
//! Monotonic operation counters shared across the orchestrator and the
//! background disk writer, plus a point-in-time snapshot type.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Monotonically increasing operation counters
#[derive(Debug)]
pub struct CacheStats {
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    disk_reads: AtomicU64,
    disk_writes: AtomicU64,
    dropped_disk_writes: AtomicU64,
    started: Instant,
}

impl Default for CacheStats {
    fn default() -> Self {
        Self {
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
            disk_reads: AtomicU64::new(0),
            disk_writes: AtomicU64::new(0),
            dropped_disk_writes: AtomicU64::new(0),
            started: Instant::now(),
        }
    }
}

impl CacheStats {
    /// Create a collector with all counters at zero
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_evictions(&self, count: usize) {
        self.evictions.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn record_disk_read(&self) {
        self.disk_reads.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_disk_write(&self) {
        self.disk_writes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dropped_disk_write(&self) {
        self.dropped_disk_writes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    /// Fraction of lookups that hit, in `[0.0, 1.0]`
    pub fn hit_rate(&self) -> f64 {
        let hits = self.hits() as f64;
        let total = hits + self.misses() as f64;
        if total == 0.0 {
            0.0
        } else {
            hits / total
        }
    }

    /// Build a snapshot, folding in the tier figures the counters cannot
    /// know on their own
    pub fn snapshot(&self, usage: TierUsage) -> StatsSnapshot {
        let memory_utilization_percent = if usage.memory_limit_bytes == 0 {
            0.0
        } else {
            usage.memory_bytes as f64 / usage.memory_limit_bytes as f64 * 100.0
        };

        StatsSnapshot {
            hits: self.hits(),
            misses: self.misses(),
            evictions: self.evictions.load(Ordering::Relaxed),
            disk_reads: self.disk_reads.load(Ordering::Relaxed),
            disk_writes: self.disk_writes.load(Ordering::Relaxed),
            dropped_disk_writes: self.dropped_disk_writes.load(Ordering::Relaxed),
            hit_rate: self.hit_rate(),
            entries: usage.entries,
            memory_bytes: usage.memory_bytes,
            memory_limit_bytes: usage.memory_limit_bytes,
            memory_utilization_percent,
            disk_bytes: usage.disk_bytes,
            disk_limit_bytes: usage.disk_limit_bytes,
            uptime: self.started.elapsed(),
        }
    }
}

/// Tier occupancy figures sampled at snapshot time
#[derive(Debug, Clone, Copy, Default)]
pub struct TierUsage {
    /// Resident memory entries
    pub entries: usize,
    /// Resident memory bytes
    pub memory_bytes: u64,
    /// Configured memory budget
    pub memory_limit_bytes: u64,
    /// Bytes currently on disk
    pub disk_bytes: u64,
    /// Configured disk budget
    pub disk_limit_bytes: u64,
}

/// Point-in-time view of cache health; reading it has no side effects
#[derive(Debug, Clone)]
pub struct StatsSnapshot {
    /// Lookups answered from either tier
    pub hits: u64,
    /// Lookups answered by neither tier
    pub misses: u64,
    /// Memory entries evicted to satisfy the byte budget
    pub evictions: u64,
    /// Disk records promoted into memory
    pub disk_reads: u64,
    /// Records persisted by the background writer
    pub disk_writes: u64,
    /// Disk writes dropped because the writer queue was full
    pub dropped_disk_writes: u64,
    /// hits / (hits + misses)
    pub hit_rate: f64,
    /// Resident memory entries
    pub entries: usize,
    /// Resident memory bytes
    pub memory_bytes: u64,
    /// Configured memory budget
    pub memory_limit_bytes: u64,
    /// Memory occupancy as a percentage of the budget
    pub memory_utilization_percent: f64,
    /// Bytes currently on disk
    pub disk_bytes: u64,
    /// Configured disk budget
    pub disk_limit_bytes: u64,
    /// Time since the cache was constructed
    pub uptime: Duration,
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_start_at_zero() {
        let stats = CacheStats::new();
        assert_eq!(stats.hits(), 0);
        assert_eq!(stats.misses(), 0);
        assert_eq!(stats.hit_rate(), 0.0);
    }

    #[test]
    fn test_hit_rate() {
        let stats = CacheStats::new();

        stats.record_hit();
        stats.record_hit();
        stats.record_miss();

        assert_eq!(stats.hits(), 2);
        assert_eq!(stats.misses(), 1);
        assert!((stats.hit_rate() - 2.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_snapshot_folds_in_usage() {
        let stats = CacheStats::new();
        stats.record_hit();
        stats.record_disk_read();
        stats.record_disk_write();
        stats.record_evictions(3);

        let snapshot = stats.snapshot(TierUsage {
            entries: 4,
            memory_bytes: 250,
            memory_limit_bytes: 1000,
            disk_bytes: 2048,
            disk_limit_bytes: 4096,
        });

        assert_eq!(snapshot.hits, 1);
        assert_eq!(snapshot.evictions, 3);
        assert_eq!(snapshot.disk_reads, 1);
        assert_eq!(snapshot.disk_writes, 1);
        assert_eq!(snapshot.entries, 4);
        assert!((snapshot.memory_utilization_percent - 25.0).abs() < 1e-9);
    }

    #[test]
    fn test_snapshot_with_zero_limit() {
        let stats = CacheStats::new();
        let snapshot = stats.snapshot(TierUsage::default());
        assert_eq!(snapshot.memory_utilization_percent, 0.0);
    }

    #[test]
    fn test_uptime_advances() {
        let stats = CacheStats::new();
        std::thread::sleep(Duration::from_millis(10));
        let snapshot = stats.snapshot(TierUsage::default());
        assert!(snapshot.uptime >= Duration::from_millis(10));
    }
}
