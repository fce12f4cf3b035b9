//! Cache Orchestrator
//!
//! Composes the key codec, memory tier, disk tier, and TTL policy into the
//! public `get` / `set` / `invalidate` / `stats` / `warm` operations.
//!
//! # Locking
//!
//! One mutex guards the memory tier; it is held only for map mutation. Entry
//! encoding and every disk write happen outside the critical section: disk
//! writes run on a dedicated background thread, disk reads synchronously on
//! the miss path (promotion must complete before `get` returns).

use std::path::PathBuf;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam::channel::{bounded, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info, warn};

use bytes::Bytes;

use crate::compression::{CompressionConfig, RecordCodec};
use crate::disk::DiskTier;
use crate::entry::{CacheEntry, EntryTags};
use crate::error::Result;
use crate::key::{CacheKey, Params};
use crate::memory::MemoryTier;
use crate::policy::TtlPolicy;
use crate::stats::{CacheStats, StatsSnapshot, TierUsage};
use crate::writer::{DiskJob, DiskWriter};

/// Default memory budget (100 MiB)
pub const DEFAULT_MEMORY_LIMIT: u64 = 100 * 1024 * 1024;

/// Default disk budget (500 MiB)
pub const DEFAULT_DISK_LIMIT: u64 = 500 * 1024 * 1024;

/// Default bound on queued background disk writes
pub const DEFAULT_WRITE_QUEUE_DEPTH: usize = 128;

/// Constructor-time cache configuration; not mutable at runtime
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Memory tier byte budget
    pub memory_limit_bytes: u64,
    /// Disk tier byte budget (best-effort, enforced by cleanup passes)
    pub disk_limit_bytes: u64,
    /// Directory for the disk tier, created if absent
    pub cache_dir: PathBuf,
    /// Request-kind → TTL table
    pub ttl: TtlPolicy,
    /// Disk record compression settings
    pub compression: CompressionConfig,
    /// Bound on queued background disk writes; a full queue drops the
    /// disk copy rather than blocking the caller
    pub write_queue_depth: usize,
    /// Interval for the optional expired-entry sweeper; `None` (the
    /// default) leaves expiry purely lazy
    pub sweep_interval: Option<Duration>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            memory_limit_bytes: DEFAULT_MEMORY_LIMIT,
            disk_limit_bytes: DEFAULT_DISK_LIMIT,
            cache_dir: PathBuf::from(".stratacache"),
            ttl: TtlPolicy::default(),
            compression: CompressionConfig::default(),
            write_queue_depth: DEFAULT_WRITE_QUEUE_DEPTH,
            sweep_interval: None,
        }
    }
}

/// A (subject, kind) pair the caller should compute and `set`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WarmTarget {
    /// Subject identifier
    pub subject: String,
    /// Request-kind tag
    pub kind: String,
}

/// Outcome of a warming pass: what is missing and what was already cached
#[derive(Debug, Clone, Default)]
pub struct WarmPlan {
    /// Pairs not currently cached, in probe order
    pub pending: Vec<WarmTarget>,
    /// Pairs skipped because a fresh entry already exists
    pub skipped: usize,
}

/// Intelligent multi-tier result cache.
///
/// Generic over the payload type; the cache never inspects payloads beyond
/// serde round-trips for sizing and disk storage.
pub struct ResultCache<T> {
    memory: Arc<Mutex<MemoryTier<T>>>,
    disk: Arc<DiskTier>,
    policy: TtlPolicy,
    stats: Arc<CacheStats>,
    writer: DiskWriter,
    _sweeper: Option<Sweeper>,
    config: CacheConfig,
}

impl<T> ResultCache<T>
where
    T: Serialize + DeserializeOwned + Clone + Send + 'static,
{
    /// Build a cache from configuration, creating the disk directory and
    /// spawning the background workers
    pub fn new(config: CacheConfig) -> Result<Self> {
        let codec = RecordCodec::with_config(config.compression.clone());
        let disk = Arc::new(DiskTier::open(&config.cache_dir, codec)?);
        let stats = Arc::new(CacheStats::new());
        let memory = Arc::new(Mutex::new(MemoryTier::new()));

        let writer = DiskWriter::spawn(
            Arc::clone(&disk),
            config.disk_limit_bytes,
            Arc::clone(&stats),
            config.write_queue_depth,
        )?;

        let sweeper = match config.sweep_interval {
            Some(interval) => Some(Sweeper::spawn(
                interval,
                Arc::clone(&memory),
                config.ttl.clone(),
            )?),
            None => None,
        };

        info!(
            memory_limit = config.memory_limit_bytes,
            disk_limit = config.disk_limit_bytes,
            dir = %config.cache_dir.display(),
            "result cache initialized"
        );

        Ok(Self {
            memory,
            disk,
            policy: config.ttl.clone(),
            stats,
            writer,
            _sweeper: sweeper,
            config,
        })
    }

    /// Fetch a previously computed result.
    ///
    /// Checks memory first, then disk; a disk hit is promoted back into the
    /// memory tier. Expired entries are purged on touch and reported as
    /// misses. The only error is a non-derivable key.
    pub fn get(&self, kind: &str, subject: &str, params: &Params) -> Result<Option<T>> {
        let key = CacheKey::derive(kind, subject, params)?;
        let ttl = self.policy.ttl_for(kind);

        {
            let mut memory = self.memory.lock();
            let mut expired = false;
            if let Some(entry) = memory.get_mut(&key) {
                if entry.is_expired(ttl) {
                    expired = true;
                } else {
                    entry.touch();
                    self.stats.record_hit();
                    debug!(%key, "hit (memory)");
                    return Ok(Some(entry.payload().clone()));
                }
            }
            if expired {
                memory.remove(&key);
                debug!(%key, "memory entry expired");
            }
        }

        // Disk read runs outside the memory lock; promotion re-acquires it
        if let Some(record) = self.disk.read(&key) {
            match CacheEntry::<T>::decode(&record) {
                Ok(mut entry) => {
                    if entry.is_expired(ttl) {
                        debug!(%key, "disk entry expired");
                    } else {
                        entry.touch();
                        self.stats.record_hit();
                        self.stats.record_disk_read();
                        debug!(%key, "hit (disk, promoted)");

                        let payload = entry.payload().clone();
                        let mut memory = self.memory.lock();
                        memory.insert(key, entry);
                        let evicted = memory.enforce_limit(self.config.memory_limit_bytes);
                        self.stats.record_evictions(evicted);
                        return Ok(Some(payload));
                    }
                }
                Err(e) => {
                    warn!(%key, error = %e, "undecodable disk entry, removing");
                    self.disk.remove(&key);
                }
            }
        }

        self.stats.record_miss();
        debug!(%key, "miss");
        Ok(None)
    }

    /// Store a freshly computed result.
    ///
    /// Succeeds once the memory insert lands; the disk copy is queued for
    /// the background writer and any disk-side failure degrades the entry
    /// to memory-only.
    pub fn set(&self, kind: &str, subject: &str, params: Params, payload: T) -> Result<()> {
        let key = CacheKey::derive(kind, subject, &params)?;
        let entry = CacheEntry::new(payload, EntryTags::new(kind, subject, params));

        // Encode outside the lock so slow payloads never extend it
        let record = match entry.encode() {
            Ok(bytes) => Some(Bytes::from(bytes)),
            Err(e) => {
                warn!(%key, error = %e, "entry not persistable, keeping memory-only");
                None
            }
        };

        {
            let mut memory = self.memory.lock();
            memory.insert(key.clone(), entry);
            let evicted = memory.enforce_limit(self.config.memory_limit_bytes);
            self.stats.record_evictions(evicted);
        }
        debug!(%key, "set");

        if let Some(record) = record {
            self.writer.submit(DiskJob::Write { key, record });
        }
        Ok(())
    }

    /// Remove entries matching the supplied filters; a `None` filter matches
    /// everything for that dimension.
    ///
    /// With both filters `None` this is a full flush: memory is cleared and
    /// every disk record is deleted (queued behind in-flight writes).
    /// Selective invalidation is memory-exact but leaves disk records to be
    /// re-validated by TTL or reclaimed by cleanup.
    ///
    /// Returns the number of memory entries removed.
    pub fn invalidate(&self, subject: Option<&str>, kind: Option<&str>) -> usize {
        let full_flush = subject.is_none() && kind.is_none();

        let removed = {
            let mut memory = self.memory.lock();
            if full_flush {
                memory.clear()
            } else {
                memory.remove_matching(subject, kind)
            }
        };

        if full_flush {
            self.writer.submit_must(DiskJob::RemoveAll);
        }

        info!(removed, full_flush, "cache invalidated");
        removed
    }

    /// Point-in-time usage statistics; no side effects
    pub fn stats(&self) -> StatsSnapshot {
        let (entries, memory_bytes) = {
            let memory = self.memory.lock();
            (memory.len(), memory.total_bytes())
        };

        self.stats.snapshot(TierUsage {
            entries,
            memory_bytes,
            memory_limit_bytes: self.config.memory_limit_bytes,
            disk_bytes: self.disk.total_bytes(),
            disk_limit_bytes: self.config.disk_limit_bytes,
        })
    }

    /// Probe every (subject, kind) pair and report the ones that need
    /// population.
    ///
    /// The cache cannot compute payloads from a subject alone, so warming is
    /// a scheduling hook: the caller computes each pending pair and stores
    /// it via [`ResultCache::set`]. An empty `kinds` slice means every kind
    /// registered in the TTL policy.
    pub fn warm(&self, subjects: &[&str], kinds: &[&str]) -> Result<WarmPlan> {
        let kinds: Vec<String> = if kinds.is_empty() {
            self.policy.kinds().map(String::from).collect()
        } else {
            kinds.iter().map(|k| k.to_string()).collect()
        };

        let mut plan = WarmPlan::default();
        let params = Params::new();

        for subject in subjects {
            for kind in &kinds {
                if self.get(kind, subject, &params)?.is_some() {
                    plan.skipped += 1;
                } else {
                    plan.pending.push(WarmTarget {
                        subject: subject.to_string(),
                        kind: kind.clone(),
                    });
                }
            }
        }

        info!(
            pending = plan.pending.len(),
            skipped = plan.skipped,
            "warming pass complete"
        );
        Ok(plan)
    }

    /// Block until every queued disk write has been processed.
    ///
    /// Useful before shutdown and in tests; normal operation never needs it.
    pub fn flush(&self) {
        self.writer.flush();
    }

    /// Get configuration
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }
}

// =============================================================================
// Expired-Entry Sweeper
// =============================================================================

/// Optional background sweep of expired memory entries.
///
/// Purely a footprint optimization: expiry is checked on every access, so
/// correctness never depends on this thread running.
struct Sweeper {
    tx: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl Sweeper {
    fn spawn<T: Send + 'static>(
        interval: Duration,
        memory: Arc<Mutex<MemoryTier<T>>>,
        policy: TtlPolicy,
    ) -> std::io::Result<Self> {
        let (tx, rx) = bounded::<()>(0);

        let handle = thread::Builder::new()
            .name("cache-sweeper".into())
            .spawn(move || loop {
                match rx.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => {
                        let purged = memory.lock().purge_expired(&policy);
                        if purged > 0 {
                            debug!(purged, "swept expired entries");
                        }
                    }
                    // Shutdown signal or cache dropped
                    _ => break,
                }
            })?;

        Ok(Self {
            tx: Some(tx),
            handle: Some(handle),
        })
    }
}

impl Drop for Sweeper {
    fn drop(&mut self) {
        self.tx.take();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
