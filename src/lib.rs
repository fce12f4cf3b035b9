//! stratacache - Intelligent Multi-Tier Result Cache
//!
//! A single-process cache for expensive analysis results: bounded memory
//! with LRU eviction, compressed per-key disk overflow, content-derived
//! keys, TTL-based staleness, and usage analytics.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      ResultCache<T>                              │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  MemoryTier (RAM)             │  DiskTier (local files)         │
//! │  ┌─────────────────────────┐  │  ┌───────────────────────────┐  │
//! │  │ key → CacheEntry<T>     │  │  │ <key>.cache (LZ4)         │  │
//! │  │ LRU, byte-budgeted      │  │  │ mtime-ordered cleanup     │  │
//! │  └─────────────────────────┘  │  └───────────────────────────┘  │
//! │        │ promote on disk hit  │        ▲ background writer      │
//! │        └──────────────────────┴────────┘                        │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Lookups check memory first, then disk; disk hits are promoted back into
//! memory. Stores land in memory synchronously and reach disk through a
//! bounded background queue, so callers never wait on the filesystem.
//! Expired and corrupt entries self-heal into misses.
//!
//! # Example
//!
//! ```no_run
//! use stratacache::{CacheConfig, Params, ResultCache};
//!
//! # fn main() -> stratacache::Result<()> {
//! let cache: ResultCache<String> = ResultCache::new(CacheConfig::default())?;
//!
//! cache.set("basic_seo", "https://example.com", Params::new(), "report".to_string())?;
//! assert!(cache.get("basic_seo", "https://example.com", &Params::new())?.is_some());
//! # Ok(())
//! # }
//! ```
//!
//! # Modules
//!
//! - [`cache`] - Orchestrator composing the tiers behind `get`/`set`
//! - [`compression`] - LZ4 record compression with raw fallback
//! - [`disk`] - Persistent per-key file store
//! - [`entry`] - Cached value plus bookkeeping metadata
//! - [`error`] - Error types
//! - [`key`] - Deterministic cache key derivation
//! - [`memory`] - Bounded LRU memory tier
//! - [`policy`] - Request-kind → TTL table
//! - [`shared`] - Process-wide shared instance
//! - [`stats`] - Usage counters and snapshots

pub mod cache;
pub mod compression;
pub mod disk;
pub mod entry;
pub mod error;
pub mod key;
pub mod memory;
pub mod policy;
pub mod shared;
pub mod stats;

mod writer;

// Re-export commonly used types
pub use cache::{CacheConfig, ResultCache, WarmPlan, WarmTarget};
pub use compression::{CompressionAlgorithm, CompressionConfig, Compressor, RecordCodec};
pub use disk::DiskTier;
pub use entry::{CacheEntry, EntryMetadata, EntryTags};
pub use error::{Error, Result};
pub use key::{CacheKey, ParamValue, Params, SCHEMA_VERSION};
pub use memory::MemoryTier;
pub use policy::TtlPolicy;
pub use stats::{CacheStats, StatsSnapshot, TierUsage};
