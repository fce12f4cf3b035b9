//! Cache Entry Types
//!
//! A cached payload plus the bookkeeping the tiers need: creation and access
//! timestamps, access count, an estimated serialized size, and the tags used
//! for selective invalidation and statistics.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::key::Params;

/// Caller-derived tags attached to every entry.
///
/// Recorded at `set` time and matched against by selective invalidation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntryTags {
    /// Subject identifier exactly as the caller supplied it
    pub subject: String,
    /// Request-kind tag (also drives TTL lookup)
    pub kind: String,
    /// Parameter set the payload was computed with
    pub params: Params,
    /// Wall-clock caption for display in reports and statistics
    pub cached_at: DateTime<Utc>,
}

impl EntryTags {
    /// Build tags for a freshly computed result
    pub fn new(kind: impl Into<String>, subject: impl Into<String>, params: Params) -> Self {
        Self {
            subject: subject.into(),
            kind: kind.into(),
            params,
            cached_at: Utc::now(),
        }
    }
}

/// Bookkeeping metadata carried alongside every payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntryMetadata {
    created_at: DateTime<Utc>,
    last_access: DateTime<Utc>,
    access_count: u64,
    size_bytes: u64,
    tags: EntryTags,
}

impl EntryMetadata {
    fn new(size_bytes: u64, tags: EntryTags) -> Self {
        let now = Utc::now();
        Self {
            created_at: now,
            last_access: now,
            access_count: 0,
            size_bytes,
            tags,
        }
    }

    /// Creation time, set once at construction
    #[inline]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Time of the most recent successful read
    #[inline]
    pub fn last_access(&self) -> DateTime<Utc> {
        self.last_access
    }

    /// Number of successful reads
    #[inline]
    pub fn access_count(&self) -> u64 {
        self.access_count
    }

    /// Estimated serialized size in bytes
    #[inline]
    pub fn size_bytes(&self) -> u64 {
        self.size_bytes
    }

    /// Entry tags
    #[inline]
    pub fn tags(&self) -> &EntryTags {
        &self.tags
    }

    /// Record a successful read for LRU tracking
    pub fn touch(&mut self) {
        self.access_count += 1;
        self.last_access = Utc::now();
    }

    /// True once the entry's age exceeds `ttl`
    pub fn is_expired(&self, ttl: Duration) -> bool {
        let age = Utc::now().signed_duration_since(self.created_at);
        match age.to_std() {
            Ok(age) => age > ttl,
            // Clock skew put created_at in the future; treat as fresh
            Err(_) => false,
        }
    }
}

/// One cached value plus its bookkeeping metadata.
///
/// Generic over the payload: the cache never inspects it, it only requires
/// serde support so entries can round-trip through the disk tier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry<T> {
    payload: T,
    metadata: EntryMetadata,
}

impl<T: Serialize> CacheEntry<T> {
    /// Wrap a freshly computed payload with new metadata
    pub fn new(payload: T, tags: EntryTags) -> Self {
        let size_bytes = estimate_size(&payload);
        Self {
            payload,
            metadata: EntryMetadata::new(size_bytes, tags),
        }
    }
}

impl<T> CacheEntry<T> {
    /// Borrow the cached payload
    #[inline]
    pub fn payload(&self) -> &T {
        &self.payload
    }

    /// Consume the entry, returning the payload
    pub fn into_payload(self) -> T {
        self.payload
    }

    /// Borrow the metadata
    #[inline]
    pub fn metadata(&self) -> &EntryMetadata {
        &self.metadata
    }

    /// Estimated serialized size in bytes
    #[inline]
    pub fn size_bytes(&self) -> u64 {
        self.metadata.size_bytes
    }

    /// Record a successful read
    pub fn touch(&mut self) {
        self.metadata.touch();
    }

    /// True once the entry's age exceeds `ttl`
    pub fn is_expired(&self, ttl: Duration) -> bool {
        self.metadata.is_expired(ttl)
    }
}

impl<T: Serialize + DeserializeOwned> CacheEntry<T> {
    /// Encode the entry for disk storage
    pub fn encode(&self) -> crate::error::Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(crate::error::Error::EntryEncode)
    }

    /// Decode an entry previously produced by [`CacheEntry::encode`]
    pub fn decode(bytes: &[u8]) -> crate::error::Result<Self> {
        serde_json::from_slice(bytes).map_err(crate::error::Error::EntryDecode)
    }
}

/// Best-effort size estimate of the serialized payload.
///
/// Falls back to a coarse in-memory figure if serialization fails; the
/// estimate only has to be good enough for byte budgeting.
fn estimate_size<T: Serialize>(payload: &T) -> u64 {
    match serde_json::to_vec(payload) {
        Ok(bytes) => bytes.len() as u64,
        Err(_) => std::mem::size_of::<T>() as u64,
    }
}

// =============================================================================
// Tests
// =============================================================================
