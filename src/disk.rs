//! Disk Tier - Persistent Overflow Store
//!
//! One framed, compressed file per key under the configured directory, used
//! for durability beyond process lifetime and as overflow for memory
//! evictions.
//!
//! # Design
//!
//! - Writes land in a temp file first and are renamed into place
//! - Every failure on the read path is self-healing: a corrupt or truncated
//!   file is deleted and reported as a miss, never as an error
//! - `cleanup` is a best-effort size bound: oldest files (by modification
//!   time) go first, and concurrent writers may transiently exceed the limit

use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use bytes::Bytes;
use tracing::{debug, warn};

use crate::compression::RecordCodec;
use crate::error::Result;
use crate::key::CacheKey;

/// Extension shared by every record file
const FILE_EXTENSION: &str = "cache";

/// Persistent per-key file store with opportunistic size-bounded cleanup.
///
/// Works at the byte level: callers hand it encoded entry records and get
/// encoded records back. Payload typing stays in the orchestrator.
pub struct DiskTier {
    dir: PathBuf,
    codec: RecordCodec,
}

impl DiskTier {
    /// Open (and create if absent) the tier's directory
    pub fn open(dir: impl Into<PathBuf>, codec: RecordCodec) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir, codec })
    }

    /// Directory holding the record files
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &CacheKey) -> PathBuf {
        self.dir.join(key.file_name())
    }

    /// Write a record, replacing any previous one for the key.
    ///
    /// Returns the number of bytes that landed on disk. Errors are reported
    /// to the caller (the background writer), which logs and swallows them:
    /// a disk write failure must never fail the `set` that triggered it.
    pub fn write(&self, key: &CacheKey, record: &[u8]) -> Result<u64> {
        let framed = self.codec.encode(record);

        // Temp file + rename keeps half-written records from ever being
        // visible under the final name
        let path = self.path_for(key);
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, &framed)?;
        fs::rename(&tmp, &path)?;

        debug!(%key, bytes = framed.len(), "disk write");
        Ok(framed.len() as u64)
    }

    /// Read a record back, or `None` when the key is absent.
    ///
    /// Any corruption (bad header, failed decompression) deletes the file
    /// and reports a miss.
    pub fn read(&self, key: &CacheKey) -> Option<Bytes> {
        let path = self.path_for(key);
        if !path.exists() {
            return None;
        }

        let decoded = fs::read(&path)
            .map_err(crate::error::Error::from)
            .and_then(|framed| self.codec.decode(&framed));

        match decoded {
            Ok(record) => Some(record),
            Err(e) => {
                warn!(%key, error = %e, "unreadable cache file, removing");
                let _ = fs::remove_file(&path);
                None
            }
        }
    }

    /// Delete one record; true if a file was removed
    pub fn remove(&self, key: &CacheKey) -> bool {
        fs::remove_file(self.path_for(key)).is_ok()
    }

    /// Delete every record file, returning how many were removed
    pub fn remove_all(&self) -> usize {
        let mut removed = 0;
        for (path, _, _) in self.record_files() {
            if fs::remove_file(&path).is_ok() {
                removed += 1;
            }
        }
        debug!(removed, "disk tier flushed");
        removed
    }

    /// Sum of record file sizes in bytes
    pub fn total_bytes(&self) -> u64 {
        self.record_files().iter().map(|(_, len, _)| len).sum()
    }

    /// Delete oldest records (by modification time) until total file bytes
    /// fit under `limit_bytes`. Best-effort: failures are logged and the
    /// pass moves on.
    pub fn cleanup(&self, limit_bytes: u64) -> usize {
        let mut files = self.record_files();
        let mut total: u64 = files.iter().map(|(_, len, _)| len).sum();
        if total <= limit_bytes {
            return 0;
        }

        files.sort_by_key(|(_, _, modified)| *modified);

        let mut removed = 0;
        for (path, len, _) in files {
            if total <= limit_bytes {
                break;
            }
            match fs::remove_file(&path) {
                Ok(()) => {
                    total = total.saturating_sub(len);
                    removed += 1;
                    debug!(path = %path.display(), freed = len, "disk cleanup");
                }
                Err(e) => warn!(path = %path.display(), error = %e, "disk cleanup skip"),
            }
        }
        removed
    }

    /// Enumerate record files with their sizes and modification times.
    /// I/O problems shrink the listing rather than failing it.
    fn record_files(&self) -> Vec<(PathBuf, u64, SystemTime)> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(dir = %self.dir.display(), error = %e, "cannot list cache directory");
                return Vec::new();
            }
        };

        entries
            .flatten()
            .filter(|entry| {
                entry
                    .path()
                    .extension()
                    .map_or(false, |ext| ext == FILE_EXTENSION)
            })
            .filter_map(|entry| {
                let meta = entry.metadata().ok()?;
                let modified = meta.modified().ok()?;
                Some((entry.path(), meta.len(), modified))
            })
            .collect()
    }
}

// =============================================================================
// Tests
// =============================================================================
