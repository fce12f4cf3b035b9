//! Background Disk Writer
//!
//! Persists entries to the disk tier from a dedicated thread so filesystem
//! latency never extends the orchestrator's critical section. The queue is
//! bounded: when it fills, the disk copy is dropped with a warning and the
//! memory tier stays authoritative for the rest of the process lifetime.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use bytes::Bytes;
use crossbeam::channel::{bounded, Sender, TrySendError};
use tracing::{debug, warn};

use crate::disk::DiskTier;
use crate::key::CacheKey;
use crate::stats::CacheStats;

/// Work items accepted by the writer thread
pub(crate) enum DiskJob {
    /// Persist an encoded entry record
    Write { key: CacheKey, record: Bytes },
    /// Delete every record file (full flush); queued so it serializes
    /// behind writes already in flight
    RemoveAll,
    /// Ack once every job queued before this one has been processed
    Barrier(Sender<()>),
}

/// Handle to the writer thread; dropping it drains the queue and joins
pub(crate) struct DiskWriter {
    tx: Option<Sender<DiskJob>>,
    handle: Option<JoinHandle<()>>,
    stats: Arc<CacheStats>,
}

impl DiskWriter {
    pub(crate) fn spawn(
        disk: Arc<DiskTier>,
        disk_limit_bytes: u64,
        stats: Arc<CacheStats>,
        queue_depth: usize,
    ) -> std::io::Result<Self> {
        let (tx, rx) = bounded::<DiskJob>(queue_depth);

        let worker_stats = Arc::clone(&stats);
        let handle = thread::Builder::new()
            .name("cache-disk-writer".into())
            .spawn(move || {
                for job in rx {
                    match job {
                        DiskJob::Write { key, record } => match disk.write(&key, &record) {
                            Ok(_) => {
                                worker_stats.record_disk_write();
                                // Opportunistic size bound after every write
                                disk.cleanup(disk_limit_bytes);
                            }
                            Err(e) => {
                                warn!(%key, error = %e, "disk write failed, entry stays memory-only");
                            }
                        },
                        DiskJob::RemoveAll => {
                            disk.remove_all();
                        }
                        DiskJob::Barrier(ack) => {
                            let _ = ack.send(());
                        }
                    }
                }
                debug!("disk writer stopped");
            })?;

        Ok(Self {
            tx: Some(tx),
            handle: Some(handle),
            stats,
        })
    }

    /// Queue a job without blocking; a full queue drops the job
    pub(crate) fn submit(&self, job: DiskJob) {
        let Some(tx) = &self.tx else { return };
        match tx.try_send(job) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                self.stats.record_dropped_disk_write();
                warn!("disk write queue full, dropping write");
            }
            Err(TrySendError::Disconnected(_)) => {
                warn!("disk writer gone, dropping write");
            }
        }
    }

    /// Queue a job that must not be dropped (full flush), blocking if the
    /// queue is momentarily full
    pub(crate) fn submit_must(&self, job: DiskJob) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(job);
        }
    }

    /// Block until every previously queued job has been processed
    pub(crate) fn flush(&self) {
        let (ack_tx, ack_rx) = bounded(1);
        self.submit_must(DiskJob::Barrier(ack_tx));
        let _ = ack_rx.recv();
    }
}

impl Drop for DiskWriter {
    fn drop(&mut self) {
        // Closing the channel lets the worker drain remaining jobs and exit
        self.tx.take();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
