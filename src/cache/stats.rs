//! Cache Statistics Module
//!
//! Tracks hits, misses, writes, expirations and evictions for a store, and
//! the point-in-time inspection report.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use crate::backend::ShmStatus;
use crate::cache::eviction::PruneReport;
use crate::config::StoreOptions;

// == Store Counters ==
/// Live counters updated by store operations.
#[derive(Debug, Default)]
pub(crate) struct StoreCounters {
    hits: AtomicU64,
    misses: AtomicU64,
    writes: AtomicU64,
    rejected_writes: AtomicU64,
    expirations: AtomicU64,
    evictions: AtomicU64,
    prunes: AtomicU64,
}

impl StoreCounters {
    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_write(&self) {
        self.writes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rejected_write(&self) {
        self.rejected_writes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_expirations(&self, count: usize) {
        self.expirations.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn record_prune(&self, report: &PruneReport) {
        self.prunes.fetch_add(1, Ordering::Relaxed);
        self.record_expirations(report.expired);
        self.evictions
            .fetch_add(report.evicted as u64, Ordering::Relaxed);
    }

    /// Combines the counters with the image's current size.
    pub fn snapshot(&self, entries: usize, status: ShmStatus) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            writes: self.writes.load(Ordering::Relaxed),
            rejected_writes: self.rejected_writes.load(Ordering::Relaxed),
            expirations: self.expirations.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            prunes: self.prunes.load(Ordering::Relaxed),
            entries,
            total_bytes: status.total_bytes,
            free_bytes: status.free_bytes,
            used_bytes: status.used_bytes(),
        }
    }
}

// == Cache Stats ==
/// Snapshot of a store's counters and space usage.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CacheStats {
    /// Reads that returned a live value
    pub hits: u64,
    /// Reads that found nothing, an expired entry, or an undecodable one
    pub misses: u64,
    /// Writes that reached the image
    pub writes: u64,
    /// Writes the image refused for lack of space
    pub rejected_writes: u64,
    /// Expired entries removed by cleanup sweeps
    pub expirations: u64,
    /// Live entries removed by random eviction
    pub evictions: u64,
    /// Prune passes run
    pub prunes: u64,
    /// Current number of entries in the image
    pub entries: usize,
    pub total_bytes: u64,
    pub free_bytes: u64,
    pub used_bytes: u64,
}

impl CacheStats {
    // == Hit Rate ==
    /// Calculates the cache hit rate.
    ///
    /// Returns hits / (hits + misses), or 0.0 if no reads have been made.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

// == Inspection ==
/// Read-only view of a store: entry count, space and active options.
#[derive(Debug, Clone, Serialize)]
pub struct Inspection {
    pub entries: usize,
    pub free_bytes: u64,
    pub total_bytes: u64,
    pub options: StoreOptions,
}

impl fmt::Display for Inspection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "#<CacheStore entries={}, free={}/{}, options={:?}>",
            self.entries, self.free_bytes, self.total_bytes, self.options
        )
    }
}
