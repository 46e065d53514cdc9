//! Eviction Module
//!
//! Expiry sweeps and size-bounded random eviction over a backend.
//!
//! Both passes assume the caller holds the store's lock for their whole
//! duration; they talk to the backend directly.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, warn};

use crate::backend::Backend;
use crate::cache::entry::{current_timestamp_ms, CacheEntry};
use crate::cache::space::used_bytes;
use crate::error::Result;

// == Prune Report ==
/// Outcome of a prune pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PruneReport {
    /// True when another prune was already running and this one did nothing
    pub skipped: bool,
    /// Expired entries removed by the leading cleanup sweep
    pub expired: usize,
    /// Live entries removed by random eviction
    pub evicted: usize,
    /// Byte ceiling the pass aimed for
    pub target_size: u64,
    /// Used bytes when the pass finished
    pub used_bytes: u64,
    /// Wall-clock duration of the pass in milliseconds
    pub elapsed_ms: u64,
}

impl PruneReport {
    pub fn skipped(target_size: u64) -> Self {
        Self {
            skipped: true,
            target_size,
            ..Self::default()
        }
    }

    pub fn reached_target(&self) -> bool {
        !self.skipped && self.used_bytes <= self.target_size
    }
}

// == Prune Guard ==
/// Marks a prune as in flight on one store; the mark is cleared on drop.
#[derive(Debug)]
pub struct PruneGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> PruneGuard<'a> {
    /// Claims the flag, or returns None if a prune is already running.
    pub fn try_acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for PruneGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

// == Cleanup ==
/// Deletes every entry expired as of `now`.
///
/// Scans all keys; payloads that fail to decode are logged and left alone.
/// Returns the number of entries removed.
pub fn cleanup(backend: &dyn Backend, now: u64) -> Result<usize> {
    let mut removed = 0;

    for key in backend.keys()? {
        let Some(payload) = backend.get(&key)? else {
            continue;
        };

        match CacheEntry::decode(&payload) {
            Ok(entry) if entry.is_expired_at(now) => {
                if backend.delete(&key)?.is_some() {
                    removed += 1;
                }
            }
            Ok(_) => {}
            Err(e) => warn!(key = %key, error = %e, "skipping undecodable entry during cleanup"),
        }
    }

    Ok(removed)
}

// == Prune ==
/// Reclaims space until used bytes drop to `target_size`.
///
/// Runs a cleanup sweep first, then deletes randomly sampled entries one
/// at a time. After each deletion the pass stops once the target is met or
/// `max_time` has elapsed; it also stops when the image runs empty.
/// Falling short of the target is not an error.
pub fn prune(
    backend: &dyn Backend,
    target_size: u64,
    max_time: Option<Duration>,
) -> Result<PruneReport> {
    let start = Instant::now();
    let expired = cleanup(backend, current_timestamp_ms())?;
    let mut evicted = 0;

    loop {
        let Some((key, _)) = backend.random_pair()? else {
            debug!("image empty, nothing left to evict");
            break;
        };

        if backend.delete(&key)?.is_some() {
            evicted += 1;
        }

        if used_bytes(backend)? <= target_size {
            break;
        }
        if max_time.is_some_and(|max| start.elapsed() > max) {
            debug!(evicted, "prune time budget exhausted");
            break;
        }
    }

    Ok(PruneReport {
        skipped: false,
        expired,
        evicted,
        target_size,
        used_bytes: used_bytes(backend)?,
        elapsed_ms: start.elapsed().as_millis() as u64,
    })
}
