//! Cache Store Module
//!
//! Cache facade over a backing image: expiry, reactive pruning, counters and
//! bulk deletion, with every image access serialized by one per-store lock.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::backend::{Backend, BackendError, SharedImage};
use crate::cache::entry::{current_timestamp_ms, CacheEntry};
use crate::cache::eviction::{self, PruneGuard, PruneReport};
use crate::cache::pattern::KeyPattern;
use crate::cache::space::{self, estimate_entry_cost, prune_target};
use crate::cache::stats::{CacheStats, Inspection, StoreCounters};
use crate::config::StoreOptions;
use crate::error::{CacheError, Result};

// == Cache Store ==
/// Fixed-capacity cache with expiry and random eviction.
pub struct CacheStore {
    /// Raw storage the entries live in
    backend: Arc<dyn Backend>,
    options: StoreOptions,
    /// Serializes every backend access made through this store
    lock: Mutex<()>,
    /// Set while a prune pass is running on this store
    pruning: AtomicBool,
    counters: StoreCounters,
}

fn integer_value(value: &Value) -> Option<i64> {
    match value {
        Value::Number(number) => number.as_i64(),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

impl CacheStore {
    // == Constructors ==
    /// Opens a store on the shared image at `options.image_path()`.
    ///
    /// Stores opened on the same path share their entries.
    pub fn open(options: StoreOptions) -> Self {
        let image = SharedImage::attach(options.image_path(), options.size_mb());
        info!(
            path = %image.path().display(),
            size_mb = options.size_mb(),
            "cache store opened"
        );
        Self::with_backend(image, options)
    }

    /// Creates a store over any backend.
    pub fn with_backend(backend: Arc<dyn Backend>, options: StoreOptions) -> Self {
        Self {
            backend,
            options,
            lock: Mutex::new(()),
            pruning: AtomicBool::new(false),
            counters: StoreCounters::default(),
        }
    }

    pub fn options(&self) -> &StoreOptions {
        &self.options
    }

    pub fn is_pruning(&self) -> bool {
        self.pruning.load(Ordering::Acquire)
    }

    // == Read ==
    /// Returns the value stored under `key` if present and not expired.
    ///
    /// Expired entries found here are deleted. Undecodable payloads are
    /// logged and reported as a miss.
    pub fn read(&self, key: &str) -> Result<Option<Value>> {
        let _guard = self.lock.lock();

        match self.read_entry_locked(key)? {
            Some(entry) => {
                self.counters.record_hit();
                Ok(Some(entry.value))
            }
            None => {
                self.counters.record_miss();
                Ok(None)
            }
        }
    }

    /// Whether a live entry exists under `key`.
    pub fn exist(&self, key: &str) -> Result<bool> {
        let _guard = self.lock.lock();
        Ok(self.read_entry_locked(key)?.is_some())
    }

    // == Fetch ==
    /// Reads `key`, computing and writing the value with `f` on a miss.
    ///
    /// `f` runs without the lock held.
    pub fn fetch<V, F>(&self, key: &str, ttl: Option<Duration>, f: F) -> Result<Value>
    where
        V: Serialize,
        F: FnOnce() -> V,
    {
        if let Some(value) = self.read(key)? {
            return Ok(value);
        }

        let value = to_value(f())?;
        self.write_entry(key, &self.new_entry(value.clone(), ttl))?;
        Ok(value)
    }

    // == Write ==
    /// Stores `value` under `key`, expiring after `ttl` (or the store's
    /// `expires_in` default).
    ///
    /// Prunes first when the write's estimated cost exceeds free space.
    /// Returns false when the image still has no room for it.
    pub fn write<V: Serialize>(&self, key: &str, value: V, ttl: Option<Duration>) -> Result<bool> {
        let entry = self.new_entry(to_value(value)?, ttl);
        self.write_entry(key, &entry)
    }

    /// Stores a prepared entry under `key`.
    pub fn write_entry(&self, key: &str, entry: &CacheEntry) -> Result<bool> {
        let payload = entry.encode()?;
        let _guard = self.lock.lock();
        self.write_payload_locked(key, &payload)
    }

    // == Delete ==
    /// Removes `key`, returning whether it was present.
    pub fn delete(&self, key: &str) -> Result<bool> {
        let _guard = self.lock.lock();
        Ok(self.backend.delete(key)?.is_some())
    }

    // == Clear ==
    /// Removes every entry from the image.
    pub fn clear(&self) -> Result<()> {
        let _guard = self.lock.lock();
        self.backend.clear()?;
        debug!("cache cleared");
        Ok(())
    }

    // == Counters ==
    /// Adds `amount` to the integer stored under `key`.
    ///
    /// Returns the new value, or None if the key is absent. Missing keys are
    /// not initialized. The entry keeps its expiration time. Fails with
    /// [`BackendError::OutOfSpace`] when the new value cannot be written back.
    pub fn increment(&self, key: &str, amount: i64) -> Result<Option<i64>> {
        self.modify_value(key, amount)
    }

    /// Subtracts `amount` from the integer stored under `key`.
    pub fn decrement(&self, key: &str, amount: i64) -> Result<Option<i64>> {
        self.modify_value(key, amount.saturating_neg())
    }

    fn modify_value(&self, key: &str, amount: i64) -> Result<Option<i64>> {
        let _guard = self.lock.lock();

        let Some(entry) = self.read_entry_locked(key)? else {
            return Ok(None);
        };
        let current =
            integer_value(&entry.value).ok_or_else(|| CacheError::NotAnInteger(key.to_string()))?;
        let updated = current.saturating_add(amount);

        // A rejected write-back leaves the old value in place and surfaces
        // as an out-of-space error, never as an absent key.
        let entry = CacheEntry::with_expires_at(Value::from(updated), entry.expires_at);
        self.store_payload_locked(key, &entry.encode()?)?;
        Ok(Some(updated))
    }

    // == Delete Matched ==
    /// Deletes every key matching `pattern`, returning how many went.
    pub fn delete_matched(&self, pattern: &KeyPattern) -> Result<usize> {
        let _guard = self.lock.lock();
        let matcher = pattern.matcher();

        let mut deleted = 0;
        for key in self.backend.keys()? {
            if matcher.matches(&key) && self.backend.delete(&key)?.is_some() {
                deleted += 1;
            }
        }

        debug!(%pattern, deleted, "deleted matching keys");
        Ok(deleted)
    }

    // == Cleanup ==
    /// Deletes every expired entry. Returns the number removed.
    pub fn cleanup(&self) -> Result<usize> {
        let _guard = self.lock.lock();
        let removed = eviction::cleanup(self.backend.as_ref(), current_timestamp_ms())?;
        self.counters.record_expirations(removed);
        Ok(removed)
    }

    // == Prune ==
    /// Reclaims space until used bytes drop to `target_size`, within
    /// `max_time` if given.
    ///
    /// Returns a skipped report without waiting if a prune is already
    /// running on this store.
    pub fn prune(&self, target_size: u64, max_time: Option<Duration>) -> Result<PruneReport> {
        if self.is_pruning() {
            debug!("prune already in progress, skipping");
            return Ok(PruneReport::skipped(target_size));
        }

        let _guard = self.lock.lock();
        self.prune_locked(target_size, max_time)
    }

    // == Space ==
    pub fn total_bytes(&self) -> Result<u64> {
        let _guard = self.lock.lock();
        space::total_bytes(self.backend.as_ref())
    }

    pub fn free_bytes(&self) -> Result<u64> {
        let _guard = self.lock.lock();
        space::free_bytes(self.backend.as_ref())
    }

    pub fn used_bytes(&self) -> Result<u64> {
        let _guard = self.lock.lock();
        space::used_bytes(self.backend.as_ref())
    }

    // == Stats ==
    /// Returns current counters and space usage.
    pub fn stats(&self) -> Result<CacheStats> {
        let _guard = self.lock.lock();
        let entries = self.backend.len()?;
        let status = self.backend.status()?;
        Ok(self.counters.snapshot(entries, status))
    }

    // == Inspect ==
    /// Entry count, space and active options.
    pub fn inspect(&self) -> Result<Inspection> {
        let _guard = self.lock.lock();
        let status = self.backend.status()?;
        Ok(Inspection {
            entries: self.backend.len()?,
            free_bytes: status.free_bytes,
            total_bytes: status.total_bytes,
            options: self.options.clone(),
        })
    }

    #[cfg(test)]
    pub(crate) fn hold_lock(&self) -> parking_lot::MutexGuard<'_, ()> {
        self.lock.lock()
    }

    fn new_entry(&self, value: Value, ttl: Option<Duration>) -> CacheEntry {
        CacheEntry::new(value, ttl.or(self.options.expires_in))
    }

    // == Locked Helpers ==
    // Callers must hold `self.lock`.

    fn read_entry_locked(&self, key: &str) -> Result<Option<CacheEntry>> {
        let Some(payload) = self.backend.get(key)? else {
            return Ok(None);
        };

        match CacheEntry::decode(&payload) {
            Ok(entry) if entry.is_expired() => {
                if self.backend.delete(key)?.is_some() {
                    self.counters.record_expirations(1);
                }
                Ok(None)
            }
            Ok(entry) => Ok(Some(entry)),
            Err(e) => {
                warn!(key = %key, error = %e, "undecodable entry treated as miss");
                Ok(None)
            }
        }
    }

    fn write_payload_locked(&self, key: &str, payload: &[u8]) -> Result<bool> {
        match self.store_payload_locked(key, payload) {
            Ok(()) => Ok(true),
            Err(CacheError::Backend(BackendError::OutOfSpace { .. })) => Ok(false),
            Err(e) => Err(e),
        }
    }

    fn store_payload_locked(&self, key: &str, payload: &[u8]) -> Result<()> {
        let cost = estimate_entry_cost(key, payload);
        let status = self.backend.status()?;

        if status.free_bytes < cost {
            let target = prune_target(status.total_bytes, self.options.prune_target_ratio);
            debug!(
                key = %key,
                cost,
                free_bytes = status.free_bytes,
                target,
                "write needs space, pruning"
            );
            self.prune_locked(target, Some(self.options.max_prune_time))?;
        }

        match self.backend.set(key, payload) {
            Ok(()) => {
                self.counters.record_write();
                Ok(())
            }
            Err(BackendError::OutOfSpace {
                requested,
                available,
            }) => {
                warn!(key = %key, requested, available, "write rejected, image full");
                self.counters.record_rejected_write();
                Err(BackendError::OutOfSpace {
                    requested,
                    available,
                }
                .into())
            }
            Err(e) => Err(e.into()),
        }
    }

    fn prune_locked(&self, target_size: u64, max_time: Option<Duration>) -> Result<PruneReport> {
        let Some(_pruning) = PruneGuard::try_acquire(&self.pruning) else {
            debug!("prune already in progress, skipping");
            return Ok(PruneReport::skipped(target_size));
        };

        let report = eviction::prune(self.backend.as_ref(), target_size, max_time)?;
        self.counters.record_prune(&report);
        info!(
            expired = report.expired,
            evicted = report.evicted,
            used_bytes = report.used_bytes,
            target_size,
            elapsed_ms = report.elapsed_ms,
            "prune finished"
        );
        Ok(report)
    }
}

fn to_value<V: Serialize>(value: V) -> Result<Value> {
    serde_json::to_value(value).map_err(|e| CacheError::Serialization(e.to_string()))
}

impl fmt::Debug for CacheStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheStore")
            .field("options", &self.options)
            .field("pruning", &self.is_pruning())
            .finish_non_exhaustive()
    }
}
