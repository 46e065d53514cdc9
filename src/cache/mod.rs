//! Cache Module
//!
//! Turns a raw backing image into a cache: entry encoding and expiry, space
//! accounting, expiry sweeps and random eviction, behind one store facade.

mod entry;
mod eviction;
mod pattern;
mod space;
mod stats;
mod store;


// Re-export public types
pub use entry::{current_timestamp_ms, CacheEntry};
pub use eviction::PruneReport;
pub use pattern::{KeyMatcher, KeyPattern};
pub use space::estimate_entry_cost;
pub use stats::{CacheStats, Inspection};
pub use store::CacheStore;

/// Options naming a fresh image, so tests running in parallel never share one.
#[cfg(test)]
pub(crate) fn test_options() -> crate::config::StoreOptions {
    use std::sync::atomic::{AtomicUsize, Ordering};

    static NEXT: AtomicUsize = AtomicUsize::new(0);
    crate::config::StoreOptions::default()
        .with_directory(std::env::temp_dir().join("shm_cache-tests"))
        .with_name(format!("store-{}", NEXT.fetch_add(1, Ordering::Relaxed)))
}
