//! shm_cache - A fixed-capacity cache over a shared key/value image
//!
//! Adds expiry, size-bounded random eviction, counters and pattern deletion
//! to a bounded backing store, and serves it over HTTP.

pub mod api;
pub mod backend;
pub mod cache;
pub mod config;
pub mod error;
pub mod models;
pub mod tasks;

pub use api::AppState;
pub use cache::CacheStore;
pub use config::{Config, StoreOptions};
pub use tasks::spawn_cleanup_task;
