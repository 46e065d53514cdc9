//! Backend Module
//!
//! The raw bounded-capacity key/value storage the cache is layered on.
//! A backend knows nothing about expiry or eviction; it only stores bytes
//! and reports how much room it has left.

mod image;

use serde::Serialize;
use thiserror::Error;

pub use image::{record_cost, SharedImage, MIN_IMAGE_SIZE, RECORD_OVERHEAD};

// == Backend Error ==
/// Failures reported by a backing store primitive.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// The record does not fit in the remaining free space
    #[error("out of space: {requested} bytes requested, {available} bytes free")]
    OutOfSpace { requested: u64, available: u64 },

    /// The image's internal structures are inconsistent
    #[error("backing image corrupted: {0}")]
    Corrupted(String),
}

// == Shm Status ==
/// Byte-level capacity report of a backing image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ShmStatus {
    pub total_bytes: u64,
    pub free_bytes: u64,
}

impl ShmStatus {
    pub fn used_bytes(&self) -> u64 {
        self.total_bytes.saturating_sub(self.free_bytes)
    }
}

// == Backend Trait ==
/// Raw storage primitives the cache store needs.
///
/// Implementations must be safe to share between threads and between
/// several cache store instances attached to the same image.
pub trait Backend: Send + Sync {
    /// Returns the stored payload for `key`.
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, BackendError>;

    /// Stores `payload` under `key`, replacing any previous record.
    fn set(&self, key: &str, payload: &[u8]) -> Result<(), BackendError>;

    /// Removes `key`, returning the payload it held.
    fn delete(&self, key: &str) -> Result<Option<Vec<u8>>, BackendError>;

    /// Snapshot of every key currently stored.
    fn keys(&self) -> Result<Vec<String>, BackendError>;

    /// An arbitrary live record, or `None` when the image is empty.
    fn random_pair(&self) -> Result<Option<(String, Vec<u8>)>, BackendError>;

    /// Removes every record.
    fn clear(&self) -> Result<(), BackendError>;

    /// Number of records stored.
    fn len(&self) -> Result<usize, BackendError>;

    fn status(&self) -> Result<ShmStatus, BackendError>;
}
