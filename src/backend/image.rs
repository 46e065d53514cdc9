//! Shared Image Module
//!
//! A bounded in-memory key/value image with byte-granular accounting.
//! Images are attached by path through a process-wide registry, so every
//! store opened on the same path sees the same records.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};

use parking_lot::Mutex;
use rand::Rng;
use tracing::debug;

use super::{Backend, BackendError, ShmStatus};

const MIB: u64 = 1024 * 1024;

/// Smallest capacity an image is created with; smaller requests are raised to it.
pub const MIN_IMAGE_SIZE: u64 = 16 * MIB;

/// Per-record cost on top of key and payload bytes (index slot + data header).
///
/// Records smaller than this pay their own size again instead, so a record
/// never costs more than twice its key and payload.
pub const RECORD_OVERHEAD: u64 = 64;

static REGISTRY: LazyLock<Mutex<HashMap<PathBuf, Arc<SharedImage>>>> =
    LazyLock::new(|| Mutex::new(HashMap::new()));

// == Shared Image ==
/// Fixed-capacity record storage shared by every store attached to `path`.
#[derive(Debug)]
pub struct SharedImage {
    path: PathBuf,
    total_bytes: u64,
    state: Mutex<ImageState>,
}

#[derive(Debug, Default)]
struct ImageState {
    records: HashMap<String, Record>,
    /// Dense key list backing O(1) random sampling
    slots: Vec<String>,
    used_bytes: u64,
}

#[derive(Debug)]
struct Record {
    payload: Vec<u8>,
    slot: usize,
}

/// Bytes a record of `key` and `payload` occupies in the image.
pub fn record_cost(key: &str, payload: &[u8]) -> u64 {
    let data = (key.len() + payload.len()) as u64;
    data + data.min(RECORD_OVERHEAD)
}

impl SharedImage {
    // == Attach ==
    /// Returns the image registered at `path`, creating it with `size_mb`
    /// MiB of capacity if none exists yet.
    ///
    /// Capacity is fixed by the first attach; later attaches reuse the
    /// existing image whatever size they ask for.
    pub fn attach(path: impl AsRef<Path>, size_mb: u64) -> Arc<Self> {
        let path = path.as_ref().to_path_buf();
        let mut registry = REGISTRY.lock();

        if let Some(image) = registry.get(&path) {
            debug!(path = %path.display(), "attached to existing image");
            return Arc::clone(image);
        }

        let image = Arc::new(Self::new(path.clone(), size_mb));
        debug!(
            path = %path.display(),
            total_bytes = image.total_bytes,
            "created image"
        );
        registry.insert(path, Arc::clone(&image));
        image
    }

    // == Unlink ==
    /// Drops the registry's handle on the image at `path`.
    ///
    /// Stores already attached keep their image; the next attach creates a
    /// fresh one. Returns false if nothing was registered.
    pub fn unlink(path: impl AsRef<Path>) -> bool {
        REGISTRY.lock().remove(path.as_ref()).is_some()
    }

    // == Constructor ==
    /// Creates a standalone image not registered under any path.
    pub fn new(path: PathBuf, size_mb: u64) -> Self {
        let total_bytes = size_mb.saturating_mul(MIB).max(MIN_IMAGE_SIZE);
        Self {
            path,
            total_bytes,
            state: Mutex::new(ImageState::default()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Backend for SharedImage {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, BackendError> {
        let state = self.state.lock();
        Ok(state.records.get(key).map(|record| record.payload.clone()))
    }

    fn set(&self, key: &str, payload: &[u8]) -> Result<(), BackendError> {
        let mut guard = self.state.lock();
        let state = &mut *guard;

        let cost = record_cost(key, payload);
        let released = state
            .records
            .get(key)
            .map(|record| record_cost(key, &record.payload))
            .unwrap_or(0);
        let available = self.total_bytes - state.used_bytes + released;

        if cost > available {
            return Err(BackendError::OutOfSpace {
                requested: cost,
                available,
            });
        }

        match state.records.get_mut(key) {
            Some(record) => record.payload = payload.to_vec(),
            None => {
                let slot = state.slots.len();
                state.slots.push(key.to_owned());
                state.records.insert(
                    key.to_owned(),
                    Record {
                        payload: payload.to_vec(),
                        slot,
                    },
                );
            }
        }

        state.used_bytes = state.used_bytes - released + cost;
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<Option<Vec<u8>>, BackendError> {
        let mut guard = self.state.lock();
        let state = &mut *guard;

        let Some(record) = state.records.remove(key) else {
            return Ok(None);
        };

        let removed = state.slots.swap_remove(record.slot);
        if removed != key {
            return Err(BackendError::Corrupted(format!(
                "slot {} held '{}' instead of '{}'",
                record.slot, removed, key
            )));
        }

        // The former last key now lives in the vacated slot
        if let Some(moved) = state.slots.get(record.slot) {
            let moved_record = state.records.get_mut(moved).ok_or_else(|| {
                BackendError::Corrupted(format!("slot key '{}' has no record", moved))
            })?;
            moved_record.slot = record.slot;
        }

        state.used_bytes -= record_cost(key, &record.payload);
        Ok(Some(record.payload))
    }

    fn keys(&self) -> Result<Vec<String>, BackendError> {
        Ok(self.state.lock().slots.clone())
    }

    fn random_pair(&self) -> Result<Option<(String, Vec<u8>)>, BackendError> {
        let state = self.state.lock();
        if state.slots.is_empty() {
            return Ok(None);
        }

        let index = rand::thread_rng().gen_range(0..state.slots.len());
        let key = &state.slots[index];
        let record = state
            .records
            .get(key)
            .ok_or_else(|| BackendError::Corrupted(format!("slot key '{}' has no record", key)))?;

        Ok(Some((key.clone(), record.payload.clone())))
    }

    fn clear(&self) -> Result<(), BackendError> {
        *self.state.lock() = ImageState::default();
        Ok(())
    }

    fn len(&self) -> Result<usize, BackendError> {
        Ok(self.state.lock().records.len())
    }

    fn status(&self) -> Result<ShmStatus, BackendError> {
        let state = self.state.lock();
        Ok(ShmStatus {
            total_bytes: self.total_bytes,
            free_bytes: self.total_bytes - state.used_bytes,
        })
    }
}
