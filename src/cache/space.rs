//! Space Accounting Module
//!
//! Capacity queries against the backend and the pre-write cost estimate.

use crate::backend::Backend;
use crate::error::Result;

/// Capacity of the backing image in bytes.
pub fn total_bytes(backend: &dyn Backend) -> Result<u64> {
    Ok(backend.status()?.total_bytes)
}

/// Currently unused capacity in bytes.
pub fn free_bytes(backend: &dyn Backend) -> Result<u64> {
    Ok(backend.status()?.free_bytes)
}

pub fn used_bytes(backend: &dyn Backend) -> Result<u64> {
    Ok(backend.status()?.used_bytes())
}

// == Entry Cost Estimate ==
/// Pessimistic size a write of `payload` under `key` may take in the image.
///
/// Doubled to cover the backend's index and data slot overhead.
pub fn estimate_entry_cost(key: &str, payload: &[u8]) -> u64 {
    (key.len() as u64 + payload.len() as u64) * 2
}

/// Byte ceiling a prune pass aims for: `ratio` of `total_bytes`.
pub fn prune_target(total_bytes: u64, ratio: f64) -> u64 {
    (total_bytes as f64 * ratio) as u64
}
