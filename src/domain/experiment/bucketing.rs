//! Deterministic, storage-free session bucketing.

use sha2::{Digest, Sha256};

use super::experiment::TrafficAllocation;
use crate::domain::foundation::{ExperimentId, SessionId};

/// Number of buckets a session hash is reduced to.
pub const BUCKETS: u64 = 100;

/// `hash(experiment_id + session_id) mod 100`, stable across processes
/// and releases.
pub fn bucket_for(experiment_id: &ExperimentId, session_id: &SessionId) -> u8 {
    let mut hasher = Sha256::new();
    hasher.update(experiment_id.as_str().as_bytes());
    hasher.update(session_id.as_str().as_bytes());
    let digest = hasher.finalize();

    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest[..8]);
    // Always < 100.
    (u64::from_be_bytes(prefix) % BUCKETS) as u8
}

/// Walks cumulative thresholds in declaration order and returns the
/// variant whose range `[start, start + pct)` contains `bucket`.
pub fn select_variant(allocations: &[TrafficAllocation], bucket: u8) -> Option<&str> {
    let mut upper: u32 = 0;
    for allocation in allocations {
        upper += u32::from(allocation.percentage.value());
        if u32::from(bucket) < upper {
            return Some(allocation.variant.as_str());
        }
    }
    None
}
