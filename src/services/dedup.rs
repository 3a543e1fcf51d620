//! Batch deduplicator - groups points by rounded coordinate key
//!
//! Two points whose coordinates are equal after rounding share exactly one
//! resolution call; normalization failures are routed aside and never reach
//! the resolver.

use crate::domain::geo::{normalize_pair, resolution_key, Coordinate};
use crate::domain::types::{NormalizationFailure, RawPoint};
use rustc_hash::FxHashMap;
use tracing::debug;

/// One dedup group: the normalized coordinate and the input indices of
/// every point that rounds to its key.
#[derive(Debug, Clone)]
pub struct GroupEntry {
    pub coord: Coordinate,
    pub member_indices: Vec<usize>,
}

/// A point that failed normalization, with its position in the input so
/// the orchestrator can put it back in order.
#[derive(Debug, Clone)]
pub struct FailedPoint {
    pub index: usize,
    pub failure: NormalizationFailure,
}

/// Group a batch by resolution key.
///
/// Every input id lands exactly once: either as a member of one group or
/// in the failure list. No id is silently dropped.
pub fn group(
    points: &[RawPoint],
    precision: u32,
) -> (FxHashMap<String, GroupEntry>, Vec<FailedPoint>) {
    let mut groups: FxHashMap<String, GroupEntry> = FxHashMap::default();
    let mut failures = Vec::new();

    for (index, point) in points.iter().enumerate() {
        match normalize_pair(&point.latitude, &point.longitude) {
            Ok(coord) => {
                let key = resolution_key(&coord, precision);
                groups
                    .entry(key)
                    .or_insert_with(|| GroupEntry { coord, member_indices: Vec::new() })
                    .member_indices
                    .push(index);
            }
            Err(e) => {
                failures.push(FailedPoint {
                    index,
                    failure: NormalizationFailure {
                        id: point.id.clone(),
                        reason: e.to_string(),
                    },
                });
            }
        }
    }

    debug!(
        total = points.len(),
        unique = groups.len(),
        failed = failures.len(),
        "batch_grouped"
    );

    (groups, failures)
}
