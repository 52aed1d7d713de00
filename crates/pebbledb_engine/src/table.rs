//! Versioned ordered table.
//!
//! Keys map to version chains in ascending sequence order; a tombstone
//! is a version with no value. A read at sequence `s` observes, per key,
//! the newest version with `seqno <= s`. This is what lets snapshots and
//! cursors see a fixed view while newer commits land.

use crate::record::BatchOp;
use std::collections::BTreeMap;
use std::ops::Bound;

/// Per-op byte overhead used for size estimates (tag + two length
/// fields), mirroring the commit log encoding.
const OP_OVERHEAD: u64 = 9;

/// One version of a key. `value: None` is a tombstone.
#[derive(Debug, Clone)]
struct Version {
    seqno: u64,
    value: Option<Vec<u8>>,
}

/// The in-memory multi-version table.
///
/// Not internally synchronized; the database guards it with a
/// reader-writer lock.
#[derive(Debug, Default)]
pub(crate) struct Table {
    map: BTreeMap<Vec<u8>, Vec<Version>>,
}

fn visible<'a>(versions: &'a [Version], seqno: u64) -> Option<&'a Version> {
    versions.iter().rev().find(|v| v.seqno <= seqno)
}

fn range_bounds<'a>(
    start: Option<&'a [u8]>,
    limit: Option<&'a [u8]>,
) -> (Bound<&'a [u8]>, Bound<&'a [u8]>) {
    let lower = match start {
        Some(key) => Bound::Included(key),
        None => Bound::Unbounded,
    };
    let upper = match limit {
        Some(key) => Bound::Excluded(key),
        None => Bound::Unbounded,
    };
    (lower, upper)
}

impl Table {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies one committed batch under a single sequence number.
    ///
    /// Ops are applied in insertion order, so later ops on the same key
    /// shadow earlier ones within the batch as well as across batches.
    pub fn apply(&mut self, seqno: u64, ops: &[BatchOp]) {
        for op in ops {
            let value = match op {
                BatchOp::Put { value, .. } => Some(value.clone()),
                BatchOp::Delete { .. } => None,
            };
            let versions = self.map.entry(op.key().to_vec()).or_default();
            // Two ops on one key in one batch collapse to the last one.
            if let Some(last) = versions.last_mut() {
                if last.seqno == seqno {
                    last.value = value;
                    continue;
                }
            }
            versions.push(Version { seqno, value });
        }
    }

    /// Looks up the value visible for `key` at `seqno`.
    ///
    /// Returns `None` for an absent key or a tombstone; an empty value
    /// is present-with-empty-content, not absent.
    pub fn get(&self, key: &[u8], seqno: u64) -> Option<&[u8]> {
        self.map
            .get(key)
            .and_then(|versions| visible(versions, seqno))
            .and_then(|v| v.value.as_deref())
    }

    /// First visible entry at `seqno`, in ascending key order.
    pub fn first(&self, seqno: u64) -> Option<(Vec<u8>, Vec<u8>)> {
        self.scan_forward(Bound::Unbounded, seqno)
    }

    /// Last visible entry at `seqno`.
    pub fn last(&self, seqno: u64) -> Option<(Vec<u8>, Vec<u8>)> {
        self.scan_backward(Bound::Unbounded, seqno)
    }

    /// First visible entry with key `>= key` at `seqno`.
    pub fn seek(&self, key: &[u8], seqno: u64) -> Option<(Vec<u8>, Vec<u8>)> {
        self.scan_forward(Bound::Included(key), seqno)
    }

    /// First visible entry with key `> key` at `seqno`.
    pub fn next_after(&self, key: &[u8], seqno: u64) -> Option<(Vec<u8>, Vec<u8>)> {
        self.scan_forward(Bound::Excluded(key), seqno)
    }

    /// Last visible entry with key `< key` at `seqno`.
    pub fn prev_before(&self, key: &[u8], seqno: u64) -> Option<(Vec<u8>, Vec<u8>)> {
        self.scan_backward(Bound::Excluded(key), seqno)
    }

    fn scan_forward(&self, lower: Bound<&[u8]>, seqno: u64) -> Option<(Vec<u8>, Vec<u8>)> {
        self.map
            .range::<[u8], _>((lower, Bound::Unbounded))
            .find_map(|(key, versions)| {
                visible(versions, seqno)
                    .and_then(|v| v.value.as_ref())
                    .map(|value| (key.clone(), value.clone()))
            })
    }

    fn scan_backward(&self, upper: Bound<&[u8]>, seqno: u64) -> Option<(Vec<u8>, Vec<u8>)> {
        self.map
            .range::<[u8], _>((Bound::Unbounded, upper))
            .rev()
            .find_map(|(key, versions)| {
                visible(versions, seqno)
                    .and_then(|v| v.value.as_ref())
                    .map(|value| (key.clone(), value.clone()))
            })
    }

    /// All visible entries at `seqno`, ascending. Used for checkpoints.
    pub fn visible_entries(&self, seqno: u64) -> Vec<(Vec<u8>, Vec<u8>)> {
        self.map
            .iter()
            .filter_map(|(key, versions)| {
                visible(versions, seqno)
                    .and_then(|v| v.value.as_ref())
                    .map(|value| (key.clone(), value.clone()))
            })
            .collect()
    }

    /// Number of visible (non-tombstone) entries at `seqno`.
    pub fn visible_len(&self, seqno: u64) -> usize {
        self.map
            .values()
            .filter(|versions| {
                visible(versions, seqno).is_some_and(|v| v.value.is_some())
            })
            .count()
    }

    /// Total retained versions across all keys.
    pub fn version_count(&self) -> usize {
        self.map.values().map(Vec::len).sum()
    }

    /// Best-effort byte estimate of visible entries in `[start, limit)`.
    pub fn approximate_size(
        &self,
        start: Option<&[u8]>,
        limit: Option<&[u8]>,
        seqno: u64,
    ) -> u64 {
        self.map
            .range::<[u8], _>(range_bounds(start, limit))
            .filter_map(|(key, versions)| {
                visible(versions, seqno)
                    .and_then(|v| v.value.as_ref())
                    .map(|value| key.len() as u64 + value.len() as u64 + OP_OVERHEAD)
            })
            .sum()
    }

    /// Rough in-memory footprint in bytes.
    pub fn memory_usage(&self) -> usize {
        self.map
            .iter()
            .map(|(key, versions)| {
                key.len()
                    + versions
                        .iter()
                        .map(|v| 16 + v.value.as_ref().map_or(0, Vec::len))
                        .sum::<usize>()
            })
            .sum()
    }

    /// Drops versions in `[start, limit)` that no pin at or above
    /// `min_pinned` can still observe.
    ///
    /// Per key the survivors are the newest version with
    /// `seqno <= min_pinned` (omitted when it is a tombstone, since an
    /// absent chain already reads as absent) plus every newer version.
    /// Returns the number of versions dropped.
    pub fn compact(
        &mut self,
        start: Option<&[u8]>,
        limit: Option<&[u8]>,
        min_pinned: u64,
    ) -> usize {
        let keys: Vec<Vec<u8>> = self
            .map
            .range::<[u8], _>(range_bounds(start, limit))
            .map(|(key, _)| key.clone())
            .collect();

        let mut dropped = 0;
        for key in keys {
            let Some(versions) = self.map.get_mut(&key) else {
                continue;
            };
            let split = versions
                .iter()
                .rposition(|v| v.seqno <= min_pinned)
                .map_or(0, |i| i + 1);

            let mut survivors: Vec<Version> = Vec::new();
            if split > 0 && versions[split - 1].value.is_some() {
                survivors.push(versions[split - 1].clone());
            }
            survivors.extend_from_slice(&versions[split..]);

            dropped += versions.len() - survivors.len();
            if survivors.is_empty() {
                self.map.remove(&key);
            } else {
                *versions = survivors;
            }
        }
        dropped
    }
}
