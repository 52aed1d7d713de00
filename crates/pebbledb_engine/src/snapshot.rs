//! Snapshot tracking.
//!
//! A snapshot pins the sequence number that was latest when it was
//! created. Reads resolved against a snapshot observe exactly the
//! committed state as of that sequence number; compaction may not
//! reclaim versions any pin can still observe. Cursors register a pin
//! the same way for the duration of their lifetime.

use crate::error::{EngineError, EngineResult};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// Opaque identifier for a pinned snapshot.
///
/// The identifier is separate from the pinned sequence number; releasing
/// a snapshot invalidates its identifier permanently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SnapshotId(u64);

/// Tracks pinned snapshots and the minimum pinned sequence number.
#[derive(Debug)]
pub(crate) struct SnapshotTracker {
    next_id: AtomicU64,
    inner: Mutex<TrackerInner>,
}

#[derive(Debug, Default)]
struct TrackerInner {
    latest_seqno: u64,
    pinned: BTreeMap<u64, u64>,
}

impl SnapshotTracker {
    /// Creates an empty tracker.
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            inner: Mutex::new(TrackerInner::default()),
        }
    }

    /// Records a newly committed sequence number.
    pub fn set_latest_seqno(&self, seqno: u64) {
        let mut guard = self.inner.lock();
        guard.latest_seqno = guard.latest_seqno.max(seqno);
    }

    /// Returns the latest committed sequence number.
    pub fn latest_seqno(&self) -> u64 {
        self.inner.lock().latest_seqno
    }

    /// Returns the lowest sequence number any pin can still observe.
    ///
    /// With nothing pinned this is the latest sequence number, so
    /// compaction may drop every shadowed version.
    pub fn min_pinned_seqno(&self) -> u64 {
        let guard = self.inner.lock();
        guard
            .pinned
            .values()
            .copied()
            .min()
            .unwrap_or(guard.latest_seqno)
    }

    /// Pins the latest sequence number and returns its identifier.
    pub fn pin_latest(&self) -> SnapshotId {
        let id = SnapshotId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let mut guard = self.inner.lock();
        let seqno = guard.latest_seqno;
        guard.pinned.insert(id.0, seqno);
        id
    }

    /// Pins an explicit sequence number (used by cursors).
    pub fn pin_at(&self, seqno: u64) -> SnapshotId {
        let id = SnapshotId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.inner.lock().pinned.insert(id.0, seqno);
        id
    }

    /// Releases a pin. Unknown identifiers are ignored, which makes
    /// release idempotent.
    pub fn unpin(&self, id: SnapshotId) {
        self.inner.lock().pinned.remove(&id.0);
    }

    /// Resolves an optional snapshot to the sequence number a read
    /// should observe.
    pub fn resolve(&self, id: Option<SnapshotId>) -> EngineResult<u64> {
        let guard = self.inner.lock();
        match id {
            None => Ok(guard.latest_seqno),
            Some(snapshot_id) => guard
                .pinned
                .get(&snapshot_id.0)
                .copied()
                .ok_or(EngineError::UnknownSnapshot),
        }
    }

    /// Number of live pins.
    pub fn pinned_count(&self) -> usize {
        self.inner.lock().pinned.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pin_resolves_to_creation_seqno() {
        let tracker = SnapshotTracker::new();
        tracker.set_latest_seqno(5);

        let snap = tracker.pin_latest();
        tracker.set_latest_seqno(9);

        assert_eq!(tracker.resolve(Some(snap)).unwrap(), 5);
        assert_eq!(tracker.resolve(None).unwrap(), 9);
    }

    #[test]
    fn unpin_invalidates_id() {
        let tracker = SnapshotTracker::new();
        tracker.set_latest_seqno(3);

        let snap = tracker.pin_latest();
        tracker.unpin(snap);
        assert!(matches!(
            tracker.resolve(Some(snap)),
            Err(EngineError::UnknownSnapshot)
        ));

        // Releasing twice is a no-op.
        tracker.unpin(snap);
    }

    #[test]
    fn min_pinned_tracks_oldest_live_pin() {
        let tracker = SnapshotTracker::new();
        tracker.set_latest_seqno(10);
        assert_eq!(tracker.min_pinned_seqno(), 10);

        let old = tracker.pin_latest();
        tracker.set_latest_seqno(20);
        let newer = tracker.pin_latest();

        assert_eq!(tracker.min_pinned_seqno(), 10);
        tracker.unpin(old);
        assert_eq!(tracker.min_pinned_seqno(), 20);
        tracker.unpin(newer);
        assert_eq!(tracker.min_pinned_seqno(), 20);
    }
}
