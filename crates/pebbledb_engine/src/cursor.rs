//! Engine cursors.

use crate::db::DbShared;
use crate::error::{EngineError, EngineResult};
use crate::snapshot::SnapshotId;
use bytes::Bytes;
use std::sync::Arc;

/// Where a cursor currently stands.
#[derive(Debug)]
enum Position {
    /// Freshly created; no seek has happened yet.
    Unseeked,
    /// Positioned at an existing entry.
    At { key: Vec<u8>, value: Vec<u8> },
    /// Moved past either end of the key space.
    Exhausted,
}

/// A cursor over the ordered key space at a fixed view.
///
/// The view's sequence number is pinned in the snapshot tracker for the
/// cursor's whole lifetime, so compaction cannot reclaim versions the
/// cursor may still visit. Dropping the cursor releases the pin.
///
/// Cursors are produced unseeked; callers must seek before reading.
/// `next`/`prev` from an unpositioned cursor leave it exhausted rather
/// than walking from an undefined spot.
#[derive(Debug)]
pub struct Cursor {
    shared: Arc<DbShared>,
    seqno: u64,
    pin: SnapshotId,
    position: Position,
}

impl Cursor {
    pub(crate) fn new(shared: Arc<DbShared>, seqno: u64, pin: SnapshotId) -> Self {
        Self {
            shared,
            seqno,
            pin,
            position: Position::Unseeked,
        }
    }

    fn settle(&mut self, entry: Option<(Vec<u8>, Vec<u8>)>) {
        self.position = match entry {
            Some((key, value)) => Position::At { key, value },
            None => Position::Exhausted,
        };
    }

    /// Positions at the first entry, or exhausts on an empty view.
    pub fn seek_to_first(&mut self) {
        let entry = self.shared.table.read().first(self.seqno);
        self.settle(entry);
    }

    /// Positions at the last entry, or exhausts on an empty view.
    pub fn seek_to_last(&mut self) {
        let entry = self.shared.table.read().last(self.seqno);
        self.settle(entry);
    }

    /// Positions at the first entry with key `>= key`.
    pub fn seek(&mut self, key: &[u8]) {
        let entry = self.shared.table.read().seek(key, self.seqno);
        self.settle(entry);
    }

    /// Advances one entry forward, exhausting at the end.
    pub fn next(&mut self) {
        let entry = match &self.position {
            Position::At { key, .. } => self.shared.table.read().next_after(key, self.seqno),
            _ => None,
        };
        self.settle(entry);
    }

    /// Steps one entry backward, exhausting at the start.
    pub fn prev(&mut self) {
        let entry = match &self.position {
            Position::At { key, .. } => self.shared.table.read().prev_before(key, self.seqno),
            _ => None,
        };
        self.settle(entry);
    }

    /// True when positioned at an entry.
    #[must_use]
    pub fn valid(&self) -> bool {
        matches!(self.position, Position::At { .. })
    }

    /// The key at the current position.
    ///
    /// # Errors
    ///
    /// `CursorNotValid` when the cursor is unseeked or exhausted.
    pub fn key(&self) -> EngineResult<Bytes> {
        match &self.position {
            Position::At { key, .. } => Ok(Bytes::copy_from_slice(key)),
            _ => Err(EngineError::CursorNotValid),
        }
    }

    /// The value at the current position.
    ///
    /// # Errors
    ///
    /// `CursorNotValid` when the cursor is unseeked or exhausted.
    pub fn value(&self) -> EngineResult<Bytes> {
        match &self.position {
            Position::At { value, .. } => Ok(Bytes::copy_from_slice(value)),
            _ => Err(EngineError::CursorNotValid),
        }
    }
}

impl Drop for Cursor {
    fn drop(&mut self) {
        self.shared.snapshots.unpin(self.pin);
    }
}
