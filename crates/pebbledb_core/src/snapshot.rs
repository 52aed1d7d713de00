//! Snapshot handles.

use crate::error::{Error, Result};
use crate::handle::HandleState;
use crate::store::StoreCore;
use pebbledb_engine::SnapshotId;
use std::sync::Weak;

/// A pinned, immutable view of the store at a point in time.
///
/// Reads bound to a snapshot (via
/// [`ReadOptions::snapshot`](crate::ReadOptions::snapshot)) observe
/// exactly the committed state as of its creation, regardless of later
/// writes. A snapshot is immutable and safe to share between threads
/// for reads.
///
/// The snapshot holds a non-owning reference back to its store, used
/// only to route the release; it keeps the store alive in no way and
/// the store remains the single owner of the pinned view. Release it
/// with [`release`](Self::release) while the store is still open, or
/// let drop reclaim it.
#[derive(Debug)]
pub struct Snapshot {
    id: SnapshotId,
    store: Weak<StoreCore>,
    state: HandleState,
}

impl Snapshot {
    pub(crate) fn new(id: SnapshotId, store: Weak<StoreCore>) -> Self {
        Self {
            id,
            store,
            state: HandleState::new(),
        }
    }

    pub(crate) fn id(&self) -> SnapshotId {
        self.id
    }

    /// Releases the pinned view through the owning store.
    ///
    /// Idempotent; a second call is a no-op.
    ///
    /// # Errors
    ///
    /// `HandleDisposed` naming the store when the owning store has
    /// already been closed or dropped. A release is never routed
    /// through a released store; if that happens the snapshot itself
    /// stays unreleased.
    pub fn release(&self) -> Result<()> {
        if self.state.is_disposed() {
            return Ok(());
        }
        let core = self.store.upgrade().ok_or(Error::disposed("store"))?;
        core.state.check("store")?;
        if self.state.begin_dispose() {
            core.db.release_snapshot(self.id);
        }
        Ok(())
    }
}

impl Drop for Snapshot {
    fn drop(&mut self) {
        if !self.state.begin_dispose() {
            return;
        }
        // Unpinning is memory-only, so it is safe even after the store
        // handle was closed; a fully dropped store has nothing left to
        // unpin from.
        if let Some(core) = self.store.upgrade() {
            core.db.release_snapshot(self.id);
        }
    }
}
