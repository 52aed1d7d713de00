//! Per-store and per-operation options.

use crate::snapshot::Snapshot;
use pebbledb_engine::{OpenOptions, SnapshotId};

/// Options applied when opening a store.
///
/// # Example
///
/// ```
/// use pebbledb_core::Options;
///
/// let options = Options::new().create_if_missing(true);
/// assert!(!options.error_if_exists);
/// ```
#[derive(Debug, Clone, Default)]
pub struct Options {
    /// Create the database if it doesn't exist. Defaults to false.
    pub create_if_missing: bool,
    /// Fail the open if the database already exists. Defaults to false.
    pub error_if_exists: bool,
}

impl Options {
    /// Creates options with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether to create the database if missing.
    #[must_use]
    pub const fn create_if_missing(mut self, value: bool) -> Self {
        self.create_if_missing = value;
        self
    }

    /// Sets whether to fail if the database already exists.
    #[must_use]
    pub const fn error_if_exists(mut self, value: bool) -> Self {
        self.error_if_exists = value;
        self
    }

    pub(crate) fn to_engine(&self) -> OpenOptions {
        OpenOptions::new()
            .create_if_missing(self.create_if_missing)
            .error_if_exists(self.error_if_exists)
    }
}

/// Options applied to individual reads and iterator creation.
#[derive(Debug, Clone, Default)]
pub struct ReadOptions {
    pub(crate) snapshot: Option<SnapshotId>,
}

impl ReadOptions {
    /// Creates options reading the latest committed state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds the read to a snapshot's pinned view.
    #[must_use]
    pub fn snapshot(mut self, snapshot: &Snapshot) -> Self {
        self.snapshot = Some(snapshot.id());
        self
    }
}

/// Options applied to individual writes.
#[derive(Debug, Clone, Default)]
pub struct WriteOptions {
    /// Force the write to durable storage before returning. Defaults to
    /// false.
    pub sync: bool,
}

impl WriteOptions {
    /// Creates options with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether the write fsyncs before returning.
    #[must_use]
    pub const fn sync(mut self, value: bool) -> Self {
        self.sync = value;
        self
    }
}
