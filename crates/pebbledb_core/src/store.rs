//! Store handles.

use crate::batch::WriteBatch;
use crate::error::Result;
use crate::handle::HandleState;
use crate::iterator::DbIterator;
use crate::options::{Options, ReadOptions, WriteOptions};
use crate::snapshot::Snapshot;
use bytes::Bytes;
use pebbledb_engine::Db;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// Shared state behind a [`Store`] handle.
///
/// Snapshots and iterators keep references here so they can fail fast
/// when the store is released out from under them.
#[derive(Debug)]
pub(crate) struct StoreCore {
    pub(crate) db: Db,
    pub(crate) state: HandleState,
}

/// A handle to an open database.
///
/// The store owns the underlying engine resources and is the single
/// release point for them: snapshots and iterators it hands out are
/// companions whose lifetimes must stay within the store's. All
/// operations are synchronous and the handle is safe to share across
/// threads; the engine serializes access internally.
///
/// Release the store with [`close`](Self::close) (idempotent) or let
/// drop reclaim it. After either, every operation on the store or on
/// handles derived from it fails with `HandleDisposed` instead of
/// touching freed resources.
///
/// # Example
///
/// ```no_run
/// use pebbledb_core::{Options, Store};
///
/// # fn main() -> pebbledb_core::Result<()> {
/// let store = Store::open("/tmp/demo-db", &Options::new().create_if_missing(true))?;
/// store.put("Tampa", "green")?;
/// assert_eq!(store.get_str("Tampa")?.as_deref(), Some("green"));
/// store.close()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Store {
    core: Arc<StoreCore>,
}

impl Store {
    /// Opens the database at `path`.
    ///
    /// # Errors
    ///
    /// Engine errors surface verbatim: a missing directory without
    /// `create_if_missing`, an existing database with
    /// `error_if_exists`, a lock held by another process, or a
    /// corrupted commit log.
    pub fn open(path: impl AsRef<Path>, options: &Options) -> Result<Self> {
        let db = Db::open(path.as_ref(), &options.to_engine())?;
        Ok(Self {
            core: Arc::new(StoreCore {
                db,
                state: HandleState::new(),
            }),
        })
    }

    fn check(&self) -> Result<()> {
        self.core.state.check("store")
    }

    /// Sets `key` to `value` with default write options.
    pub fn put(&self, key: impl AsRef<[u8]>, value: impl AsRef<[u8]>) -> Result<()> {
        self.put_opt(key, value, &WriteOptions::new())
    }

    /// Sets `key` to `value`.
    pub fn put_opt(
        &self,
        key: impl AsRef<[u8]>,
        value: impl AsRef<[u8]>,
        options: &WriteOptions,
    ) -> Result<()> {
        self.check()?;
        self.core
            .db
            .put(key.as_ref(), value.as_ref(), options.sync)?;
        Ok(())
    }

    /// Removes `key` with default write options. Removing an absent key
    /// succeeds.
    pub fn delete(&self, key: impl AsRef<[u8]>) -> Result<()> {
        self.delete_opt(key, &WriteOptions::new())
    }

    /// Removes `key`. Removing an absent key succeeds.
    pub fn delete_opt(&self, key: impl AsRef<[u8]>, options: &WriteOptions) -> Result<()> {
        self.check()?;
        self.core.db.delete(key.as_ref(), options.sync)?;
        Ok(())
    }

    /// Applies a batch atomically with default write options.
    pub fn write(&self, batch: &WriteBatch) -> Result<()> {
        self.write_opt(batch, &WriteOptions::new())
    }

    /// Applies a batch atomically: its operations take effect in
    /// insertion order under one commit, and no reader ever observes a
    /// partially applied batch.
    pub fn write_opt(&self, batch: &WriteBatch, options: &WriteOptions) -> Result<()> {
        self.check()?;
        self.core.db.apply(batch.ops(), options.sync)?;
        Ok(())
    }

    /// Looks up `key` in the latest committed state.
    ///
    /// Absence is `Ok(None)`, never an error. A stored empty value is
    /// `Some` with a zero-length buffer, distinct from absent.
    pub fn get(&self, key: impl AsRef<[u8]>) -> Result<Option<Bytes>> {
        self.get_opt(key, &ReadOptions::new())
    }

    /// Looks up `key`, honoring a snapshot bound in `options`.
    pub fn get_opt(&self, key: impl AsRef<[u8]>, options: &ReadOptions) -> Result<Option<Bytes>> {
        self.check()?;
        Ok(self.core.db.get(key.as_ref(), options.snapshot)?)
    }

    /// Looks up `key` and decodes the value as UTF-8.
    pub fn get_str(&self, key: impl AsRef<[u8]>) -> Result<Option<String>> {
        self.get_str_opt(key, &ReadOptions::new())
    }

    /// Looks up `key` and decodes the value as UTF-8, honoring a
    /// snapshot bound in `options`.
    pub fn get_str_opt(
        &self,
        key: impl AsRef<[u8]>,
        options: &ReadOptions,
    ) -> Result<Option<String>> {
        match self.get_opt(key, options)? {
            Some(value) => Ok(Some(String::from_utf8(value.to_vec())?)),
            None => Ok(None),
        }
    }

    /// Creates an unseeked iterator over the latest committed state.
    ///
    /// The iterator observes an implicit snapshot taken now; later
    /// writes are not visible through it.
    pub fn iter(&self) -> Result<DbIterator> {
        self.iter_opt(&ReadOptions::new())
    }

    /// Creates an unseeked iterator, honoring a snapshot bound in
    /// `options`.
    pub fn iter_opt(&self, options: &ReadOptions) -> Result<DbIterator> {
        self.check()?;
        let cursor = self.core.db.cursor(options.snapshot)?;
        Ok(DbIterator::new(Arc::clone(&self.core), cursor))
    }

    /// Pins the current state as a [`Snapshot`].
    pub fn snapshot(&self) -> Result<Snapshot> {
        self.check()?;
        let id = self.core.db.snapshot()?;
        Ok(Snapshot::new(id, Arc::downgrade(&self.core)))
    }

    /// Lazily enumerates all entries in ascending key order.
    ///
    /// The enumeration pins a snapshot at the moment of this call and
    /// observes exactly that state. Dropping the returned [`Entries`],
    /// whether at the end or mid-way, releases the snapshot and the
    /// iterator behind it. Call `entries()` again to restart from the
    /// beginning.
    pub fn entries(&self) -> Result<Entries> {
        let snapshot = self.snapshot()?;
        let iter = self.iter_opt(&ReadOptions::new().snapshot(&snapshot))?;
        Ok(Entries {
            _snapshot: snapshot,
            iter,
            started: false,
            done: false,
        })
    }

    /// Answers a diagnostic property query, or `Ok(None)` for names the
    /// engine does not recognize.
    pub fn property_value(&self, name: &str) -> Result<Option<String>> {
        self.check()?;
        Ok(self.core.db.property_value(name)?)
    }

    /// Compacts the key range `[start, limit)`; `None` bounds are
    /// open-ended. Blocks until the engine finishes; there is no
    /// cancellation.
    pub fn compact_range(&self, start: Option<&[u8]>, limit: Option<&[u8]>) -> Result<()> {
        self.check()?;
        self.core.db.compact_range(start, limit)?;
        Ok(())
    }

    /// Best-effort byte estimate for the entries in `[start, limit)`.
    pub fn approximate_size(&self, start: impl AsRef<[u8]>, limit: impl AsRef<[u8]>) -> Result<u64> {
        self.check()?;
        Ok(self
            .core
            .db
            .approximate_size(start.as_ref(), limit.as_ref())?)
    }

    /// Attempts to salvage a database that fails to open, without
    /// opening it. Data after the first corrupt log record is lost.
    pub fn repair(path: impl AsRef<Path>, options: &Options) -> Result<()> {
        Db::repair(path.as_ref(), &options.to_engine())?;
        Ok(())
    }

    /// Destroys the database at `path`, removing its files. A missing
    /// database is a no-op success.
    pub fn destroy(path: impl AsRef<Path>, options: &Options) -> Result<()> {
        Db::destroy(path.as_ref(), &options.to_engine())?;
        Ok(())
    }

    /// Releases the store. Idempotent; after the first call every
    /// operation on this store and on handles derived from it fails
    /// with `HandleDisposed`.
    pub fn close(&self) -> Result<()> {
        if !self.core.state.begin_dispose() {
            return Ok(());
        }
        debug!("closing store");
        self.core.db.close()?;
        Ok(())
    }
}

/// Lazy enumeration of a store's entries at a fixed view.
///
/// Yields `(key, value)` pairs in ascending byte order of keys. Errors
/// (a store closed mid-enumeration, for instance) are yielded once and
/// end the enumeration.
#[derive(Debug)]
pub struct Entries {
    _snapshot: Snapshot,
    iter: DbIterator,
    started: bool,
    done: bool,
}

impl Iterator for Entries {
    type Item = Result<(Bytes, Bytes)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let step = if self.started {
            self.iter.next()
        } else {
            self.started = true;
            self.iter.seek_to_first()
        };
        if let Err(e) = step {
            self.done = true;
            return Some(Err(e));
        }

        match self.iter.valid() {
            Ok(true) => {}
            Ok(false) => {
                self.done = true;
                return None;
            }
            Err(e) => {
                self.done = true;
                return Some(Err(e));
            }
        }

        match (self.iter.key(), self.iter.value()) {
            (Ok(key), Ok(value)) => Some(Ok((key, value))),
            (Err(e), _) | (_, Err(e)) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}
