//! Iterator handles.

use crate::error::{Error, Result};
use crate::handle::HandleState;
use crate::store::StoreCore;
use bytes::Bytes;
use pebbledb_engine::Cursor;
use std::sync::Arc;

/// An ordered iterator over the store's key space at a fixed view.
///
/// Iterators start unseeked: no entry is current and
/// [`valid`](Self::valid) is false until one of the seek operations
/// runs. From a positioned iterator, [`next`](Self::next) and
/// [`prev`](Self::prev) move one entry at a time; walking past either
/// end exhausts the iterator, after which it must be re-seeked to be
/// used again.
///
/// The view is fixed at creation: an iterator bound to a snapshot
/// observes that snapshot, and an unbound one observes an implicit
/// snapshot taken when it was created. Writes that commit while the
/// iterator is alive are never visible through it.
///
/// Every operation fails with `HandleDisposed` once the iterator or
/// its store has been closed. Reading [`key`](Self::key) or
/// [`value`](Self::value) while not positioned is a programming error
/// and fails with [`Error::IteratorNotPositioned`].
#[derive(Debug)]
pub struct DbIterator {
    core: Arc<StoreCore>,
    cursor: Option<Cursor>,
    state: HandleState,
}

impl DbIterator {
    pub(crate) fn new(core: Arc<StoreCore>, cursor: Cursor) -> Self {
        Self {
            core,
            cursor: Some(cursor),
            state: HandleState::new(),
        }
    }

    fn check(&self) -> Result<()> {
        self.state.check("iterator")?;
        self.core.state.check("store")
    }

    fn cursor(&self) -> Result<&Cursor> {
        self.check()?;
        self.cursor.as_ref().ok_or(Error::disposed("iterator"))
    }

    fn cursor_mut(&mut self) -> Result<&mut Cursor> {
        self.check()?;
        self.cursor.as_mut().ok_or(Error::disposed("iterator"))
    }

    /// Positions at the first entry in the view.
    pub fn seek_to_first(&mut self) -> Result<()> {
        self.cursor_mut()?.seek_to_first();
        Ok(())
    }

    /// Positions at the last entry in the view.
    pub fn seek_to_last(&mut self) -> Result<()> {
        self.cursor_mut()?.seek_to_last();
        Ok(())
    }

    /// Positions at the first entry whose key is `>= key`.
    pub fn seek(&mut self, key: impl AsRef<[u8]>) -> Result<()> {
        self.cursor_mut()?.seek(key.as_ref());
        Ok(())
    }

    /// Advances to the next entry in ascending key order.
    ///
    /// # Errors
    ///
    /// `IteratorNotPositioned` when the iterator is unseeked or already
    /// exhausted.
    pub fn next(&mut self) -> Result<()> {
        let cursor = self.cursor_mut()?;
        if !cursor.valid() {
            return Err(Error::IteratorNotPositioned);
        }
        cursor.next();
        Ok(())
    }

    /// Steps back to the previous entry in descending key order.
    ///
    /// # Errors
    ///
    /// `IteratorNotPositioned` when the iterator is unseeked or already
    /// exhausted.
    pub fn prev(&mut self) -> Result<()> {
        let cursor = self.cursor_mut()?;
        if !cursor.valid() {
            return Err(Error::IteratorNotPositioned);
        }
        cursor.prev();
        Ok(())
    }

    /// True when positioned at an entry.
    pub fn valid(&self) -> Result<bool> {
        Ok(self.cursor()?.valid())
    }

    /// The key at the current position.
    pub fn key(&self) -> Result<Bytes> {
        self.cursor()?
            .key()
            .map_err(|_| Error::IteratorNotPositioned)
    }

    /// The value at the current position.
    pub fn value(&self) -> Result<Bytes> {
        self.cursor()?
            .value()
            .map_err(|_| Error::IteratorNotPositioned)
    }

    /// The key at the current position, decoded as UTF-8.
    pub fn key_str(&self) -> Result<String> {
        Ok(String::from_utf8(self.key()?.to_vec())?)
    }

    /// The value at the current position, decoded as UTF-8.
    pub fn value_str(&self) -> Result<String> {
        Ok(String::from_utf8(self.value()?.to_vec())?)
    }

    /// Releases the underlying cursor. Idempotent; after it every
    /// operation fails with `HandleDisposed`.
    pub fn close(&mut self) -> Result<()> {
        if self.state.begin_dispose() {
            // Dropping the cursor unpins its view.
            self.cursor.take();
        }
        Ok(())
    }
}

impl Drop for DbIterator {
    fn drop(&mut self) {
        if self.state.begin_dispose() {
            self.cursor.take();
        }
    }
}
