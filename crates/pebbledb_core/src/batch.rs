//! Write batches.

use pebbledb_engine::BatchOp;

/// An ordered collection of writes applied atomically.
///
/// A batch is passive data: building one touches nothing until it is
/// handed to [`Store::write`](crate::Store::write), which applies all
/// its operations in insertion order under a single commit. When a
/// batch touches the same key more than once, the later operation wins.
///
/// Batches are reusable; a successful write does not consume or clear
/// them.
///
/// # Example
///
/// ```
/// use pebbledb_core::WriteBatch;
///
/// let mut batch = WriteBatch::new();
/// batch.put("Tampa", "green").delete("NA");
/// assert_eq!(batch.len(), 2);
/// ```
#[derive(Debug, Clone, Default)]
pub struct WriteBatch {
    ops: Vec<BatchOp>,
}

impl WriteBatch {
    /// Creates an empty batch.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a put of `key` to `value`.
    pub fn put(&mut self, key: impl AsRef<[u8]>, value: impl AsRef<[u8]>) -> &mut Self {
        self.ops.push(BatchOp::Put {
            key: key.as_ref().to_vec(),
            value: value.as_ref().to_vec(),
        });
        self
    }

    /// Appends a delete of `key`. Deleting an absent key is harmless.
    pub fn delete(&mut self, key: impl AsRef<[u8]>) -> &mut Self {
        self.ops.push(BatchOp::Delete {
            key: key.as_ref().to_vec(),
        });
        self
    }

    /// Removes all operations, keeping the batch usable.
    pub fn clear(&mut self) {
        self.ops.clear();
    }

    /// Number of operations in the batch.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// True when the batch holds no operations.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Iterates the operations in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &BatchOp> {
        self.ops.iter()
    }

    pub(crate) fn ops(&self) -> &[BatchOp] {
        &self.ops
    }
}
