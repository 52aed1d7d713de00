//! Handle-safe access layer for the PebbleDB storage engine.
//!
//! The engine in `pebbledb_engine` owns the real resources: the locked
//! database directory, the commit log, pinned snapshot views, cursors.
//! This crate wraps each of them in a handle with a uniform lifetime
//! rule: release exactly once, fail fast forever after.
//!
//! - [`Store`] owns the open database and is the single release point
//!   for it. [`Store::close`] is explicit and idempotent; drop reclaims
//!   the resources if close was never called.
//! - [`Snapshot`] pins an immutable point-in-time view; its release is
//!   routed through the owning store.
//! - [`DbIterator`] walks the ordered key space at a fixed view with an
//!   explicit seek-first discipline.
//! - [`WriteBatch`] is passive data applied atomically by
//!   [`Store::write`].
//!
//! Every handle checks a disposed flag before touching the engine, so a
//! use-after-release is a typed [`Error::HandleDisposed`] instead of
//! undefined behavior against freed native state.
//!
//! # Example
//!
//! ```no_run
//! use pebbledb_core::{Options, Store, WriteBatch};
//!
//! # fn main() -> pebbledb_core::Result<()> {
//! let store = Store::open("/tmp/cities", &Options::new().create_if_missing(true))?;
//!
//! let mut batch = WriteBatch::new();
//! batch.put("Tampa", "green").put("London", "red").delete("NA");
//! store.write(&batch)?;
//!
//! for entry in store.entries()? {
//!     let (key, value) = entry?;
//!     println!("{:?} => {:?}", key, value);
//! }
//!
//! store.close()?;
//! # Ok(())
//! # }
//! ```

mod batch;
mod error;
mod handle;
mod iterator;
mod options;
mod snapshot;
mod store;

pub use batch::WriteBatch;
pub use error::{Error, Result};
pub use iterator::DbIterator;
pub use options::{Options, ReadOptions, WriteOptions};
pub use snapshot::Snapshot;
pub use store::{Entries, Store};

pub use pebbledb_engine::{BatchOp, EngineError};
