//! Embedded ordered key-value storage engine.
//!
//! The engine keeps the full key space in an ordered in-memory table and
//! makes every committed batch durable in an append-only commit log
//! before it becomes visible. Multi-version storage gives snapshots and
//! cursors a stable view: each commit gets a sequence number, reads
//! resolve against one, and compaction only reclaims versions no live
//! pin can still observe.
//!
//! This crate is the resource-owning half of the database; the access
//! layer in `pebbledb_core` wraps it with handle lifetime rules.
//!
//! # Example
//!
//! ```no_run
//! use pebbledb_engine::{Db, OpenOptions};
//!
//! # fn main() -> pebbledb_engine::EngineResult<()> {
//! let db = Db::open(
//!     std::path::Path::new("/tmp/demo-db"),
//!     &OpenOptions::new().create_if_missing(true),
//! )?;
//! db.put(b"key", b"value", false)?;
//! assert!(db.get(b"key", None)?.is_some());
//! db.close()?;
//! # Ok(())
//! # }
//! ```

mod cursor;
mod db;
mod dir;
mod error;
mod log;
mod record;
mod snapshot;
mod table;

pub use cursor::Cursor;
pub use db::{Db, OpenOptions};
pub use error::{EngineError, EngineResult};
pub use record::BatchOp;
pub use snapshot::SnapshotId;
