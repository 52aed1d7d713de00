//! Database handle and recovery.

use crate::cursor::Cursor;
use crate::dir::EngineDir;
use crate::error::{EngineError, EngineResult};
use crate::log::CommitLog;
use crate::record::{BatchOp, LogRecord};
use crate::snapshot::{SnapshotId, SnapshotTracker};
use crate::table::Table;
use bytes::Bytes;
use parking_lot::{Mutex, RwLock};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Property name prefix recognized by [`Db::property_value`].
const PROPERTY_PREFIX: &str = "pebbledb.";

/// Options controlling how a database is opened.
#[derive(Debug, Clone, Default)]
pub struct OpenOptions {
    /// Create the database directory if it doesn't exist.
    pub create_if_missing: bool,
    /// Fail if a database already exists at the path.
    pub error_if_exists: bool,
}

impl OpenOptions {
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

    /// Sets whether to error if the database exists.
    #[must_use]
    pub const fn error_if_exists(mut self, value: bool) -> Self {
        self.error_if_exists = value;
        self
    }
}

/// State shared between the database handle and its cursors.
#[derive(Debug)]
pub(crate) struct DbShared {
    pub(crate) table: RwLock<Table>,
    pub(crate) snapshots: SnapshotTracker,
    log: Mutex<CommitLog>,
    dir: Mutex<Option<EngineDir>>,
    closed: AtomicBool,
}

/// An open database.
///
/// `Db` is safe for concurrent use from multiple threads; writes are
/// serialized on the table lock and reads share it. Every operation is
/// synchronous and blocks until the engine responds.
#[derive(Debug)]
pub struct Db {
    shared: Arc<DbShared>,
}

impl Db {
    /// Opens a database at `path`, replaying the commit log.
    ///
    /// # Errors
    ///
    /// - `InvalidArgument` if the directory is missing and
    ///   `create_if_missing` is false, or holds a database and
    ///   `error_if_exists` is true
    /// - `Locked` if another process has the database open
    /// - `Corruption` if the log fails its checks (see `repair`)
    pub fn open(path: &Path, options: &OpenOptions) -> EngineResult<Self> {
        let dir = EngineDir::open(path, options.create_if_missing)?;

        if options.error_if_exists && !dir.is_new_database() {
            return Err(EngineError::invalid_argument(format!(
                "database already exists: {}",
                path.display()
            )));
        }

        let mut log = CommitLog::open(&dir.log_path())?;
        let records = log.replay()?;

        let mut table = Table::new();
        let mut latest_seqno = 0;
        for record in &records {
            table.apply(record.seqno, &record.ops);
            latest_seqno = latest_seqno.max(record.seqno);
        }

        let snapshots = SnapshotTracker::new();
        snapshots.set_latest_seqno(latest_seqno);

        info!(
            path = %path.display(),
            records = records.len(),
            latest_seqno,
            "opened database"
        );

        Ok(Self {
            shared: Arc::new(DbShared {
                table: RwLock::new(table),
                snapshots,
                log: Mutex::new(log),
                dir: Mutex::new(Some(dir)),
                closed: AtomicBool::new(false),
            }),
        })
    }

    fn ensure_open(&self) -> EngineResult<()> {
        if self.shared.closed.load(Ordering::SeqCst) {
            return Err(EngineError::Closed);
        }
        Ok(())
    }

    /// Closes the database: syncs the log and releases the directory
    /// lock. Idempotent; later calls return `Ok` without effect.
    pub fn close(&self) -> EngineResult<()> {
        if self.shared.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.shared.log.lock().sync()?;
        self.shared.dir.lock().take();
        info!("closed database");
        Ok(())
    }

    /// Sets `key` to `value`.
    pub fn put(&self, key: &[u8], value: &[u8], sync: bool) -> EngineResult<()> {
        self.commit(
            vec![BatchOp::Put {
                key: key.to_vec(),
                value: value.to_vec(),
            }],
            sync,
        )
    }

    /// Removes `key` if present; removing an absent key succeeds.
    pub fn delete(&self, key: &[u8], sync: bool) -> EngineResult<()> {
        self.commit(vec![BatchOp::Delete { key: key.to_vec() }], sync)
    }

    /// Applies an ordered batch atomically under one sequence number.
    ///
    /// Either the whole batch becomes visible or, on failure, none of
    /// it does; no reader observes a partially applied batch.
    pub fn apply(&self, ops: &[BatchOp], sync: bool) -> EngineResult<()> {
        if ops.is_empty() {
            return self.ensure_open();
        }
        self.commit(ops.to_vec(), sync)
    }

    fn commit(&self, ops: Vec<BatchOp>, sync: bool) -> EngineResult<()> {
        self.ensure_open()?;

        // The table write lock doubles as the commit lock: the log
        // append and the table apply happen under it as a unit, so the
        // batch is durable before any reader can see it.
        let mut table = self.shared.table.write();
        let seqno = self.shared.snapshots.latest_seqno() + 1;
        let record = LogRecord { seqno, ops };
        self.shared.log.lock().append(&record, sync)?;
        table.apply(seqno, &record.ops);
        self.shared.snapshots.set_latest_seqno(seqno);
        debug!(seqno, ops = record.ops.len(), "committed batch");
        Ok(())
    }

    /// Looks up `key` at the given snapshot, or the latest state when
    /// `snapshot` is `None`.
    ///
    /// Absence is `Ok(None)`, never an error. An empty stored value
    /// comes back as `Some` with a zero-length buffer.
    pub fn get(&self, key: &[u8], snapshot: Option<SnapshotId>) -> EngineResult<Option<Bytes>> {
        self.ensure_open()?;
        let seqno = self.shared.snapshots.resolve(snapshot)?;
        let table = self.shared.table.read();
        Ok(table.get(key, seqno).map(Bytes::copy_from_slice))
    }

    /// Creates an unseeked cursor over the given view.
    ///
    /// Without a snapshot the cursor pins an implicit view at creation
    /// time, so it never observes commits that land after it was made.
    pub fn cursor(&self, snapshot: Option<SnapshotId>) -> EngineResult<Cursor> {
        self.ensure_open()?;
        let seqno = self.shared.snapshots.resolve(snapshot)?;
        let pin = self.shared.snapshots.pin_at(seqno);
        Ok(Cursor::new(Arc::clone(&self.shared), seqno, pin))
    }

    /// Pins the current state and returns its snapshot identifier.
    pub fn snapshot(&self) -> EngineResult<SnapshotId> {
        self.ensure_open()?;
        Ok(self.shared.snapshots.pin_latest())
    }

    /// Releases a snapshot. Unknown or already-released identifiers are
    /// ignored; the operation is purely in-memory and is permitted even
    /// on a closed handle so teardown paths cannot fail.
    pub fn release_snapshot(&self, id: SnapshotId) {
        self.shared.snapshots.unpin(id);
    }

    /// Answers a diagnostic property query, or `None` for unrecognized
    /// names.
    ///
    /// Recognized names: `pebbledb.num-entries`, `pebbledb.num-snapshots`,
    /// `pebbledb.log-size`, `pebbledb.approximate-memory-usage`,
    /// `pebbledb.stats`.
    pub fn property_value(&self, name: &str) -> EngineResult<Option<String>> {
        self.ensure_open()?;
        let Some(suffix) = name.strip_prefix(PROPERTY_PREFIX) else {
            return Ok(None);
        };

        let latest = self.shared.snapshots.latest_seqno();
        let table = self.shared.table.read();
        let value = match suffix {
            "num-entries" => table.visible_len(latest).to_string(),
            "num-snapshots" => self.shared.snapshots.pinned_count().to_string(),
            "log-size" => self.shared.log.lock().size().to_string(),
            "approximate-memory-usage" => table.memory_usage().to_string(),
            "stats" => format!(
                "Entries: {}\nRetained versions: {}\nLive snapshots: {}\nLatest seqno: {}\nLog bytes: {}\nApprox memory: {}\n",
                table.visible_len(latest),
                table.version_count(),
                self.shared.snapshots.pinned_count(),
                latest,
                self.shared.log.lock().size(),
                table.memory_usage(),
            ),
            _ => return Ok(None),
        };
        Ok(Some(value))
    }

    /// Compacts `[start, limit)`; `None` bounds are open-ended.
    ///
    /// Drops shadowed versions no pinned snapshot or live cursor can
    /// still observe, then checkpoints the log to the surviving state.
    /// Synchronous and not cancellable; may block for a while.
    pub fn compact_range(
        &self,
        start: Option<&[u8]>,
        limit: Option<&[u8]>,
    ) -> EngineResult<()> {
        self.ensure_open()?;

        let mut table = self.shared.table.write();
        let min_pinned = self.shared.snapshots.min_pinned_seqno();
        let latest = self.shared.snapshots.latest_seqno();
        let dropped = table.compact(start, limit, min_pinned);

        // Checkpoint: the log becomes a single record carrying the
        // visible state. Pinned history is memory-only and does not
        // survive a restart, so the checkpoint needs nothing older.
        let ops: Vec<BatchOp> = table
            .visible_entries(latest)
            .into_iter()
            .map(|(key, value)| BatchOp::Put { key, value })
            .collect();
        let record = LogRecord { seqno: latest, ops };

        let dir_guard = self.shared.dir.lock();
        let dir = dir_guard.as_ref().ok_or(EngineError::Closed)?;
        self.shared
            .log
            .lock()
            .rewrite(&dir.log_temp_path(), &[record])?;
        dir.sync_directory()?;

        info!(dropped_versions = dropped, "compacted range");
        Ok(())
    }

    /// Best-effort byte estimate for keys in `[start, limit)`.
    ///
    /// May undercount very recent writes.
    pub fn approximate_size(&self, start: &[u8], limit: &[u8]) -> EngineResult<u64> {
        self.ensure_open()?;
        let latest = self.shared.snapshots.latest_seqno();
        let table = self.shared.table.read();
        Ok(table.approximate_size(Some(start), Some(limit), latest))
    }

    /// Salvages as much of a database as possible without opening it.
    ///
    /// Scans the commit log, keeps the longest valid record prefix, and
    /// rewrites the log atomically. Data after the first bad record of
    /// any kind is lost.
    pub fn repair(path: &Path, options: &OpenOptions) -> EngineResult<()> {
        let dir = EngineDir::open(path, options.create_if_missing)?;
        let log_path = dir.log_path();
        if !log_path.exists() {
            return Ok(());
        }

        let data = std::fs::read(&log_path)?;
        let replay = crate::log::decode_image(&data, true)?;
        let dropped = data.len() as u64 - replay.valid_len;

        let mut log = CommitLog::open(&log_path)?;
        log.rewrite(&dir.log_temp_path(), &replay.records)?;
        dir.sync_directory()?;

        if dropped > 0 {
            warn!(
                path = %path.display(),
                records = replay.records.len(),
                dropped_bytes = dropped,
                "repaired database, dropping unrecoverable tail"
            );
        }
        Ok(())
    }

    /// Destroys the database at `path`, removing its files.
    ///
    /// A missing directory is a no-op success. Fails with `Locked` when
    /// another process has the database open.
    pub fn destroy(path: &Path, _options: &OpenOptions) -> EngineResult<()> {
        if !path.exists() {
            return Ok(());
        }
        let dir = EngineDir::open(path, false)?;
        dir.remove_all()?;
        info!(path = %path.display(), "destroyed database");
        Ok(())
    }
}

impl Drop for Db {
    fn drop(&mut self) {
        // Last-resort release of the native resources; errors here have
        // nowhere to go.
        let _ = self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn open_temp(path: &Path) -> Db {
        Db::open(path, &OpenOptions::new().create_if_missing(true)).unwrap()
    }

    #[test]
    fn open_requires_create_flag_for_new_path() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("db");

        let result = Db::open(&path, &OpenOptions::new());
        assert!(matches!(result, Err(EngineError::InvalidArgument { .. })));
    }

    #[test]
    fn error_if_exists_rejects_existing_database() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("db");

        let db = open_temp(&path);
        db.put(b"k", b"v", false).unwrap();
        db.close().unwrap();

        let result = Db::open(
            &path,
            &OpenOptions::new().create_if_missing(true).error_if_exists(true),
        );
        assert!(matches!(result, Err(EngineError::InvalidArgument { .. })));
    }

    #[test]
    fn put_get_delete_roundtrip() {
        let temp = tempdir().unwrap();
        let db = open_temp(&temp.path().join("db"));

        db.put(b"k", b"v", false).unwrap();
        assert_eq!(db.get(b"k", None).unwrap().unwrap().as_ref(), b"v");

        db.delete(b"k", false).unwrap();
        assert_eq!(db.get(b"k", None).unwrap(), None);

        // Deleting an absent key is fine.
        db.delete(b"k", false).unwrap();
    }

    #[test]
    fn state_survives_reopen() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("db");

        let db = open_temp(&path);
        db.put(b"a", b"1", false).unwrap();
        db.put(b"b", b"2", true).unwrap();
        db.delete(b"a", true).unwrap();
        db.close().unwrap();
        drop(db);

        let db = Db::open(&path, &OpenOptions::new()).unwrap();
        assert_eq!(db.get(b"a", None).unwrap(), None);
        assert_eq!(db.get(b"b", None).unwrap().unwrap().as_ref(), b"2");
    }

    #[test]
    fn snapshot_pins_view() {
        let temp = tempdir().unwrap();
        let db = open_temp(&temp.path().join("db"));

        db.put(b"k", b"old", false).unwrap();
        let snap = db.snapshot().unwrap();
        db.put(b"k", b"new", false).unwrap();
        db.put(b"fresh", b"x", false).unwrap();

        assert_eq!(db.get(b"k", Some(snap)).unwrap().unwrap().as_ref(), b"old");
        assert_eq!(db.get(b"fresh", Some(snap)).unwrap(), None);
        assert_eq!(db.get(b"k", None).unwrap().unwrap().as_ref(), b"new");

        db.release_snapshot(snap);
        assert!(matches!(
            db.get(b"k", Some(snap)),
            Err(EngineError::UnknownSnapshot)
        ));
    }

    #[test]
    fn cursor_iterates_fixed_view() {
        let temp = tempdir().unwrap();
        let db = open_temp(&temp.path().join("db"));

        db.put(b"a", b"1", false).unwrap();
        db.put(b"c", b"3", false).unwrap();

        let mut cursor = db.cursor(None).unwrap();
        assert!(!cursor.valid());
        // The cursor's implicit view ignores this later write.
        db.put(b"b", b"2", false).unwrap();

        cursor.seek_to_first();
        let mut keys = Vec::new();
        while cursor.valid() {
            keys.push(cursor.key().unwrap());
            cursor.next();
        }
        assert_eq!(keys, vec![Bytes::from("a"), Bytes::from("c")]);

        assert!(matches!(cursor.key(), Err(EngineError::CursorNotValid)));
    }

    #[test]
    fn cursor_prev_walks_backward() {
        let temp = tempdir().unwrap();
        let db = open_temp(&temp.path().join("db"));

        db.put(b"a", b"1", false).unwrap();
        db.put(b"b", b"2", false).unwrap();

        let mut cursor = db.cursor(None).unwrap();
        cursor.seek_to_last();
        assert_eq!(cursor.key().unwrap(), Bytes::from("b"));
        cursor.prev();
        assert_eq!(cursor.key().unwrap(), Bytes::from("a"));
        cursor.prev();
        assert!(!cursor.valid());
    }

    #[test]
    fn batch_is_atomic_and_ordered() {
        let temp = tempdir().unwrap();
        let db = open_temp(&temp.path().join("db"));

        db.put(b"NA", b"Na", false).unwrap();
        db.apply(
            &[
                BatchOp::Delete { key: b"NA".to_vec() },
                BatchOp::Put {
                    key: b"Tampa".to_vec(),
                    value: b"Green".to_vec(),
                },
                BatchOp::Put {
                    key: b"Tampa".to_vec(),
                    value: b"Gold".to_vec(),
                },
            ],
            false,
        )
        .unwrap();

        assert_eq!(db.get(b"NA", None).unwrap(), None);
        // The later op on the same key wins.
        assert_eq!(db.get(b"Tampa", None).unwrap().unwrap().as_ref(), b"Gold");
    }

    #[test]
    fn close_is_idempotent_and_fatal_to_use() {
        let temp = tempdir().unwrap();
        let db = open_temp(&temp.path().join("db"));

        db.close().unwrap();
        db.close().unwrap();
        assert!(matches!(db.get(b"k", None), Err(EngineError::Closed)));
        assert!(matches!(db.put(b"k", b"v", false), Err(EngineError::Closed)));
    }

    #[test]
    fn close_releases_directory_lock() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("db");

        let db = open_temp(&path);
        db.put(b"k", b"v", false).unwrap();
        db.close().unwrap();

        // Reopening while the first handle is still alive must work.
        let db2 = Db::open(&path, &OpenOptions::new()).unwrap();
        assert_eq!(db2.get(b"k", None).unwrap().unwrap().as_ref(), b"v");
    }

    #[test]
    fn properties_answer_known_names_only() {
        let temp = tempdir().unwrap();
        let db = open_temp(&temp.path().join("db"));

        db.put(b"k", b"v", false).unwrap();
        assert_eq!(
            db.property_value("pebbledb.num-entries").unwrap().unwrap(),
            "1"
        );
        let stats = db.property_value("pebbledb.stats").unwrap().unwrap();
        assert!(stats.contains("Entries: 1"));
        assert_eq!(db.property_value("pebbledb.bogus").unwrap(), None);
        assert_eq!(db.property_value("other.num-entries").unwrap(), None);
    }

    #[test]
    fn compact_preserves_visible_state_across_reopen() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("db");

        let db = open_temp(&path);
        for i in 0..10u32 {
            db.put(b"k", format!("v{i}").as_bytes(), false).unwrap();
        }
        db.put(b"other", b"x", false).unwrap();
        db.delete(b"other", false).unwrap();

        db.compact_range(None, None).unwrap();
        assert_eq!(db.get(b"k", None).unwrap().unwrap().as_ref(), b"v9");
        let log_size: u64 = db
            .property_value("pebbledb.log-size")
            .unwrap()
            .unwrap()
            .parse()
            .unwrap();
        db.close().unwrap();
        drop(db);

        let db = Db::open(&path, &OpenOptions::new()).unwrap();
        assert_eq!(db.get(b"k", None).unwrap().unwrap().as_ref(), b"v9");
        assert_eq!(db.get(b"other", None).unwrap(), None);
        assert!(log_size > 0);
    }

    #[test]
    fn compact_keeps_versions_snapshots_need() {
        let temp = tempdir().unwrap();
        let db = open_temp(&temp.path().join("db"));

        db.put(b"k", b"old", false).unwrap();
        let snap = db.snapshot().unwrap();
        db.put(b"k", b"new", false).unwrap();

        db.compact_range(None, None).unwrap();
        assert_eq!(db.get(b"k", Some(snap)).unwrap().unwrap().as_ref(), b"old");
        db.release_snapshot(snap);
    }

    #[test]
    fn approximate_size_reflects_data() {
        let temp = tempdir().unwrap();
        let db = open_temp(&temp.path().join("db"));

        db.put(b"a", &[0u8; 100], false).unwrap();
        db.put(b"b", &[0u8; 100], false).unwrap();
        let size = db.approximate_size(b"a", b"z").unwrap();
        assert!(size >= 200);
        assert_eq!(db.approximate_size(b"x", b"z").unwrap(), 0);
    }

    #[test]
    fn repair_salvages_valid_prefix() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("db");

        let db = open_temp(&path);
        db.put(b"good", b"1", true).unwrap();
        db.close().unwrap();
        drop(db);

        // Corrupt the tail with garbage bytes.
        let log_path = path.join("LOG");
        let mut data = std::fs::read(&log_path).unwrap();
        data.extend_from_slice(b"\xDE\xAD\xBE\xEFgarbage");
        std::fs::write(&log_path, &data).unwrap();

        Db::repair(&path, &OpenOptions::new()).unwrap();

        let db = Db::open(&path, &OpenOptions::new()).unwrap();
        assert_eq!(db.get(b"good", None).unwrap().unwrap().as_ref(), b"1");
    }

    #[test]
    fn destroy_removes_database() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("db");

        let db = open_temp(&path);
        db.put(b"k", b"v", false).unwrap();
        db.close().unwrap();
        drop(db);

        Db::destroy(&path, &OpenOptions::new()).unwrap();
        assert!(!path.exists());

        // Destroying a missing database is a no-op.
        Db::destroy(&path, &OpenOptions::new()).unwrap();
    }

    #[test]
    fn destroy_fails_while_open() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("db");

        let _db = open_temp(&path);
        assert!(matches!(
            Db::destroy(&path, &OpenOptions::new()),
            Err(EngineError::Locked)
        ));
    }
}
