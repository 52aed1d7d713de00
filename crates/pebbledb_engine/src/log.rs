//! Append-only commit log.
//!
//! Every committed batch is appended as one record before it becomes
//! visible in the table. Replaying the log in file order reconstructs
//! the table after a restart.
//!
//! ## Record format
//!
//! ```text
//! | magic (4) | version (2) | length (4) | payload (N) | crc32 (4) |
//! ```
//!
//! ## Recovery policy
//!
//! Replay distinguishes tolerated from fatal conditions:
//!
//! - **Truncated record at the tail** (header, payload, or checksum cut
//!   short): treated as a clean end of log. This is a crash mid-write;
//!   the partial tail is discarded and the file truncated back to the
//!   last complete record.
//! - **Checksum mismatch, bad magic, unsupported version, undecodable
//!   payload**: actual corruption. Open refuses to proceed so data loss
//!   is never silent; `repair` is the explicit salvage path.

use crate::error::{EngineError, EngineResult};
use crate::record::{compute_crc32, LogRecord, LOG_MAGIC, LOG_VERSION};
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::warn;

/// Envelope header size: magic (4) + version (2) + length (4).
const HEADER_SIZE: usize = 10;

/// CRC size.
const CRC_SIZE: usize = 4;

/// Outcome of decoding a log image.
#[derive(Debug)]
pub(crate) struct Replay {
    /// Records decoded, in file order.
    pub records: Vec<LogRecord>,
    /// Bytes of the image that held complete records.
    pub valid_len: u64,
}

/// The append-only commit log file.
///
/// Not internally synchronized; the database serializes access through
/// its commit lock.
#[derive(Debug)]
pub(crate) struct CommitLog {
    path: PathBuf,
    file: File,
    size: u64,
}

impl CommitLog {
    /// Opens or creates the log file at `path`.
    pub fn open(path: &Path) -> EngineResult<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;
        let size = file.metadata()?.len();
        Ok(Self {
            path: path.to_path_buf(),
            file,
            size,
        })
    }

    /// Replays all records, applying the strict recovery policy.
    ///
    /// A truncated tail is discarded and the file truncated back to the
    /// last complete record; mid-log corruption is a fatal error.
    pub fn replay(&mut self) -> EngineResult<Vec<LogRecord>> {
        let mut data = Vec::new();
        self.file.seek(SeekFrom::Start(0))?;
        self.file.read_to_end(&mut data)?;

        let replay = decode_image(&data, false)?;
        if replay.valid_len < self.size {
            warn!(
                dropped_bytes = self.size - replay.valid_len,
                "discarding truncated record at log tail"
            );
            self.file.set_len(replay.valid_len)?;
            self.size = replay.valid_len;
        }
        self.file.seek(SeekFrom::End(0))?;
        Ok(replay.records)
    }

    /// Appends one record, optionally fsyncing before returning.
    pub fn append(&mut self, record: &LogRecord, sync: bool) -> EngineResult<()> {
        let data = encode_record(record)?;
        self.file.write_all(&data)?;
        if sync {
            self.file.sync_data()?;
        }
        self.size += data.len() as u64;
        Ok(())
    }

    /// Current log size in bytes.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Flushes and syncs all appended data to durable storage.
    pub fn sync(&mut self) -> EngineResult<()> {
        self.file.flush()?;
        self.file.sync_all()?;
        Ok(())
    }

    /// Replaces the log contents with `records` atomically.
    ///
    /// Writes to `temp_path`, syncs, then renames over the live log.
    /// The caller fsyncs the containing directory afterwards.
    pub fn rewrite(&mut self, temp_path: &Path, records: &[LogRecord]) -> EngineResult<()> {
        let mut temp = File::create(temp_path)?;
        let mut written = 0u64;
        for record in records {
            let data = encode_record(record)?;
            temp.write_all(&data)?;
            written += data.len() as u64;
        }
        temp.sync_all()?;
        drop(temp);

        std::fs::rename(temp_path, &self.path)?;

        // The old handle still points at the unlinked file; reopen.
        self.file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&self.path)?;
        self.file.seek(SeekFrom::End(0))?;
        self.size = written;
        Ok(())
    }
}

/// Serializes one record with its envelope.
pub(crate) fn encode_record(record: &LogRecord) -> EngineResult<Vec<u8>> {
    let payload = record.encode_payload()?;

    let mut data = Vec::with_capacity(HEADER_SIZE + payload.len() + CRC_SIZE);
    data.extend_from_slice(&LOG_MAGIC);
    data.extend_from_slice(&LOG_VERSION.to_le_bytes());
    let len = u32::try_from(payload.len())
        .map_err(|_| EngineError::invalid_argument("log record payload too large"))?;
    data.extend_from_slice(&len.to_le_bytes());
    data.extend_from_slice(&payload);

    let crc = compute_crc32(&data);
    data.extend_from_slice(&crc.to_le_bytes());
    Ok(data)
}

/// Decodes a full log image.
///
/// With `lenient` set, any malformed record ends the scan instead of
/// failing; this is the salvage mode used by repair.
pub(crate) fn decode_image(data: &[u8], lenient: bool) -> EngineResult<Replay> {
    let mut records = Vec::new();
    let mut offset = 0usize;

    while offset < data.len() {
        let remaining = &data[offset..];
        if remaining.len() < HEADER_SIZE {
            // Truncated header at the tail: clean end of log.
            break;
        }

        if remaining[..4] != LOG_MAGIC {
            if lenient {
                break;
            }
            return Err(EngineError::corruption(format!(
                "bad record magic at offset {offset}"
            )));
        }

        let version = u16::from_le_bytes([remaining[4], remaining[5]]);
        if version != LOG_VERSION {
            if lenient {
                break;
            }
            return Err(EngineError::corruption(format!(
                "unsupported log version {version} at offset {offset}"
            )));
        }

        let len = u32::from_le_bytes([remaining[6], remaining[7], remaining[8], remaining[9]])
            as usize;
        let total = HEADER_SIZE + len + CRC_SIZE;
        if remaining.len() < total {
            // Truncated payload or checksum: clean end of log.
            break;
        }

        let stored = u32::from_le_bytes([
            remaining[HEADER_SIZE + len],
            remaining[HEADER_SIZE + len + 1],
            remaining[HEADER_SIZE + len + 2],
            remaining[HEADER_SIZE + len + 3],
        ]);
        let computed = compute_crc32(&remaining[..HEADER_SIZE + len]);
        if stored != computed {
            if lenient {
                break;
            }
            return Err(EngineError::corruption(format!(
                "checksum mismatch at offset {offset}: expected {stored:08x}, got {computed:08x}"
            )));
        }

        match LogRecord::decode_payload(&remaining[HEADER_SIZE..HEADER_SIZE + len]) {
            Ok(record) => records.push(record),
            Err(e) => {
                if lenient {
                    break;
                }
                return Err(e);
            }
        }

        offset += total;
    }

    Ok(Replay {
        records,
        valid_len: offset as u64,
    })
}
