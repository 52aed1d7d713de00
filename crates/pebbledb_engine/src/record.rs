//! Commit log records and serialization.

use crate::error::{EngineError, EngineResult};

/// Magic bytes identifying a commit log record.
pub const LOG_MAGIC: [u8; 4] = *b"PBLG";

/// Current commit log format version.
pub const LOG_VERSION: u16 = 1;

/// Op tag byte for a put.
const TAG_PUT: u8 = 1;
/// Op tag byte for a delete.
const TAG_DELETE: u8 = 2;

/// A single operation within a committed batch.
///
/// Keys and values are raw byte strings; the engine attaches no meaning
/// to their contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOp {
    /// Set `key` to `value`.
    Put {
        /// The key to set.
        key: Vec<u8>,
        /// The value to store. May be empty; an empty value is still a
        /// present entry, distinct from an absent key.
        value: Vec<u8>,
    },
    /// Remove `key` if present. Deleting an absent key is a no-op.
    Delete {
        /// The key to remove.
        key: Vec<u8>,
    },
}

impl BatchOp {
    /// Returns the key this operation targets.
    #[must_use]
    pub fn key(&self) -> &[u8] {
        match self {
            Self::Put { key, .. } | Self::Delete { key } => key,
        }
    }
}

/// One committed batch: a sequence number and its operations in
/// insertion order.
///
/// A standalone put or delete is a batch of one. Replaying records in
/// file order reconstructs the table, later operations on the same key
/// shadowing earlier ones.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    /// Sequence number assigned to the whole batch.
    pub seqno: u64,
    /// Operations in the exact order they were recorded.
    pub ops: Vec<BatchOp>,
}

impl LogRecord {
    /// Maximum size for a single key or value.
    ///
    /// The log format uses 4-byte length fields; larger payloads would
    /// produce records that cannot be decoded.
    pub const MAX_PAYLOAD_SIZE: usize = u32::MAX as usize;

    /// Serializes the record payload (without envelope).
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if any key or value exceeds
    /// [`Self::MAX_PAYLOAD_SIZE`].
    pub fn encode_payload(&self) -> EngineResult<Vec<u8>> {
        let mut buf = Vec::new();
        buf.extend_from_slice(&self.seqno.to_le_bytes());

        let count = u32::try_from(self.ops.len()).map_err(|_| {
            EngineError::invalid_argument("too many operations in one batch")
        })?;
        buf.extend_from_slice(&count.to_le_bytes());

        for op in &self.ops {
            match op {
                BatchOp::Put { key, value } => {
                    buf.push(TAG_PUT);
                    encode_bytes(&mut buf, key)?;
                    encode_bytes(&mut buf, value)?;
                }
                BatchOp::Delete { key } => {
                    buf.push(TAG_DELETE);
                    encode_bytes(&mut buf, key)?;
                }
            }
        }

        Ok(buf)
    }

    /// Deserializes a record from its payload.
    pub fn decode_payload(payload: &[u8]) -> EngineResult<Self> {
        let mut cursor = 0;

        let seqno = read_u64(payload, &mut cursor)?;
        let count = read_u32(payload, &mut cursor)? as usize;

        let mut ops = Vec::with_capacity(count.min(1024));
        for _ in 0..count {
            if cursor >= payload.len() {
                return Err(EngineError::corruption("unexpected end of payload"));
            }
            let tag = payload[cursor];
            cursor += 1;
            match tag {
                TAG_PUT => {
                    let key = read_bytes(payload, &mut cursor)?;
                    let value = read_bytes(payload, &mut cursor)?;
                    ops.push(BatchOp::Put { key, value });
                }
                TAG_DELETE => {
                    let key = read_bytes(payload, &mut cursor)?;
                    ops.push(BatchOp::Delete { key });
                }
                other => {
                    return Err(EngineError::corruption(format!(
                        "unknown operation tag: {other}"
                    )));
                }
            }
        }

        if cursor != payload.len() {
            return Err(EngineError::corruption(format!(
                "trailing bytes in record: expected {} bytes, got {}",
                cursor,
                payload.len()
            )));
        }

        Ok(Self { seqno, ops })
    }
}

fn encode_bytes(buf: &mut Vec<u8>, data: &[u8]) -> EngineResult<()> {
    let len = u32::try_from(data.len()).map_err(|_| {
        EngineError::invalid_argument(format!(
            "payload too large: {} bytes exceeds maximum of {} bytes",
            data.len(),
            LogRecord::MAX_PAYLOAD_SIZE
        ))
    })?;
    buf.extend_from_slice(&len.to_le_bytes());
    buf.extend_from_slice(data);
    Ok(())
}

fn read_u64(payload: &[u8], cursor: &mut usize) -> EngineResult<u64> {
    if *cursor + 8 > payload.len() {
        return Err(EngineError::corruption("unexpected end of payload"));
    }
    let bytes: [u8; 8] = payload[*cursor..*cursor + 8]
        .try_into()
        .map_err(|_| EngineError::corruption("invalid u64"))?;
    *cursor += 8;
    Ok(u64::from_le_bytes(bytes))
}

fn read_u32(payload: &[u8], cursor: &mut usize) -> EngineResult<u32> {
    if *cursor + 4 > payload.len() {
        return Err(EngineError::corruption("unexpected end of payload"));
    }
    let bytes: [u8; 4] = payload[*cursor..*cursor + 4]
        .try_into()
        .map_err(|_| EngineError::corruption("invalid u32"))?;
    *cursor += 4;
    Ok(u32::from_le_bytes(bytes))
}

fn read_bytes(payload: &[u8], cursor: &mut usize) -> EngineResult<Vec<u8>> {
    let len = read_u32(payload, cursor)? as usize;
    if *cursor + len > payload.len() {
        return Err(EngineError::corruption("unexpected end of byte string"));
    }
    let data = payload[*cursor..*cursor + len].to_vec();
    *cursor += len;
    Ok(data)
}

/// Computes CRC32 checksum for data (IEEE polynomial).
pub fn compute_crc32(data: &[u8]) -> u32 {
    const CRC32_TABLE: [u32; 256] = {
        let mut table = [0u32; 256];
        let mut i = 0;
        while i < 256 {
            let mut crc = i as u32;
            let mut j = 0;
            while j < 8 {
                if crc & 1 != 0 {
                    crc = (crc >> 1) ^ 0xEDB8_8320;
                } else {
                    crc >>= 1;
                }
                j += 1;
            }
            table[i] = crc;
            i += 1;
        }
        table
    };

    let mut crc = 0xFFFF_FFFF_u32;
    for &byte in data {
        let index = ((crc ^ u32::from(byte)) & 0xFF) as usize;
        crc = (crc >> 8) ^ CRC32_TABLE[index];
    }
    !crc
}
