//! Error types for the storage engine.

use std::io;
use thiserror::Error;

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors reported by the storage engine.
///
/// The access layer above surfaces these verbatim; the engine never
/// retries or downgrades an error into a best-guess recovery.
#[derive(Debug, Error)]
pub enum EngineError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The commit log is corrupted.
    #[error("corruption: {message}")]
    Corruption {
        /// Description of the corruption.
        message: String,
    },

    /// An argument was rejected (bad open options, oversized payload).
    #[error("invalid argument: {message}")]
    InvalidArgument {
        /// Description of the rejected argument.
        message: String,
    },

    /// The database handle has been closed.
    #[error("database is closed")]
    Closed,

    /// Another process holds the database lock.
    #[error("database is locked by another process")]
    Locked,

    /// A read referenced a snapshot that does not exist or was released.
    #[error("unknown snapshot")]
    UnknownSnapshot,

    /// A cursor's key or value was read while the cursor was not
    /// positioned at an entry.
    #[error("cursor is not positioned at a valid entry")]
    CursorNotValid,
}

impl EngineError {
    /// Creates a corruption error.
    pub fn corruption(message: impl Into<String>) -> Self {
        Self::Corruption {
            message: message.into(),
        }
    }

    /// Creates an invalid argument error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }
}
