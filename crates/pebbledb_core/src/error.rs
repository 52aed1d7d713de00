//! Error types for the access layer.

use pebbledb_engine::EngineError;
use thiserror::Error;

/// Result type for access-layer operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors reported by the access layer.
///
/// Engine errors pass through verbatim; this layer never retries,
/// swallows, or rewords them. Its own errors cover exactly the hazards
/// it exists to catch: handles used after release and iterators read
/// while unpositioned.
#[derive(Debug, Error)]
pub enum Error {
    /// An error reported by the storage engine.
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// A handle was used after it was released.
    #[error("{resource} used after release")]
    HandleDisposed {
        /// The kind of handle that was misused.
        resource: &'static str,
    },

    /// An iterator's key or value was read while the iterator was not
    /// positioned at an entry.
    #[error("iterator is not positioned at an entry")]
    IteratorNotPositioned,

    /// A value requested as a string was not valid UTF-8.
    #[error("value is not valid UTF-8")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),
}

impl Error {
    /// Creates a handle-disposed error for the named resource.
    pub(crate) const fn disposed(resource: &'static str) -> Self {
        Self::HandleDisposed { resource }
    }
}
