use std::io;

use thiserror::Error;

/// Stable error taxonomy of the store.
#[derive(Error, Debug)]
pub enum KvError {
    /// Key absent in a lookup or deletion, or no store at the given path.
    #[error("key not found")]
    NotFound,

    /// Reserved for value validation; values are fixed-width today, so this
    /// is never produced.
    #[error("bad value")]
    BadValue,

    /// A key was inserted twice.
    #[error("duplicate key")]
    DuplicateKey,

    /// The requested store size is zero or exceeds the configured maximum.
    #[error("'size' is out of range")]
    OutOfRange,

    /// The store path is empty or not usable.
    #[error("'path' is not valid")]
    InvalidPath,

    /// I/O or codec failure, or buffer pool saturation.
    #[error("internal error: {0}")]
    Internal(String),
}

pub type KvResult<T> = Result<T, KvError>;

impl From<io::Error> for KvError {
    fn from(e: io::Error) -> Self {
        KvError::Internal(e.to_string())
    }
}
