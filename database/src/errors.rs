use crate::prelude::DbKey;
use echomint_types::Height;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("key {0} not found in store")]
    KeyNotFound(DbKey),

    #[error("no sub-store named {0} is registered")]
    UnknownSubStore(String),

    #[error("write issued with no active write height")]
    NoActiveWriteHeight,

    #[error("a batch is already open at height {0}")]
    BatchAlreadyOpen(Height),

    #[error("flush of batch at height {height} failed: {reason}")]
    FlushFailed { height: Height, reason: String },

    #[error("data inconsistency: {0}")]
    DataInconsistency(String),

    #[error("rocksdb error {0}")]
    DbError(#[from] rocksdb::Error),

    #[error("bincode error {0}")]
    DeserializationError(#[from] Box<bincode::ErrorKind>),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Extension methods for store results
pub trait StoreResultExtensions<T> {
    /// Converts a "key not found" error into absence:
    /// `Ok(v)` -> `Ok(Some(v))`, `Err(KeyNotFound)` -> `Ok(None)`,
    /// any other `Err(e)` -> `Err(e)`
    fn optional(self) -> StoreResult<Option<T>>;
}

impl<T> StoreResultExtensions<T> for StoreResult<T> {
    fn optional(self) -> StoreResult<Option<T>> {
        match self {
            Ok(value) => Ok(Some(value)),
            Err(StoreError::KeyNotFound(_)) => Ok(None),
            Err(err) => Err(err),
        }
    }
}
