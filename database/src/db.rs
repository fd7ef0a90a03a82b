use crate::errors::StoreResult;

pub use conn_builder::ConnBuilder;
pub use memory::MemEngine;
pub use rocks::{delete_db, RocksEngine};

mod conn_builder;
mod memory;
mod rocks;

/// A single mutation within an atomic write
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOp {
    Put { key: Vec<u8>, value: Vec<u8> },
    Delete { key: Vec<u8> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanDirection {
    Forward,
    Reverse,
}

/// A half-open key range `[from, to)`
#[derive(Debug, Clone)]
pub struct ScanRange {
    pub from: Vec<u8>,
    pub to: Vec<u8>,
}

impl ScanRange {
    pub fn new(from: Vec<u8>, to: Vec<u8>) -> Self {
        Self { from, to }
    }
}

pub type ScanItem = StoreResult<(Box<[u8]>, Box<[u8]>)>;

/// Capability contract of the underlying key-value engine. Any engine with
/// ordered iteration and atomic multi-key writes qualifies; the storage
/// layers above never name a concrete backend.
pub trait KvEngine: Send + Sync {
    fn get(&self, key: &[u8]) -> StoreResult<Option<Vec<u8>>>;

    fn has(&self, key: &[u8]) -> StoreResult<bool> {
        Ok(self.get(key)?.is_some())
    }

    /// Applies all ops as one atomic write: either every mutation becomes
    /// durable or none does
    fn write_atomically(&self, ops: Vec<WriteOp>) -> StoreResult<()>;

    /// Ordered scan over `[range.from, range.to)`. `Reverse` yields the same
    /// entries from the last key downwards.
    fn scan<'a>(&'a self, range: ScanRange, direction: ScanDirection) -> Box<dyn Iterator<Item = ScanItem> + 'a>;
}
