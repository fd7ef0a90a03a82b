use crate::db::{KvEngine, ScanDirection, ScanItem, ScanRange, WriteOp};
use crate::errors::StoreResult;
use rocksdb::{DBWithThreadMode, IteratorMode, MultiThreaded, ReadOptions, WriteBatch};
use std::path::PathBuf;

/// The RocksDB-backed engine used for durable deployments
pub struct RocksEngine {
    inner: DBWithThreadMode<MultiThreaded>,
}

impl RocksEngine {
    pub(super) fn new(inner: DBWithThreadMode<MultiThreaded>) -> Self {
        Self { inner }
    }
}

impl KvEngine for RocksEngine {
    fn get(&self, key: &[u8]) -> StoreResult<Option<Vec<u8>>> {
        Ok(self.inner.get_pinned(key)?.map(|slice| slice.to_vec()))
    }

    fn has(&self, key: &[u8]) -> StoreResult<bool> {
        Ok(self.inner.get_pinned(key)?.is_some())
    }

    fn write_atomically(&self, ops: Vec<WriteOp>) -> StoreResult<()> {
        let mut batch = WriteBatch::default();
        for op in ops {
            match op {
                WriteOp::Put { key, value } => batch.put(key, value),
                WriteOp::Delete { key } => batch.delete(key),
            }
        }
        Ok(self.inner.write(batch)?)
    }

    fn scan<'a>(&'a self, range: ScanRange, direction: ScanDirection) -> Box<dyn Iterator<Item = ScanItem> + 'a> {
        let mut read_opts = ReadOptions::default();
        read_opts.set_iterate_range(range.from..range.to);
        let mode = match direction {
            ScanDirection::Forward => IteratorMode::Start,
            ScanDirection::Reverse => IteratorMode::End,
        };
        Box::new(self.inner.iterator_opt(mode, read_opts).map(|item| item.map_err(Into::into)))
    }
}

/// Deletes an existing DB if it exists
pub fn delete_db(db_dir: PathBuf) {
    if !db_dir.exists() {
        return;
    }
    let options = rocksdb::Options::default();
    let path = db_dir.to_str().unwrap();
    <DBWithThreadMode<MultiThreaded>>::destroy(&options, path).expect("DB is expected to be deletable");
}
