use crate::db::rocks::RocksEngine;
use crate::errors::StoreResult;
use rocksdb::{DBWithThreadMode, MultiThreaded};
use std::{path::PathBuf, sync::Arc};

const MB: usize = 1024 * 1024;

#[derive(Debug, Clone)]
pub struct ConnBuilder {
    db_path: PathBuf,
    create_if_missing: bool,
    parallelism: usize,
    mem_budget: usize,
}

impl ConnBuilder {
    pub fn new(db_path: PathBuf) -> Self {
        Self { db_path, create_if_missing: true, parallelism: 1, mem_budget: 64 * MB }
    }

    pub fn with_create_if_missing(self, create_if_missing: bool) -> Self {
        Self { create_if_missing, ..self }
    }

    pub fn with_parallelism(self, parallelism: impl Into<usize>) -> Self {
        Self { parallelism: parallelism.into(), ..self }
    }

    pub fn with_mem_budget(self, mem_budget: impl Into<usize>) -> Self {
        Self { mem_budget: mem_budget.into(), ..self }
    }

    pub fn build(self) -> StoreResult<Arc<RocksEngine>> {
        let mut opts = rocksdb::Options::default();
        if self.parallelism > 1 {
            opts.increase_parallelism(self.parallelism as i32);
        }
        opts.optimize_level_style_compaction(self.mem_budget);
        opts.create_if_missing(self.create_if_missing);
        let inner = <DBWithThreadMode<MultiThreaded>>::open(&opts, self.db_path.to_str().unwrap())?;
        Ok(Arc::new(RocksEngine::new(inner)))
    }
}
