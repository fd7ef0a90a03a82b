use crate::db::{KvEngine, ScanDirection, ScanItem, ScanRange, WriteOp};
use crate::errors::StoreResult;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::ops::Bound;

/// An in-memory engine over an ordered map, for tests and ephemeral runs
#[derive(Default)]
pub struct MemEngine {
    map: RwLock<BTreeMap<Vec<u8>, Vec<u8>>>,
}

impl MemEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.map.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.read().is_empty()
    }
}

impl KvEngine for MemEngine {
    fn get(&self, key: &[u8]) -> StoreResult<Option<Vec<u8>>> {
        Ok(self.map.read().get(key).cloned())
    }

    fn has(&self, key: &[u8]) -> StoreResult<bool> {
        Ok(self.map.read().contains_key(key))
    }

    fn write_atomically(&self, ops: Vec<WriteOp>) -> StoreResult<()> {
        let mut map = self.map.write();
        for op in ops {
            match op {
                WriteOp::Put { key, value } => {
                    map.insert(key, value);
                }
                WriteOp::Delete { key } => {
                    map.remove(&key);
                }
            }
        }
        Ok(())
    }

    fn scan<'a>(&'a self, range: ScanRange, direction: ScanDirection) -> Box<dyn Iterator<Item = ScanItem> + 'a> {
        let map = self.map.read();
        let items: Vec<ScanItem> = map
            .range::<[u8], _>((Bound::Included(range.from.as_slice()), Bound::Excluded(range.to.as_slice())))
            .map(|(key, value)| Ok((key.clone().into_boxed_slice(), value.clone().into_boxed_slice())))
            .collect();
        match direction {
            ScanDirection::Forward => Box::new(items.into_iter()),
            ScanDirection::Reverse => Box::new(items.into_iter().rev()),
        }
    }
}
