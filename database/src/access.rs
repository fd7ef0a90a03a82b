use crate::errors::{StoreError, StoreResult};
use crate::key::DbKey;
use crate::staging::StagedDb;
use echomint_types::Height;
use serde::{de::DeserializeOwned, Serialize};
use std::marker::PhantomData;
use std::sync::Arc;

/// Typed, bucket-scoped access to height-versioned entries.
///
/// Values are stored as `Option<TData>`: `Some` for live data, `None` as a
/// tombstone, so a delete at height h shadows lower heights without erasing
/// history. Writes are tagged with the staged write height; reads take an
/// optional ceiling and resolve to the most recent qualifying entry.
#[derive(Clone)]
pub struct HeightedDbAccess<TData> {
    db: Arc<StagedDb>,

    // DB bucket/path
    bucket: Vec<u8>,

    _marker: PhantomData<fn() -> TData>,
}

impl<TData> HeightedDbAccess<TData>
where
    TData: Serialize + DeserializeOwned,
{
    pub fn new(db: Arc<StagedDb>, bucket: Vec<u8>) -> Self {
        Self { db, bucket, _marker: PhantomData }
    }

    pub fn bucket(&self) -> &[u8] {
        &self.bucket
    }

    /// The most recent value at or below `ceiling` (absolute latest if no
    /// ceiling). `KeyNotFound` if no qualifying live entry exists.
    pub fn read(&self, key: impl AsRef<[u8]>, ceiling: Option<Height>) -> StoreResult<TData> {
        let entry_prefix = DbKey::new(&self.bucket, key.as_ref()).into_vec();
        match self.db.latest_at_or_below(&entry_prefix, ceiling.unwrap_or(Height::MAX))? {
            Some((_, raw)) => match bincode::deserialize::<Option<TData>>(&raw)? {
                Some(data) => Ok(data),
                // a tombstone shadows everything below it
                None => Err(StoreError::KeyNotFound(DbKey::new(&self.bucket, key.as_ref()))),
            },
            None => Err(StoreError::KeyNotFound(DbKey::new(&self.bucket, key.as_ref()))),
        }
    }

    pub fn has(&self, key: impl AsRef<[u8]>, ceiling: Option<Height>) -> StoreResult<bool> {
        let entry_prefix = DbKey::new(&self.bucket, key.as_ref()).into_vec();
        match self.db.latest_at_or_below(&entry_prefix, ceiling.unwrap_or(Height::MAX))? {
            Some((_, raw)) => Ok(bincode::deserialize::<Option<TData>>(&raw)?.is_some()),
            None => Ok(false),
        }
    }

    /// Stores `data` tagged with the active write height.
    /// `NoActiveWriteHeight` if no batch is open.
    pub fn write(&self, key: impl AsRef<[u8]>, data: &TData) -> StoreResult<()> {
        self.stage(key, bincode::serialize(&Some(data))?)
    }

    /// Stages a tombstone at the active write height
    pub fn delete(&self, key: impl AsRef<[u8]>) -> StoreResult<()> {
        self.stage(key, bincode::serialize(&None::<TData>)?)
    }

    fn stage(&self, key: impl AsRef<[u8]>, raw: Vec<u8>) -> StoreResult<()> {
        let height = self.db.write_height().ok_or(StoreError::NoActiveWriteHeight)?;
        let db_key = DbKey::heighted(&self.bucket, key, height);
        self.db.stage_put(db_key.into_vec(), raw)
    }

    /// Ordered iteration over the bucket's logical keys, yielding for each
    /// the most recent live value at or below `ceiling`. Tombstoned keys are
    /// skipped.
    pub fn iterate(
        &self,
        seek_from: Option<&[u8]>,
        ceiling: Option<Height>,
    ) -> StoreResult<Vec<(Vec<u8>, TData)>> {
        let entries = self.db.iterate_latest(&self.bucket, seek_from, ceiling.unwrap_or(Height::MAX))?;
        let mut out = Vec::with_capacity(entries.len());
        for (logical_key, _, raw) in entries {
            if let Some(data) = bincode::deserialize::<Option<TData>>(&raw)? {
                out.push((logical_key, data));
            }
        }
        Ok(out)
    }
}
