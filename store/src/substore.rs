use echomint_database::prelude::{bucket_path, DatabaseStorePrefixes, HeightedDbAccess, StagedDb};
use echomint_database::StoreResult;
use echomint_types::Height;
use std::sync::Arc;

/// A named application sub-store (one per application module), holding
/// opaque value bytes under height-versioned keys.
///
/// This handle carries §driver semantics: mutations are tagged with the
/// active write height, reads take an explicit optional ceiling and `None`
/// means "absolute latest including the open batch" (the read-your-writes
/// path used during injection). Query clients must go through
/// [`crate::MultiStore`], which additionally clamps ceilings to the
/// committed height.
#[derive(Clone)]
pub struct SubStore {
    name: String,
    access: HeightedDbAccess<Vec<u8>>,
}

impl SubStore {
    pub(crate) fn new(db: Arc<StagedDb>, name: String) -> Self {
        let bucket = bucket_path(DatabaseStorePrefixes::SubStore, &name);
        Self { name, access: HeightedDbAccess::new(db, bucket) }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn get(&self, key: impl AsRef<[u8]>, ceiling: Option<Height>) -> StoreResult<Vec<u8>> {
        self.access.read(key, ceiling)
    }

    pub fn has(&self, key: impl AsRef<[u8]>, ceiling: Option<Height>) -> StoreResult<bool> {
        self.access.has(key, ceiling)
    }

    pub fn set(&self, key: impl AsRef<[u8]>, value: Vec<u8>) -> StoreResult<()> {
        self.access.write(key, &value)
    }

    pub fn delete(&self, key: impl AsRef<[u8]>) -> StoreResult<()> {
        self.access.delete(key)
    }

    /// Ordered iteration over live keys at or below `ceiling`
    pub fn iterate(&self, seek_from: Option<&[u8]>, ceiling: Option<Height>) -> StoreResult<Vec<(Vec<u8>, Vec<u8>)>> {
        self.access.iterate(seek_from, ceiling)
    }
}
