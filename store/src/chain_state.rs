use crate::commitment::Commitment;
use crate::multistore::CommitmentMode;
use echomint_database::prelude::{DatabaseStorePrefixes, DbKey, StagedDb};
use echomint_database::{StoreError, StoreResult};
use echomint_types::{BlockId, Height};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// The committed-height record: durably reflects the last block that was
/// fully flushed, so the committed height survives restarts through the
/// store itself.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainState {
    pub chain_id: String,
    pub height: Height,
    /// Identifier of the committed block; absent for the genesis record
    pub block_id: Option<BlockId>,
    /// Application hash returned by the embedded application's commit hook
    pub app_hash: Vec<u8>,
    /// Mutation digest of the flushed batch; zero in passthrough mode
    pub commitment: Commitment,
    pub commitment_mode: CommitmentMode,
}

/// Flat chain-state record access with a published in-memory copy.
///
/// `stage` writes the record into the open batch (atomic with the block's
/// own mutations); `publish` re-reads the durable record after a successful
/// flush and only then makes it observable to readers.
#[derive(Clone)]
pub struct ChainStateStore {
    db: Arc<StagedDb>,
    key: Vec<u8>,
    cached: Arc<RwLock<Option<ChainState>>>,
}

impl ChainStateStore {
    pub fn new(db: Arc<StagedDb>) -> Self {
        let key = DbKey::prefix_only(DatabaseStorePrefixes::ChainState.as_ref()).into_vec();
        Self { db, key, cached: Arc::new(RwLock::new(None)) }
    }

    /// The last published record. Readers never observe a staged-but-not-
    /// flushed record through this accessor.
    pub fn committed(&self) -> Option<ChainState> {
        self.cached.read().clone()
    }

    /// Reads the durable record, bypassing any open stage
    pub fn read_durable(&self) -> StoreResult<ChainState> {
        match self.db.engine().get(&self.key)? {
            Some(raw) => Ok(bincode::deserialize(&raw)?),
            None => Err(StoreError::KeyNotFound(DbKey::prefix_only(&self.key))),
        }
    }

    /// Hydrates the published copy from the durable store (startup path).
    /// Returns the record if one exists.
    pub fn load(&self) -> StoreResult<Option<ChainState>> {
        match self.db.engine().get(&self.key)? {
            Some(raw) => {
                let state: ChainState = bincode::deserialize(&raw)?;
                *self.cached.write() = Some(state.clone());
                Ok(Some(state))
            }
            None => Ok(None),
        }
    }

    /// Stages the record into the open batch without publishing it
    pub fn stage(&self, state: &ChainState) -> StoreResult<()> {
        self.db.stage_put(self.key.clone(), bincode::serialize(state)?)
    }

    /// Publishes the durable record after a successful flush and returns it
    pub fn publish(&self) -> StoreResult<ChainState> {
        let state = self.read_durable()?;
        *self.cached.write() = Some(state.clone());
        Ok(state)
    }
}
