use crate::chain_state::{ChainState, ChainStateStore};
use crate::commitment::{mutation_commitment, ZERO_COMMITMENT};
use crate::substore::SubStore;
use echomint_database::prelude::{StagedDb, SEPARATOR};
use echomint_database::{StoreError, StoreResult};
use echomint_types::{BlockId, Height};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Whether the multi-store computes a cryptographic digest over each
/// flushed batch. `Passthrough` skips digest computation entirely, trading
/// tamper-evidence for throughput on trust-the-upstream replicas.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommitmentMode {
    Merkleized,
    Passthrough,
}

/// Composes the named application sub-stores over one staged database and
/// owns the committed chain-state record.
///
/// All query-serving reads go through `query_*`, which clamp the requested
/// ceiling to the committed height, so no query path can observe a
/// not-yet-committed height.
pub struct MultiStore {
    db: Arc<StagedDb>,
    stores: BTreeMap<String, SubStore>,
    chain_state: ChainStateStore,
    chain_id: String,
    mode: CommitmentMode,
}

impl MultiStore {
    pub fn new(
        db: Arc<StagedDb>,
        chain_id: impl Into<String>,
        store_names: impl IntoIterator<Item = impl Into<String>>,
        mode: CommitmentMode,
    ) -> StoreResult<Self> {
        let mut stores = BTreeMap::new();
        for name in store_names {
            let name: String = name.into();
            if name.is_empty() || name.as_bytes().contains(&SEPARATOR) {
                return Err(StoreError::DataInconsistency(format!("invalid sub-store name {name:?}")));
            }
            if stores.insert(name.clone(), SubStore::new(db.clone(), name.clone())).is_some() {
                return Err(StoreError::DataInconsistency(format!("duplicate sub-store name {name:?}")));
            }
        }
        let chain_state = ChainStateStore::new(db.clone());
        Ok(Self { db, stores, chain_state, chain_id: chain_id.into(), mode })
    }

    pub fn chain_id(&self) -> &str {
        &self.chain_id
    }

    pub fn commitment_mode(&self) -> CommitmentMode {
        self.mode
    }

    pub fn store_names(&self) -> impl Iterator<Item = &str> {
        self.stores.keys().map(|name| name.as_str())
    }

    /// The mutation handle of a named sub-store, bound to driver semantics
    /// (write-height tagging, read-your-writes during injection)
    pub fn store(&self, name: &str) -> StoreResult<&SubStore> {
        self.stores.get(name).ok_or_else(|| StoreError::UnknownSubStore(name.to_string()))
    }

    pub fn committed(&self) -> Option<ChainState> {
        self.chain_state.committed()
    }

    pub fn committed_height(&self) -> Option<Height> {
        self.chain_state.committed().map(|state| state.height)
    }

    /// Hydrates the committed chain state from the durable store. Returns
    /// `None` on a fresh database (genesis bootstrap required).
    pub fn load(&self) -> StoreResult<Option<ChainState>> {
        let state = self.chain_state.load()?;
        if let Some(state) = &state {
            if state.chain_id != self.chain_id {
                return Err(StoreError::DataInconsistency(format!(
                    "store belongs to chain {} but the replica is configured for {}",
                    state.chain_id, self.chain_id
                )));
            }
        }
        Ok(state)
    }

    /// Resolves a query ceiling to a height that is safe to expose:
    /// requests above the committed height are clamped to it, absent
    /// ceilings resolve to the committed height, and before any commit
    /// nothing is visible.
    pub fn query_bound(&self, requested: Option<Height>) -> Height {
        let Some(committed) = self.committed_height() else {
            return 0;
        };
        match requested {
            Some(ceiling) if ceiling > committed => {
                debug!("query ceiling {ceiling} clamped to committed height {committed}");
                committed
            }
            Some(ceiling) => ceiling,
            None => committed,
        }
    }

    pub fn query_get(&self, name: &str, key: impl AsRef<[u8]>, ceiling: Option<Height>) -> StoreResult<Vec<u8>> {
        let bound = self.query_bound(ceiling);
        self.store(name)?.get(key, Some(bound))
    }

    pub fn query_has(&self, name: &str, key: impl AsRef<[u8]>, ceiling: Option<Height>) -> StoreResult<bool> {
        let bound = self.query_bound(ceiling);
        self.store(name)?.has(key, Some(bound))
    }

    pub fn query_iterate(
        &self,
        name: &str,
        seek_from: Option<&[u8]>,
        ceiling: Option<Height>,
    ) -> StoreResult<Vec<(Vec<u8>, Vec<u8>)>> {
        let bound = self.query_bound(ceiling);
        self.store(name)?.iterate(seek_from, Some(bound))
    }

    /// Finalizes the open batch's contributions: computes the mutation
    /// commitment (mode-dependent) and stages the chain-state record so it
    /// is flushed atomically with the block's own writes. The record is not
    /// part of its own digest.
    pub fn seal(&self, height: Height, block_id: Option<BlockId>, app_hash: Vec<u8>) -> StoreResult<ChainState> {
        match self.db.write_height() {
            Some(open) if open == height => {}
            other => {
                return Err(StoreError::DataInconsistency(format!(
                    "seal at height {height} but the open batch height is {other:?}"
                )))
            }
        }
        let commitment = match self.mode {
            CommitmentMode::Merkleized => mutation_commitment(&self.db.staged_entries()?),
            CommitmentMode::Passthrough => ZERO_COMMITMENT,
        };
        let state = ChainState {
            chain_id: self.chain_id.clone(),
            height,
            block_id,
            app_hash,
            commitment,
            commitment_mode: self.mode,
        };
        self.chain_state.stage(&state)?;
        Ok(state)
    }

    /// Advances the committed-height marker. Must be called only after the
    /// batch layer's flush succeeded; the marker is read back from the
    /// durable store rather than trusted from memory.
    pub fn commit(&self) -> StoreResult<ChainState> {
        if self.db.is_open() {
            return Err(StoreError::DataInconsistency("commit called while a batch is still open".into()));
        }
        self.chain_state.publish()
    }
}
