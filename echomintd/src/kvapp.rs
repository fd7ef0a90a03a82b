use echomint_database::StoreResultExtensions;
use echomint_engine::{AppError, AppHash, Application, QueryRequest, QueryResponse};
use echomint_store::MultiStore;
use echomint_types::{BlockHeader, Event, GenesisDoc, Height, Tx, TxResult};
use parking_lot::Mutex;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::sync::Arc;

/// Sub-store carrying user key/value pairs
pub const KV_STORE: &str = "kv";
/// Sub-store carrying application bookkeeping (the running state hash)
pub const SYS_STORE: &str = "sys";

const APP_HASH_KEY: &[u8] = b"app_hash";

/// The daemon's built-in embedded application: a deterministic key-value
/// machine. Transactions are JSON `set`/`delete` operations; the app hash is
/// a chain over every applied operation and is itself stored height-
/// versioned, so a restarted replica re-hydrates it from the store.
pub struct KvApp {
    store: Arc<MultiStore>,
    state_hash: Mutex<[u8; 32]>,
    block_hasher: Mutex<Sha256>,
}

#[derive(Deserialize)]
#[serde(tag = "op", rename_all = "lowercase", deny_unknown_fields)]
enum KvOp {
    Set { key: String, value: String },
    Delete { key: String },
}

fn store_err(err: impl std::fmt::Display) -> AppError {
    AppError(err.to_string())
}

impl KvApp {
    pub fn new(store: Arc<MultiStore>) -> Self {
        Self { store, state_hash: Mutex::new([0u8; 32]), block_hasher: Mutex::new(Sha256::new()) }
    }

    /// The sub-stores this application requires of the multi-store
    pub fn store_names() -> [&'static str; 2] {
        [KV_STORE, SYS_STORE]
    }

    fn advance_state_hash(&self) -> Result<AppHash, AppError> {
        let block_digest = std::mem::take(&mut *self.block_hasher.lock()).finalize();
        let mut state_hash = self.state_hash.lock();
        let mut chained = Sha256::new();
        chained.update(*state_hash);
        chained.update(block_digest);
        *state_hash = chained.finalize().into();

        self.store.store(SYS_STORE).map_err(store_err)?.set(APP_HASH_KEY, state_hash.to_vec()).map_err(store_err)?;
        Ok(state_hash.to_vec())
    }
}

impl Application for KvApp {
    fn init_chain(&self, genesis: &GenesisDoc) -> Result<AppHash, AppError> {
        let kv = self.store.store(KV_STORE).map_err(store_err)?;
        let mut hasher = self.block_hasher.lock();
        if let Some(entries) = genesis.app_state.get("entries").and_then(|value| value.as_object()) {
            for (key, value) in entries {
                let value = value.as_str().ok_or_else(|| AppError(format!("genesis entry {key} is not a string")))?;
                kv.set(key.as_bytes(), value.as_bytes().to_vec()).map_err(store_err)?;
                hasher.update(b"set");
                hasher.update(key.as_bytes());
                hasher.update(value.as_bytes());
            }
        }
        drop(hasher);
        self.advance_state_hash()
    }

    fn load_state(&self, height: Height) -> Result<(), AppError> {
        let raw = self.store.store(SYS_STORE).map_err(store_err)?.get(APP_HASH_KEY, Some(height)).map_err(store_err)?;
        let hash: [u8; 32] = raw.try_into().map_err(|_| AppError("stored app hash has the wrong length".into()))?;
        *self.state_hash.lock() = hash;
        Ok(())
    }

    fn begin_block(&self, header: &BlockHeader) -> Result<Vec<Event>, AppError> {
        *self.block_hasher.lock() = Sha256::new();
        Ok(vec![Event::new("block_started").with_attribute("height", header.height.to_string())])
    }

    fn deliver_tx(&self, tx: &Tx) -> Result<TxResult, AppError> {
        let op: KvOp = match serde_json::from_slice(tx) {
            Ok(op) => op,
            // a malformed transaction inside a finalized block is an
            // application-level rejection, not an execution failure
            Err(err) => return Ok(TxResult::error(1, format!("invalid tx encoding: {err}"))),
        };
        let kv = self.store.store(KV_STORE).map_err(store_err)?;
        let mut hasher = self.block_hasher.lock();
        match op {
            KvOp::Set { key, value } => {
                kv.set(key.as_bytes(), value.as_bytes().to_vec()).map_err(store_err)?;
                hasher.update(b"set");
                hasher.update(key.as_bytes());
                hasher.update(value.as_bytes());
                Ok(TxResult::ok(vec![Event::new("kv_set").with_attribute("key", key)]))
            }
            KvOp::Delete { key } => {
                kv.delete(key.as_bytes()).map_err(store_err)?;
                hasher.update(b"del");
                hasher.update(key.as_bytes());
                Ok(TxResult::ok(vec![Event::new("kv_deleted").with_attribute("key", key)]))
            }
        }
    }

    fn end_block(&self, _height: Height) -> Result<Vec<Event>, AppError> {
        Ok(Vec::new())
    }

    fn commit(&self) -> Result<AppHash, AppError> {
        self.advance_state_hash()
    }

    fn query(&self, request: QueryRequest) -> Result<QueryResponse, AppError> {
        let not_found = |log: String| QueryResponse { code: 1, value: Vec::new(), log, height: request.height };
        match request.path.as_str() {
            "kv/get" => {
                let kv = self.store.store(KV_STORE).map_err(store_err)?;
                match kv.get(&request.data, Some(request.height)).optional().map_err(store_err)? {
                    Some(value) => Ok(QueryResponse { code: 0, value, log: String::new(), height: request.height }),
                    None => Ok(not_found("key not found".into())),
                }
            }
            "kv/has" => {
                let kv = self.store.store(KV_STORE).map_err(store_err)?;
                let present = kv.has(&request.data, Some(request.height)).map_err(store_err)?;
                Ok(QueryResponse { code: 0, value: vec![present as u8], log: String::new(), height: request.height })
            }
            "sys/app_hash" => {
                let sys = self.store.store(SYS_STORE).map_err(store_err)?;
                let value = sys.get(APP_HASH_KEY, Some(request.height)).map_err(store_err)?;
                Ok(QueryResponse { code: 0, value, log: String::new(), height: request.height })
            }
            other => Ok(not_found(format!("unknown query path {other}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use echomint_database::prelude::{MemEngine, StagedDb};
    use echomint_engine::Executor;
    use echomint_store::CommitmentMode;
    use echomint_types::{Block, BlockId};

    fn stack() -> (Arc<StagedDb>, Executor) {
        let db = Arc::new(StagedDb::new(Arc::new(MemEngine::new())));
        let store =
            Arc::new(MultiStore::new(db.clone(), "kv-test-1", KvApp::store_names(), CommitmentMode::Merkleized).unwrap());
        let app = Arc::new(KvApp::new(store.clone()));
        (db.clone(), Executor::new(app, db, store))
    }

    fn genesis() -> GenesisDoc {
        GenesisDoc {
            chain_id: "kv-test-1".into(),
            initial_height: 1,
            app_state: serde_json::json!({ "entries": { "greeting": "hello" } }),
        }
    }

    fn block(height: Height, txs: Vec<Tx>) -> Block {
        Block {
            header: BlockHeader { chain_id: "kv-test-1".into(), height, time_ms: height, app_hash: Vec::new() },
            id: BlockId::from_bytes([height as u8; 32]),
            txs,
        }
    }

    fn set_tx(key: &str, value: &str) -> Tx {
        serde_json::json!({ "op": "set", "key": key, "value": value }).to_string().into_bytes()
    }

    #[test]
    fn test_genesis_allocations_are_queryable() {
        let (db, executor) = stack();
        executor.init(&genesis()).unwrap();
        db.flush().unwrap();
        executor.load_initial_state().unwrap();

        let response = executor.query_client().query("kv/get", b"greeting".to_vec(), None).unwrap();
        assert_eq!(response.value, b"hello".to_vec());
    }

    #[test]
    fn test_set_delete_and_historical_reads() {
        let (db, executor) = stack();
        executor.init(&genesis()).unwrap();
        db.flush().unwrap();
        executor.load_initial_state().unwrap();

        executor.inject(&block(2, vec![set_tx("color", "red")])).unwrap();
        executor
            .inject(&block(3, vec![serde_json::json!({ "op": "delete", "key": "color" }).to_string().into_bytes()]))
            .unwrap();

        let client = executor.query_client();
        assert_eq!(client.query("kv/get", b"color".to_vec(), Some(2)).unwrap().value, b"red".to_vec());
        assert_eq!(client.query("kv/get", b"color".to_vec(), None).unwrap().code, 1);
        assert_eq!(client.query("kv/has", b"color".to_vec(), Some(2)).unwrap().value, vec![1]);
        assert_eq!(client.query("kv/has", b"color".to_vec(), Some(3)).unwrap().value, vec![0]);
    }

    #[test]
    fn test_malformed_tx_is_rejected_not_fatal() {
        let (db, executor) = stack();
        executor.init(&genesis()).unwrap();
        db.flush().unwrap();
        executor.load_initial_state().unwrap();

        executor.inject(&block(2, vec![b"not json".to_vec()])).unwrap();
        let collector = executor.event_collector();
        assert_eq!(collector.failed_tx_count(), 1);
        assert_eq!(executor.current_height(), Some(2));
    }

    #[test]
    fn test_app_hash_chains_and_survives_restart() {
        let engine = Arc::new(MemEngine::new());
        let db = Arc::new(StagedDb::new(engine.clone() as Arc<dyn echomint_database::prelude::KvEngine>));
        let store =
            Arc::new(MultiStore::new(db.clone(), "kv-test-1", KvApp::store_names(), CommitmentMode::Merkleized).unwrap());
        let app = Arc::new(KvApp::new(store.clone()));
        let executor = Executor::new(app, db.clone(), store);

        executor.init(&genesis()).unwrap();
        db.flush().unwrap();
        executor.load_initial_state().unwrap();
        let first = executor.inject(&block(2, vec![set_tx("a", "1")])).unwrap();
        let second = executor.inject(&block(3, vec![set_tx("a", "1")])).unwrap();
        // identical blocks at different positions chain to different hashes
        assert_ne!(first.app_hash, second.app_hash);

        // a restarted replica reports the same app hash
        let db2 = Arc::new(StagedDb::new(engine as Arc<dyn echomint_database::prelude::KvEngine>));
        let store2 =
            Arc::new(MultiStore::new(db2.clone(), "kv-test-1", KvApp::store_names(), CommitmentMode::Merkleized).unwrap());
        let app2 = Arc::new(KvApp::new(store2.clone()));
        let restarted = Executor::new(app2, db2, store2);
        restarted.load_initial_state().unwrap();
        let response = restarted.query_client().query("sys/app_hash", Vec::new(), None).unwrap();
        assert_eq!(response.value, second.app_hash);
    }
}
