//! End-to-end replay tests driving a small deterministic counter
//! application through the full executor lifecycle.

use echomint_database::prelude::{KvEngine, MemEngine, StagedDb};
use echomint_engine::{
    AppError, AppHash, Application, EngineError, Executor, ExecutorState, QueryRequest, QueryResponse,
};
use echomint_store::{CommitmentMode, MultiStore};
use echomint_types::{Block, BlockHeader, BlockId, Event, GenesisDoc, Height, Tx, TxResult};
use parking_lot::Mutex;
use std::sync::Arc;

const CHAIN_ID: &str = "replay-test-1";
const STATE_STORE: &str = "state";
const COUNTER_KEY: &[u8] = b"counter";

fn encode(value: u64) -> Vec<u8> {
    value.to_be_bytes().to_vec()
}

fn decode(raw: &[u8]) -> u64 {
    u64::from_be_bytes(raw.try_into().expect("counter values are 8 bytes"))
}

fn store_err(err: impl std::fmt::Display) -> AppError {
    AppError(err.to_string())
}

/// A counter: every transaction increments it, `reject` fails as a normal
/// in-block transaction failure, `boom` fails the whole execution.
struct CounterApp {
    store: Arc<MultiStore>,
    counter: Mutex<u64>,
}

impl CounterApp {
    fn new(store: Arc<MultiStore>) -> Self {
        Self { store, counter: Mutex::new(0) }
    }
}

impl Application for CounterApp {
    fn init_chain(&self, genesis: &GenesisDoc) -> Result<AppHash, AppError> {
        let start = genesis.app_state.get("counter").and_then(|value| value.as_u64()).unwrap_or(0);
        self.store.store(STATE_STORE).map_err(store_err)?.set(COUNTER_KEY, encode(start)).map_err(store_err)?;
        *self.counter.lock() = start;
        Ok(encode(start))
    }

    fn load_state(&self, height: Height) -> Result<(), AppError> {
        let raw = self.store.store(STATE_STORE).map_err(store_err)?.get(COUNTER_KEY, Some(height)).map_err(store_err)?;
        *self.counter.lock() = decode(&raw);
        Ok(())
    }

    fn begin_block(&self, header: &BlockHeader) -> Result<Vec<Event>, AppError> {
        Ok(vec![Event::new("begin").with_attribute("height", header.height.to_string())])
    }

    fn deliver_tx(&self, tx: &Tx) -> Result<TxResult, AppError> {
        match tx.as_slice() {
            b"boom" => Err(AppError("counter overflow unit tripped".into())),
            b"reject" => Ok(TxResult::error(1, "rejected by counter rules")),
            _ => {
                let mut counter = self.counter.lock();
                *counter += 1;
                self.store
                    .store(STATE_STORE)
                    .map_err(store_err)?
                    .set(COUNTER_KEY, encode(*counter))
                    .map_err(store_err)?;
                Ok(TxResult::ok(vec![Event::new("incremented").with_attribute("value", counter.to_string())]))
            }
        }
    }

    fn end_block(&self, _height: Height) -> Result<Vec<Event>, AppError> {
        Ok(Vec::new())
    }

    fn commit(&self) -> Result<AppHash, AppError> {
        Ok(encode(*self.counter.lock()))
    }

    fn query(&self, request: QueryRequest) -> Result<QueryResponse, AppError> {
        match request.path.as_str() {
            "counter/value" => {
                let raw = self
                    .store
                    .store(STATE_STORE)
                    .map_err(store_err)?
                    .get(COUNTER_KEY, Some(request.height))
                    .map_err(store_err)?;
                Ok(QueryResponse { code: 0, value: raw, log: String::new(), height: request.height })
            }
            other => Ok(QueryResponse { code: 1, value: Vec::new(), log: format!("unknown path {other}"), height: request.height }),
        }
    }
}

fn stack(engine: Arc<dyn KvEngine>) -> (Arc<StagedDb>, Arc<MultiStore>, Executor) {
    let db = Arc::new(StagedDb::new(engine));
    let store = Arc::new(MultiStore::new(db.clone(), CHAIN_ID, [STATE_STORE], CommitmentMode::Merkleized).unwrap());
    let app = Arc::new(CounterApp::new(store.clone()));
    let executor = Executor::new(app, db.clone(), store.clone());
    (db, store, executor)
}

fn genesis() -> GenesisDoc {
    GenesisDoc { chain_id: CHAIN_ID.into(), initial_height: 1, app_state: serde_json::json!({ "counter": 10 }) }
}

fn block(height: Height, txs: Vec<Tx>) -> Block {
    Block {
        header: BlockHeader { chain_id: CHAIN_ID.into(), height, time_ms: 1_700_000_000_000 + height, app_hash: Vec::new() },
        id: BlockId::from_bytes([height as u8; 32]),
        txs,
    }
}

fn bootstrap(db: &StagedDb, executor: &Executor) {
    executor.init(&genesis()).unwrap();
    db.flush().unwrap();
    executor.load_initial_state().unwrap();
}

#[test]
fn test_genesis_bootstrap() {
    let engine = Arc::new(MemEngine::new());
    let (db, _store, executor) = stack(engine);

    executor.init(&genesis()).unwrap();
    assert_eq!(executor.state(), ExecutorState::Initialized);
    // nothing is committed before the genesis batch is flushed
    assert_eq!(executor.current_height(), None);

    db.flush().unwrap();
    let chain = executor.load_initial_state().unwrap();
    assert_eq!(chain.height, 1);
    assert_eq!(executor.current_height(), Some(1));
    assert_eq!(executor.state(), ExecutorState::Ready);

    let response = executor.query_client().query("counter/value", Vec::new(), None).unwrap();
    assert_eq!(decode(&response.value), 10);
}

#[test]
fn test_sequential_commit() {
    let engine = Arc::new(MemEngine::new());
    let (db, _store, executor) = stack(engine);
    bootstrap(&db, &executor);

    for height in 2..=6 {
        let chain = executor.inject(&block(height, vec![b"inc".to_vec()])).unwrap();
        assert_eq!(chain.height, height);
        assert_eq!(executor.current_height(), Some(height));
    }

    // five increments over the genesis value of 10
    let response = executor.query_client().query("counter/value", Vec::new(), None).unwrap();
    assert_eq!(decode(&response.value), 15);
    // app hash of the last commit matches the counter
    assert_eq!(executor.inject(&block(7, vec![])).unwrap().app_hash, encode(15));
}

#[test]
fn test_contiguity_enforcement() {
    let engine = Arc::new(MemEngine::new());
    let (db, _store, executor) = stack(engine);
    bootstrap(&db, &executor);

    let err = executor.inject(&block(3, vec![])).unwrap_err();
    assert!(matches!(err, EngineError::NonContiguousHeight { expected: 2, got: 3 }));
    assert_eq!(executor.current_height(), Some(1));

    // below next-expected is rejected the same way
    let (db, _store, executor) = stack(Arc::new(MemEngine::new()));
    bootstrap(&db, &executor);
    executor.inject(&block(2, vec![])).unwrap();
    let err = executor.inject(&block(2, vec![])).unwrap_err();
    assert!(matches!(err, EngineError::NonContiguousHeight { expected: 3, got: 2 }));
}

#[test]
fn test_app_failure_aborts_without_flush() {
    let engine: Arc<MemEngine> = Arc::new(MemEngine::new());
    let (db, _store, executor) = stack(engine.clone());
    bootstrap(&db, &executor);
    executor.inject(&block(2, vec![b"inc".to_vec()])).unwrap();

    // the first tx mutates state, the second fails execution: nothing of the
    // block may survive
    let err = executor.inject(&block(3, vec![b"inc".to_vec(), b"boom".to_vec()])).unwrap_err();
    assert!(matches!(err, EngineError::App { phase: "deliver-tx", height: 3, .. }));
    assert_eq!(executor.current_height(), Some(2));
    assert!(!db.is_open(), "the aborted stage must be abandoned");

    // crash-only recovery: a fresh stack over the same durable engine
    // resumes from the last committed height with the pre-failure state
    let (_db2, _store2, restarted) = stack(engine);
    let chain = restarted.load_initial_state().unwrap();
    assert_eq!(chain.height, 2);
    let response = restarted.query_client().query("counter/value", Vec::new(), None).unwrap();
    assert_eq!(decode(&response.value), 11);
}

#[test]
fn test_commit_survives_restart() {
    let engine: Arc<MemEngine> = Arc::new(MemEngine::new());
    let (db, _store, executor) = stack(engine.clone());
    bootstrap(&db, &executor);
    executor.inject(&block(2, vec![b"inc".to_vec(), b"inc".to_vec()])).unwrap();

    // once flush returned, everything is durable
    let (_db2, _store2, restarted) = stack(engine);
    assert_eq!(restarted.load_initial_state().unwrap().height, 2);
    assert_eq!(restarted.current_height(), Some(2));
    let response = restarted.query_client().query("counter/value", Vec::new(), None).unwrap();
    assert_eq!(decode(&response.value), 12);
}

#[test]
fn test_event_collector_replaced_per_injection() {
    let engine = Arc::new(MemEngine::new());
    let (db, _store, executor) = stack(engine);
    bootstrap(&db, &executor);

    executor.inject(&block(2, vec![b"inc".to_vec(), b"reject".to_vec()])).unwrap();
    let collector = executor.event_collector();
    assert_eq!(collector.height, 2);
    assert_eq!(collector.block_id, Some(BlockId::from_bytes([2; 32])));
    assert_eq!(collector.tx_count(), 2);
    assert_eq!(collector.failed_tx_count(), 1);
    assert_eq!(collector.begin_block_events[0].kind, "begin");

    executor.inject(&block(3, vec![])).unwrap();
    let collector = executor.event_collector();
    assert_eq!(collector.height, 3);
    assert_eq!(collector.tx_count(), 0);
}

#[test]
fn test_commit_notifications() {
    let engine = Arc::new(MemEngine::new());
    let (db, _store, executor) = stack(engine);
    bootstrap(&db, &executor);

    let commits = executor.subscribe_commits(8);
    executor.inject(&block(2, vec![])).unwrap();
    executor.inject(&block(3, vec![])).unwrap();
    assert_eq!(commits.try_recv().unwrap(), 2);
    assert_eq!(commits.try_recv().unwrap(), 3);
    assert!(commits.try_recv().is_err());
}

#[test]
fn test_query_height_clamped_to_committed() {
    let engine = Arc::new(MemEngine::new());
    let (db, _store, executor) = stack(engine);
    bootstrap(&db, &executor);
    executor.inject(&block(2, vec![b"inc".to_vec()])).unwrap();

    let client = executor.query_client();
    let response = client.query("counter/value", Vec::new(), Some(999)).unwrap();
    assert_eq!(response.height, 2);
    assert_eq!(decode(&response.value), 11);

    // an explicit historical height is honored
    let response = client.query("counter/value", Vec::new(), Some(1)).unwrap();
    assert_eq!(decode(&response.value), 10);
}

#[test]
fn test_init_validation() {
    let (_db, _store, executor) = stack(Arc::new(MemEngine::new()));
    let mut doc = genesis();
    doc.initial_height = 0;
    assert!(matches!(executor.init(&doc), Err(EngineError::InvalidGenesis(_))));

    let mut doc = genesis();
    doc.chain_id = "other-chain".into();
    assert!(matches!(executor.init(&doc), Err(EngineError::InvalidGenesis(_))));

    // double initialization over an already-bootstrapped store
    let engine: Arc<MemEngine> = Arc::new(MemEngine::new());
    let (db, _store, executor) = stack(engine.clone());
    bootstrap(&db, &executor);
    let (_db2, _store2, second) = stack(engine);
    assert!(matches!(second.init(&genesis()), Err(EngineError::InvalidGenesis(_))));
}

#[test]
fn test_inject_requires_ready() {
    let (_db, _store, executor) = stack(Arc::new(MemEngine::new()));
    let err = executor.inject(&block(2, vec![])).unwrap_err();
    assert!(matches!(
        err,
        EngineError::InvalidState { expected: ExecutorState::Ready, actual: ExecutorState::Uninitialized }
    ));
}
