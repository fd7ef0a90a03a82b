use crate::app::Application;
use crate::errors::{EngineError, EngineResult};
use crate::events::EventCollector;
use crate::notify::CommitNotifier;
use crate::query::QueryClient;
use async_channel::Receiver;
use echomint_database::prelude::StagedDb;
use echomint_database::StoreError;
use echomint_store::{ChainState, MultiStore};
use echomint_types::{Block, GenesisDoc, Height};
use log::{debug, info};
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExecutorState {
    Uninitialized,
    Initialized,
    Ready,
    Injecting,
}

/// The single-writer replay engine. Owns the injection lifecycle: genesis
/// initialization, then strictly sequential block injection against the
/// embedded application, with every mutation routed through the staged
/// multi-store.
///
/// Concurrent reads are served through [`QueryClient`] handles and never
/// synchronize with injection; the multi-store's committed-height bound
/// keeps in-flight writes invisible to them.
pub struct Executor {
    app: Arc<dyn Application>,
    db: Arc<StagedDb>,
    store: Arc<MultiStore>,
    state: Mutex<ExecutorState>,
    collector: RwLock<Arc<EventCollector>>,
    notifier: CommitNotifier,
}

impl Executor {
    pub fn new(app: Arc<dyn Application>, db: Arc<StagedDb>, store: Arc<MultiStore>) -> Self {
        Self {
            app,
            db,
            store,
            state: Mutex::new(ExecutorState::Uninitialized),
            collector: RwLock::new(Arc::new(EventCollector::default())),
            notifier: CommitNotifier::new(),
        }
    }

    pub fn state(&self) -> ExecutorState {
        *self.state.lock()
    }

    /// The committed height. Observes only fully committed state and is safe
    /// to call concurrently with injection.
    pub fn current_height(&self) -> Option<Height> {
        self.store.committed_height()
    }

    /// The events of the most recent injection, replaced wholesale per block
    pub fn event_collector(&self) -> Arc<EventCollector> {
        self.collector.read().clone()
    }

    pub fn query_client(&self) -> QueryClient {
        QueryClient::new(self.app.clone(), self.store.clone())
    }

    /// Subscribes to height-committed signals (best-effort, see
    /// [`CommitNotifier`])
    pub fn subscribe_commits(&self, capacity: usize) -> Receiver<Height> {
        self.notifier.register(capacity)
    }

    /// Applies the genesis document as the chain's bootstrap state
    /// transition, staging everything at `initial_height`. The caller owns
    /// the flush boundary: flush the batch, then call
    /// [`Executor::load_initial_state`].
    pub fn init(&self, genesis: &GenesisDoc) -> EngineResult<()> {
        self.require(ExecutorState::Uninitialized)?;
        genesis.validate().map_err(EngineError::InvalidGenesis)?;
        if genesis.chain_id != self.store.chain_id() {
            return Err(EngineError::InvalidGenesis(format!(
                "genesis is for chain {} but the replica is configured for {}",
                genesis.chain_id,
                self.store.chain_id()
            )));
        }
        if self.store.load()?.is_some() {
            return Err(EngineError::InvalidGenesis("store already carries chain state".into()));
        }

        self.db.open(genesis.initial_height)?;
        match self.bootstrap(genesis) {
            Ok(()) => {
                *self.state.lock() = ExecutorState::Initialized;
                info!("chain {} initialized at height {}", genesis.chain_id, genesis.initial_height);
                Ok(())
            }
            Err(err) => {
                self.db.discard();
                Err(err)
            }
        }
    }

    fn bootstrap(&self, genesis: &GenesisDoc) -> EngineResult<()> {
        let height = genesis.initial_height;
        let app_hash = self.app.init_chain(genesis).map_err(EngineError::app("init-chain", height))?;
        self.store.seal(height, None, app_hash)?;
        Ok(())
    }

    /// Re-hydrates the committed chain state from the durable store and the
    /// application's in-memory view from it, then moves to `Ready`. Valid
    /// after a flushed genesis batch, or directly after a restart when the
    /// store already carries chain state.
    pub fn load_initial_state(&self) -> EngineResult<ChainState> {
        {
            let state = self.state.lock();
            if !matches!(*state, ExecutorState::Uninitialized | ExecutorState::Initialized) {
                return Err(EngineError::InvalidState { expected: ExecutorState::Initialized, actual: *state });
            }
        }
        if let Some(height) = self.db.write_height() {
            return Err(EngineError::Store(StoreError::BatchAlreadyOpen(height)));
        }

        let chain = self.store.load()?.ok_or(EngineError::MissingChainState)?;
        self.app.load_state(chain.height).map_err(EngineError::app("load-state", chain.height))?;
        *self.collector.write() = Arc::new(EventCollector { height: chain.height, ..Default::default() });
        *self.state.lock() = ExecutorState::Ready;
        info!("replica ready at committed height {}", chain.height);
        Ok(chain)
    }

    /// Injects one finalized block: opens the batch at `block.height`,
    /// drives the application's per-block lifecycle, seals and flushes the
    /// batch, commits the multi-store and emits the height-committed signal.
    ///
    /// Any error is fatal: the stage is abandoned, the executor stays in
    /// `Injecting`, and the harness must terminate the process.
    pub fn inject(&self, block: &Block) -> EngineResult<ChainState> {
        self.transition(ExecutorState::Ready, ExecutorState::Injecting)?;
        match self.execute_block(block) {
            Ok(chain) => {
                *self.state.lock() = ExecutorState::Ready;
                Ok(chain)
            }
            Err(err) => {
                self.db.discard();
                Err(err)
            }
        }
    }

    fn execute_block(&self, block: &Block) -> EngineResult<ChainState> {
        let height = block.height();
        let expected = self.store.committed_height().ok_or(EngineError::MissingChainState)? + 1;
        if height != expected {
            return Err(EngineError::NonContiguousHeight { expected, got: height });
        }
        if block.header.chain_id != self.store.chain_id() {
            return Err(EngineError::ChainMismatch {
                height,
                expected: self.store.chain_id().to_string(),
                got: block.header.chain_id.clone(),
            });
        }

        self.db.open(height)?;

        let begin_block_events = self.app.begin_block(&block.header).map_err(EngineError::app("begin-block", height))?;
        let mut tx_results = Vec::with_capacity(block.txs.len());
        for tx in &block.txs {
            tx_results.push(self.app.deliver_tx(tx).map_err(EngineError::app("deliver-tx", height))?);
        }
        let end_block_events = self.app.end_block(height).map_err(EngineError::app("end-block", height))?;
        let app_hash = self.app.commit().map_err(EngineError::app("commit", height))?;

        self.store.seal(height, Some(block.id), app_hash)?;
        self.db.flush()?;
        let chain = self.store.commit()?;

        *self.collector.write() = Arc::new(EventCollector {
            height,
            block_id: Some(block.id),
            begin_block_events,
            tx_results,
            end_block_events,
        });
        self.notifier.notify(height);
        debug!("injected block {} at height {} ({} txs)", block.id, height, block.txs.len());
        Ok(chain)
    }

    fn require(&self, expected: ExecutorState) -> EngineResult<()> {
        let state = self.state.lock();
        if *state != expected {
            return Err(EngineError::InvalidState { expected, actual: *state });
        }
        Ok(())
    }

    fn transition(&self, expected: ExecutorState, next: ExecutorState) -> EngineResult<()> {
        let mut state = self.state.lock();
        if *state != expected {
            return Err(EngineError::InvalidState { expected, actual: *state });
        }
        *state = next;
        Ok(())
    }
}
