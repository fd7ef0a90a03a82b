use echomint_types::{BlockHeader, Event, GenesisDoc, Height, Tx, TxResult};
use thiserror::Error;

pub type AppHash = Vec<u8>;

/// An application-level execution failure. Returned from a lifecycle hook it
/// aborts the current injection, which the replica treats as fatal. Note the
/// distinction from a *failed transaction* (`TxResult` with a non-zero
/// code), which is a normal part of a finalized block.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct AppError(pub String);

#[derive(Debug, Clone)]
pub struct QueryRequest {
    pub path: String,
    pub data: Vec<u8>,
    /// Resolved by the replica to a height at or below the committed height
    /// before the application sees it
    pub height: Height,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryResponse {
    pub code: u32,
    pub value: Vec<u8>,
    pub log: String,
    /// The height the response was resolved at
    pub height: Height,
}

/// The embedded application: an opaque, deterministic state-transition
/// function. The replica drives it through the per-block lifecycle
/// (`begin_block`, each `deliver_tx` in order, `end_block`, `commit`) and
/// never interprets its state.
///
/// Lifecycle hooks are serialized by the executor (single writer); `query`
/// may be called concurrently with them at any time, which is safe because
/// every store read an implementation performs for a query is bounded to a
/// committed height by the multi-store.
pub trait Application: Send + Sync {
    /// Applies the chain's bootstrap state transition. Called exactly once,
    /// against an open genesis batch.
    fn init_chain(&self, genesis: &GenesisDoc) -> Result<AppHash, AppError>;

    /// Re-hydrates any in-memory view from the durable store after a
    /// restart or after the genesis batch was flushed
    fn load_state(&self, height: Height) -> Result<(), AppError>;

    fn begin_block(&self, header: &BlockHeader) -> Result<Vec<Event>, AppError>;

    fn deliver_tx(&self, tx: &Tx) -> Result<TxResult, AppError>;

    fn end_block(&self, height: Height) -> Result<Vec<Event>, AppError>;

    /// Finishes the block and returns the application hash of the resulting
    /// state
    fn commit(&self) -> Result<AppHash, AppError>;

    fn query(&self, request: QueryRequest) -> Result<QueryResponse, AppError>;
}
