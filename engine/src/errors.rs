use crate::app::AppError;
use crate::executor::ExecutorState;
use echomint_database::StoreError;
use echomint_types::Height;
use thiserror::Error;

/// Replay-path failures. Every variant is fatal to the replay path: the
/// harness driving the executor must terminate the process and rely on
/// crash-only recovery (replaying forward from the last durable committed
/// height). There is no partial-degradation mode for injection.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("operation requires executor state {expected:?} but state is {actual:?}")]
    InvalidState { expected: ExecutorState, actual: ExecutorState },

    #[error("non-contiguous injection: expected height {expected}, got block at height {got}")]
    NonContiguousHeight { expected: Height, got: Height },

    #[error("block at height {height} belongs to chain {got}, replica follows {expected}")]
    ChainMismatch { height: Height, expected: String, got: String },

    #[error("invalid genesis document: {0}")]
    InvalidGenesis(String),

    #[error("no chain state in store; genesis initialization is required")]
    MissingChainState,

    #[error("application {phase} failed at height {height}: {source}")]
    App {
        phase: &'static str,
        height: Height,
        #[source]
        source: AppError,
    },

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type EngineResult<T> = std::result::Result<T, EngineError>;

impl EngineError {
    pub(crate) fn app(phase: &'static str, height: Height) -> impl FnOnce(AppError) -> EngineError {
        move |source| EngineError::App { phase, height, source }
    }
}
