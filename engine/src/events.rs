use echomint_types::{BlockId, Event, Height, TxResult};

/// Everything the application emitted during the most recent injection.
/// Owned by the executor and replaced wholesale per block; external indexers
/// read it through [`crate::Executor::event_collector`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EventCollector {
    pub height: Height,
    pub block_id: Option<BlockId>,
    pub begin_block_events: Vec<Event>,
    pub tx_results: Vec<TxResult>,
    pub end_block_events: Vec<Event>,
}

impl EventCollector {
    pub fn tx_count(&self) -> usize {
        self.tx_results.len()
    }

    pub fn failed_tx_count(&self) -> usize {
        self.tx_results.iter().filter(|result| !result.is_ok()).count()
    }
}
