mod block;
mod events;
mod genesis;

pub use block::{Block, BlockHeader, BlockId, Height, Tx, BLOCK_ID_SIZE};
pub use events::{Event, EventAttribute, TxResult};
pub use genesis::GenesisDoc;
