mod chain_state;
mod commitment;
mod multistore;
mod substore;

pub use chain_state::{ChainState, ChainStateStore};
pub use commitment::{mutation_commitment, Commitment, ZERO_COMMITMENT};
pub use multistore::{CommitmentMode, MultiStore};
pub use substore::SubStore;
