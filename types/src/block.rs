use serde::{Deserialize, Serialize};
use std::fmt::{Debug, Display, Formatter};
use std::str::{self, FromStr};
use thiserror::Error;

/// The discrete, monotonically increasing index of a block in the replicated chain
pub type Height = u64;

pub const BLOCK_ID_SIZE: usize = 32;

/// Canonical identifier of a finalized block, as reported by upstream sources
#[derive(PartialEq, Eq, Clone, Copy, Hash, Default, Serialize, Deserialize)]
pub struct BlockId([u8; BLOCK_ID_SIZE]);

impl BlockId {
    pub const fn from_bytes(bytes: [u8; BLOCK_ID_SIZE]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; BLOCK_ID_SIZE] {
        &self.0
    }
}

impl Display for BlockId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let mut hex = [0u8; BLOCK_ID_SIZE * 2];
        faster_hex::hex_encode(&self.0, &mut hex).expect("The output is exactly twice the size of the input");
        f.write_str(str::from_utf8(&hex).expect("hex is always valid UTF-8"))
    }
}

impl Debug for BlockId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(self, f)
    }
}

#[derive(Error, PartialEq, Eq, Clone, Debug)]
pub enum BlockIdParseError {
    #[error("block id is not valid hex: {0}")]
    InvalidHex(String),

    #[error("block id must encode exactly {BLOCK_ID_SIZE} bytes")]
    InvalidLength,
}

impl FromStr for BlockId {
    type Err = BlockIdParseError;

    fn from_str(id_str: &str) -> Result<Self, Self::Err> {
        if id_str.len() != BLOCK_ID_SIZE * 2 {
            return Err(BlockIdParseError::InvalidLength);
        }
        let mut bytes = [0u8; BLOCK_ID_SIZE];
        faster_hex::hex_decode(id_str.as_bytes(), &mut bytes)
            .map_err(|err| BlockIdParseError::InvalidHex(err.to_string()))?;
        Ok(BlockId(bytes))
    }
}

/// An opaque, application-interpreted transaction payload
pub type Tx = Vec<u8>;

/// Metadata of a finalized block, passed to the application's begin-block hook
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
    pub chain_id: String,
    pub height: Height,
    /// Unix time of block finalization, in milliseconds
    pub time_ms: u64,
    /// Application hash the upstream chain committed for the *previous* block
    pub app_hash: Vec<u8>,
}

/// A finalized block received from an upstream source. Immutable once received.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub header: BlockHeader,
    pub id: BlockId,
    pub txs: Vec<Tx>,
}

impl Block {
    pub fn height(&self) -> Height {
        self.header.height
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_id_roundtrip() {
        let id_str = "8e40af02265360d59f4ecf9ae9ebf8f00a3118408f5a9cdcbcc9c0f93642f3af";
        let id = BlockId::from_str(id_str).unwrap();
        assert_eq!(id_str, id.to_string());

        let other = BlockId::from_str("8e40af02265360d59f4ecf9ae9ebf8f00a3118408f5a9cdcbcc9c0f93642f3ab").unwrap();
        assert_ne!(id, other);

        assert_eq!(BlockId::from_str("8e40af"), Err(BlockIdParseError::InvalidLength));
        assert!(matches!(
            BlockId::from_str("zz40af02265360d59f4ecf9ae9ebf8f00a3118408f5a9cdcbcc9c0f93642f3af"),
            Err(BlockIdParseError::InvalidHex(_))
        ));
    }
}
