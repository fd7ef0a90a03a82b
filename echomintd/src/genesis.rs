use echomint_types::GenesisDoc;
use log::info;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GenesisError {
    #[error("cannot read genesis file: {0}")]
    Io(#[from] std::io::Error),

    #[error("cannot parse genesis file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid genesis document: {0}")]
    Invalid(String),
}

/// Reads and parses the genesis document. The content checksum is logged at
/// startup so operators can audit which genesis a replica was built from.
pub fn load_genesis(path: &Path) -> Result<GenesisDoc, GenesisError> {
    let raw = fs::read(path)?;
    let checksum = Sha256::digest(&raw);
    info!("genesis {} sha256={}", path.display(), faster_hex::hex_string(&checksum));

    let doc: GenesisDoc = serde_json::from_slice(&raw)?;
    doc.validate().map_err(GenesisError::Invalid)?;
    Ok(doc)
}
