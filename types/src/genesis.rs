use crate::Height;
use serde::{Deserialize, Serialize};

/// The chain's bootstrap document. Parsed from a JSON file at startup; the
/// `app_state` payload is opaque to the replica and handed verbatim to the
/// embedded application's init-chain hook.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenesisDoc {
    pub chain_id: String,
    #[serde(default = "default_initial_height")]
    pub initial_height: Height,
    #[serde(default)]
    pub app_state: serde_json::Value,
}

fn default_initial_height() -> Height {
    1
}

impl GenesisDoc {
    /// Structural validation only; the application judges `app_state` itself
    pub fn validate(&self) -> Result<(), String> {
        if self.chain_id.is_empty() {
            return Err("genesis chain_id must not be empty".into());
        }
        if self.initial_height == 0 {
            return Err("genesis initial_height must be at least 1".into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_genesis_defaults() {
        let doc: GenesisDoc = serde_json::from_str(r#"{ "chain_id": "test-1" }"#).unwrap();
        assert_eq!(doc.initial_height, 1);
        assert!(doc.validate().is_ok());
    }

    #[test]
    fn test_genesis_validation() {
        let doc: GenesisDoc = serde_json::from_str(r#"{ "chain_id": "", "initial_height": 0 }"#).unwrap();
        assert!(doc.validate().is_err());

        let doc: GenesisDoc = serde_json::from_str(r#"{ "chain_id": "test-1", "initial_height": 0 }"#).unwrap();
        assert!(doc.validate().is_err());
    }
}
