use sha2::{Digest, Sha256};

pub type Commitment = [u8; 32];

pub const ZERO_COMMITMENT: Commitment = [0u8; 32];

/// Binary-merkle digest over a block's flushed mutation set.
///
/// Leaves are `sha256(len(key) || key || value)` over the stage's entries in
/// physical key order; odd nodes pair with the zero commitment. This is a
/// tamper-evidence digest for audit, not a proof system.
pub fn mutation_commitment(entries: &[(Vec<u8>, Vec<u8>)]) -> Commitment {
    let mut level: Vec<Commitment> = entries
        .iter()
        .map(|(key, value)| {
            let mut hasher = Sha256::new();
            hasher.update((key.len() as u64).to_be_bytes());
            hasher.update(key);
            hasher.update(value);
            hasher.finalize().into()
        })
        .collect();

    if level.is_empty() {
        return ZERO_COMMITMENT;
    }

    while level.len() > 1 {
        level = level
            .chunks(2)
            .map(|pair| {
                let mut hasher = Sha256::new();
                hasher.update(pair[0]);
                hasher.update(pair.get(1).unwrap_or(&ZERO_COMMITMENT));
                hasher.finalize().into()
            })
            .collect();
    }
    level[0]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(key: &[u8], value: &[u8]) -> (Vec<u8>, Vec<u8>) {
        (key.to_vec(), value.to_vec())
    }

    #[test]
    fn test_empty_returns_zero_commitment() {
        assert_eq!(mutation_commitment(&[]), ZERO_COMMITMENT);
    }

    #[test]
    fn test_commitment_is_deterministic_and_order_sensitive() {
        let a = vec![entry(b"a", b"1"), entry(b"b", b"2")];
        let b = vec![entry(b"b", b"2"), entry(b"a", b"1")];
        assert_eq!(mutation_commitment(&a), mutation_commitment(&a));
        assert_ne!(mutation_commitment(&a), mutation_commitment(&b));
        assert_ne!(mutation_commitment(&a), ZERO_COMMITMENT);
    }

    #[test]
    fn test_length_prefix_disambiguates_boundaries() {
        // same concatenated bytes, different key/value split
        let a = vec![entry(b"ab", b"c")];
        let b = vec![entry(b"a", b"bc")];
        assert_ne!(mutation_commitment(&a), mutation_commitment(&b));
    }
}
