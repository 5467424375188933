use ferrite_core::{Block, LedgerError};
use ferrite_crypto::valid_proof;

/// Structural validity of a candidate block against its intended position:
///
/// 1. Index continuity
/// 2. Hash linkage to the predecessor
/// 3. PoW predicate over (previous_hash, proof, difficulty)
/// 4. Merkle root recomputation
/// 5. Header hash recomputation
///
/// Balance and signature checks belong to the chain engine, which replays
/// the transactions against a scratch copy of state.
pub fn validate_structure(
    block: &Block,
    expected_index: u64,
    previous_hash: &str,
) -> Result<(), LedgerError> {
    if block.index != expected_index {
        return Err(LedgerError::InvalidBlock(format!(
            "index {} does not extend chain at height {expected_index}",
            block.index
        )));
    }

    if block.previous_hash != previous_hash {
        return Err(LedgerError::InvalidBlock(format!(
            "previous_hash {} does not match tip {previous_hash}",
            block.previous_hash
        )));
    }

    if !valid_proof(&block.previous_hash, block.proof, block.difficulty) {
        return Err(LedgerError::InvalidBlock(format!(
            "proof {} fails difficulty {}",
            block.proof, block.difficulty
        )));
    }

    if block.merkle_root != block.compute_merkle_root() {
        return Err(LedgerError::InvalidBlock("merkle root mismatch".into()));
    }

    if block.hash != block.compute_hash() {
        return Err(LedgerError::InvalidBlock("header hash mismatch".into()));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ferrite_crypto::proof_of_work;

    fn mined_block(index: u64, previous_hash: &str, difficulty: u32) -> Block {
        let proof = proof_of_work(previous_hash, difficulty);
        Block::new(index, vec![], proof, previous_hash.into(), "miner".into(), difficulty)
    }

    #[test]
    fn well_formed_block_passes() {
        let block = mined_block(1, "tiphash", 2);
        assert!(validate_structure(&block, 1, "tiphash").is_ok());
    }

    #[test]
    fn wrong_index_fails() {
        let block = mined_block(2, "tiphash", 2);
        assert!(matches!(
            validate_structure(&block, 1, "tiphash"),
            Err(LedgerError::InvalidBlock(_))
        ));
    }

    #[test]
    fn wrong_link_fails() {
        let block = mined_block(1, "tiphash", 2);
        assert!(validate_structure(&block, 1, "otherhash").is_err());
    }

    #[test]
    fn bad_proof_fails() {
        let mut block = mined_block(1, "tiphash", 3);
        block.proof += 1;
        block.hash = block.compute_hash();
        assert!(validate_structure(&block, 1, "tiphash").is_err());
    }

    #[test]
    fn tampered_merkle_fails() {
        let mut block = mined_block(1, "tiphash", 2);
        block.merkle_root = "0".repeat(64);
        block.hash = block.compute_hash();
        assert!(validate_structure(&block, 1, "tiphash").is_err());
    }

    #[test]
    fn tampered_hash_fails() {
        let mut block = mined_block(1, "tiphash", 2);
        block.hash = "0".repeat(64);
        assert!(validate_structure(&block, 1, "tiphash").is_err());
    }
}
