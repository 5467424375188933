use ferrite_core::constants::{GENESIS_MINER, GENESIS_PREVIOUS_HASH, GENESIS_PROOF};
use ferrite_core::{unix_now, Address, Amount, Block, GenesisTx, Timestamp, Transaction};
use ferrite_crypto::Wallet;

/// Everything needed to build a deterministic genesis block. Two nodes
/// sharing a seed produce byte-identical genesis blocks and can exchange
/// blocks directly; nodes with independent seeds only converge through
/// full-chain sync.
#[derive(Clone)]
pub struct GenesisSeed {
    pub wallet: Wallet,
    pub timestamp: Timestamp,
}

impl Default for GenesisSeed {
    fn default() -> Self {
        Self { wallet: Wallet::create(), timestamp: unix_now() }
    }
}

/// Block 0: `previous_hash = "0"`, a fixed proof, and a single genesis
/// pseudo-transaction crediting the seed wallet with the initial supply.
pub(crate) fn build_genesis_block(seed: &GenesisSeed, supply: Amount, difficulty: u32) -> Block {
    let credit = GenesisTx::new(Address::new(seed.wallet.address()), supply, seed.timestamp);
    Block::at_timestamp(
        0,
        vec![Transaction::Genesis(credit)],
        GENESIS_PROOF,
        GENESIS_PREVIOUS_HASH.to_string(),
        GENESIS_MINER.to_string(),
        difficulty,
        seed.timestamp,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shared_seed_gives_identical_genesis() {
        let seed = GenesisSeed::default();
        let a = build_genesis_block(&seed, 1000.0, 4);
        let b = build_genesis_block(&seed, 1000.0, 4);
        assert_eq!(a, b);
        assert_eq!(a.hash, b.hash);
    }

    #[test]
    fn independent_seeds_diverge() {
        let a = build_genesis_block(&GenesisSeed::default(), 1000.0, 4);
        let b = build_genesis_block(&GenesisSeed::default(), 1000.0, 4);
        assert_ne!(a.hash, b.hash);
    }

    #[test]
    fn genesis_credits_the_seed_wallet() {
        let seed = GenesisSeed::default();
        let block = build_genesis_block(&seed, 1000.0, 4);
        assert_eq!(block.index, 0);
        assert_eq!(block.previous_hash, "0");
        match &block.transactions[..] {
            [Transaction::Genesis(g)] => {
                assert!(g.sender.is_coinbase());
                assert_eq!(g.recipient.as_str(), seed.wallet.address());
                assert_eq!(g.amount, 1000.0);
            }
            other => panic!("unexpected genesis transactions: {other:?}"),
        }
    }
}
