//! ─── Ferrite Protocol Constants ─────────────────────────────────────────────

use crate::types::Amount;

// ── Supply ───────────────────────────────────────────────────────────────────

/// Coins credited to the genesis wallet. The only minting after this point
/// is the per-block mining reward.
pub const INITIAL_SUPPLY: Amount = 1_000.0;

/// Coinbase reward per mined block.
pub const MINING_REWARD: Amount = 1.0;

/// Flat fee debited by contract deployments and calls. Fees are burned:
/// nothing is ever credited with them.
pub const TRANSACTION_FEE: Amount = 0.001;

// ── Genesis ──────────────────────────────────────────────────────────────────

/// `previous_hash` of the genesis block.
pub const GENESIS_PREVIOUS_HASH: &str = "0";

/// Fixed proof carried by the genesis block (never checked against PoW).
pub const GENESIS_PROOF: u64 = 100;

/// `miner_address` recorded in the genesis block header.
pub const GENESIS_MINER: &str = "genesis";

// ── Proof-of-Work ────────────────────────────────────────────────────────────

/// Leading `'0'` hex characters required of a block hash at launch.
pub const INITIAL_DIFFICULTY: u32 = 4;

pub const MIN_DIFFICULTY: u32 = 1;
pub const MAX_DIFFICULTY: u32 = 10;

/// Desired seconds between blocks.
pub const TARGET_BLOCK_TIME_SECS: f64 = 10.0;

/// Difficulty retargets every this many blocks.
pub const DIFFICULTY_ADJUSTMENT_INTERVAL: usize = 5;

// ── Mempool ──────────────────────────────────────────────────────────────────

/// Pending transactions held before the oldest is dropped with a warning.
pub const MEMPOOL_CAP: usize = 10_000;
