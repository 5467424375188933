use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use ferrite_crypto::{canonical_json, merkle_root, sha256_hex_str};

use crate::transaction::Transaction;
use crate::types::{unix_now, Timestamp};

/// One block of the chain: a header committing to an ordered transaction
/// list through a Merkle root, linked to its predecessor by hash.
///
/// `proof` is the canonical PoW nonce; `nonce` is carried in the header but
/// reserved (always zero). Transaction order inside a block is
/// consensus-relevant: application is left to right.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Block {
    pub index: u64,
    pub timestamp: Timestamp,
    pub transactions: Vec<Transaction>,
    pub proof: u64,
    pub previous_hash: String,
    pub miner_address: String,
    pub difficulty: u32,
    pub nonce: u64,
    pub merkle_root: String,
    pub hash: String,
}

impl Block {
    /// Build a block stamped with the current time.
    pub fn new(
        index: u64,
        transactions: Vec<Transaction>,
        proof: u64,
        previous_hash: String,
        miner_address: String,
        difficulty: u32,
    ) -> Self {
        Self::at_timestamp(index, transactions, proof, previous_hash, miner_address, difficulty, unix_now())
    }

    /// Build a block at an explicit timestamp (genesis construction and
    /// deterministic tests).
    pub fn at_timestamp(
        index: u64,
        transactions: Vec<Transaction>,
        proof: u64,
        previous_hash: String,
        miner_address: String,
        difficulty: u32,
        timestamp: Timestamp,
    ) -> Self {
        let mut block = Self {
            index,
            timestamp,
            transactions,
            proof,
            previous_hash,
            miner_address,
            difficulty,
            nonce: 0,
            merkle_root: String::new(),
            hash: String::new(),
        };
        block.merkle_root = block.compute_merkle_root();
        block.hash = block.compute_hash();
        block
    }

    /// Merkle root over the canonical encodings of the transactions,
    /// signatures included.
    pub fn compute_merkle_root(&self) -> String {
        let leaves: Vec<String> = self
            .transactions
            .iter()
            .map(|tx| sha256_hex_str(&canonical_json(tx)))
            .collect();
        merkle_root(&leaves)
    }

    /// SHA-256 of the canonical header. The transaction list enters only
    /// through `merkle_root`.
    pub fn compute_hash(&self) -> String {
        sha256_hex_str(&canonical_json(&self.header()))
    }

    fn header(&self) -> Value {
        json!({
            "index": self.index,
            "timestamp": self.timestamp,
            "merkle_root": self.merkle_root,
            "proof": self.proof,
            "previous_hash": self.previous_hash,
            "nonce": self.nonce,
            "difficulty": self.difficulty,
            "miner_address": self.miner_address,
        })
    }
}
