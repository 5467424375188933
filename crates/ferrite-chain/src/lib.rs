//! ferrite-chain
//!
//! The ledger state machine: owns the chain, the mempool, the derived
//! balance state and the deployed contracts. Validates and applies blocks,
//! rebuilds state after a reorganisation, and decides longest-valid-chain
//! adoption.

pub mod engine;
pub mod genesis;

pub use engine::{Ledger, LedgerConfig, LedgerStats, MiningTarget};
pub use genesis::GenesisSeed;
