//! ferrite-core
//!
//! Domain types of the ferrite ledger: addresses, the transaction sum type
//! with its signing discipline, blocks with Merkle commitments, the
//! four-opcode smart-contract VM, the error taxonomy, and protocol
//! constants.

pub mod block;
pub mod constants;
pub mod contract;
pub mod error;
pub mod transaction;
pub mod types;

pub use block::Block;
pub use contract::{derive_contract_address, ContractTransfer, ExecutionResult, SmartContract};
pub use error::LedgerError;
pub use transaction::{BasicTx, CallTx, DeployTx, GenesisTx, MultisigTx, TimelockTx, Transaction};
pub use types::{unix_now, Address, Amount, Timestamp};
