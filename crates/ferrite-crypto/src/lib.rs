//! ferrite-crypto
//!
//! Cryptographic primitives for the ferrite ledger.
//!
//! SHA-256 hashing, the canonical JSON encoding used for every hash and
//! signature pre-image, secp256k1 ECDSA wallets with PEM-encoded public
//! keys, the leading-zero-hex proof-of-work predicate, and the pairwise
//! Merkle tree over transaction hashes.

pub mod canonical;
pub mod hash;
pub mod keys;
pub mod merkle;
pub mod pow;

pub use canonical::canonical_json;
pub use hash::{sha256_hex, sha256_hex_str};
pub use keys::{address_from_pem, Wallet};
pub use merkle::merkle_root;
pub use pow::{proof_of_work, valid_proof};
