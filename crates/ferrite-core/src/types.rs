use serde::{Deserialize, Serialize};
use std::fmt;

/// Account balance / transferred value. Fractional amounts are part of the
/// protocol: multisig application divides by the sender count and contract
/// calls move arbitrary values.
pub type Amount = f64;

/// Unix timestamp in seconds (UTC), fractional.
pub type Timestamp = f64;

/// Current wall-clock time as a fractional Unix timestamp.
pub fn unix_now() -> Timestamp {
    chrono::Utc::now().timestamp_micros() as f64 / 1_000_000.0
}

// ── Address ──────────────────────────────────────────────────────────────────

/// A ledger address: 20 lowercase hex characters derived from a public key
/// (double SHA-256 of the SPKI PEM, truncated). The sentinel `"0"` denotes
/// the coinbase sender of mining rewards.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Address(String);

impl Address {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// The `"0"` coinbase sender.
    pub fn coinbase() -> Self {
        Self("0".to_string())
    }

    pub fn is_coinbase(&self) -> bool {
        self.0 == "0"
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this is a well-formed wallet or contract address.
    pub fn is_well_formed(&self) -> bool {
        self.0.len() == 20
            && self.0.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase())
    }
}

impl From<&str> for Address {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self.0)
    }
}
