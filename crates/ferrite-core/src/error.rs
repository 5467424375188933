use thiserror::Error;

#[derive(Debug, Error)]
pub enum LedgerError {
    // ── Transaction errors ───────────────────────────────────────────────────
    #[error("invalid signature")]
    InvalidSignature,

    #[error("insufficient balance: need {need}, have {have}")]
    InsufficientBalance { need: f64, have: f64 },

    #[error("amount must be greater than zero")]
    InvalidAmount,

    #[error("unknown account: {0}")]
    UnknownAccount(String),

    #[error("signer {0} is not a listed sender")]
    SignerNotListed(String),

    #[error("transaction is time-locked until {unlock_time}")]
    TimeLocked { unlock_time: f64 },

    #[error("invalid transaction: {0}")]
    InvalidTransaction(String),

    // ── Contract errors ──────────────────────────────────────────────────────
    #[error("unknown contract: {0}")]
    UnknownContract(String),

    // ── Block / chain errors ─────────────────────────────────────────────────
    #[error("invalid block: {0}")]
    InvalidBlock(String),

    #[error("proof went stale: chain tip moved during mining")]
    StaleProof,

    // ── Node / overlay errors ────────────────────────────────────────────────
    #[error("wallet not found: {0}")]
    UnknownWallet(String),

    #[error("malformed message: {0}")]
    MalformedMessage(String),

    #[error("peer unavailable: {0}")]
    PeerUnavailable(String),

    // ── General ──────────────────────────────────────────────────────────────
    #[error("{0}")]
    Other(String),
}
