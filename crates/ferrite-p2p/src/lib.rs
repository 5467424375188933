//! ferrite-p2p
//!
//! The gossip overlay: long-lived bidirectional peer connections carrying
//! newline-delimited JSON envelopes over TCP. Duplicate-suppressed flooding
//! propagates transactions and blocks; chain request/response handles
//! on-demand sync; per-peer reputation gates gossip eligibility.

pub mod config;
pub mod message;
pub mod network;
pub mod peer;

use std::sync::Arc;

use ferrite_chain::Ledger;

/// The ledger handle shared between the control surface and the overlay.
/// Every mutation happens under this one lock, held only across synchronous
/// engine calls, never across I/O.
pub type SharedLedger = Arc<parking_lot::Mutex<Ledger>>;

pub use config::OverlayConfig;
pub use message::{Envelope, MessageKind};
pub use network::{NetworkStats, Overlay, OverlayHandle};
pub use peer::{Peer, PeerSnapshot};
