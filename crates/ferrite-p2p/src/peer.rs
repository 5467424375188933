use serde::Serialize;
use tokio::sync::mpsc;
use tracing::warn;

use ferrite_core::unix_now;

/// Reputation bounds and adjustments. Peers start at the maximum; valid
/// messages earn +1, handler failures cost 5; peers at or below the gossip
/// floor are excluded from flooding.
pub const REPUTATION_START: i32 = 100;
pub const REPUTATION_MAX: i32 = 100;
pub const REPUTATION_REWARD: i32 = 1;
pub const REPUTATION_PENALTY: i32 = 5;
pub const GOSSIP_REPUTATION_FLOOR: i32 = 20;

/// One known peer and the writer side of its connection, when live.
pub struct Peer {
    pub node_id: String,
    pub address: String,
    /// The peer's advertised listen port (0 until learned via discovery).
    pub port: u16,
    pub version: String,
    pub last_seen: f64,
    pub reputation: i32,
    pub is_connected: bool,
    pub(crate) outbox: mpsc::UnboundedSender<String>,
}

impl Peer {
    pub fn new(node_id: String, address: String, port: u16, outbox: mpsc::UnboundedSender<String>) -> Self {
        Self {
            node_id,
            address,
            port,
            version: "1.0".to_string(),
            last_seen: unix_now(),
            reputation: REPUTATION_START,
            is_connected: true,
            outbox,
        }
    }

    pub fn touch(&mut self) {
        self.last_seen = unix_now();
    }

    pub fn reward(&mut self) {
        self.reputation = (self.reputation + REPUTATION_REWARD).min(REPUTATION_MAX);
    }

    pub fn penalize(&mut self) {
        self.reputation = (self.reputation - REPUTATION_PENALTY).max(0);
        if self.reputation < GOSSIP_REPUTATION_FLOOR {
            warn!(peer = %self.node_id, reputation = self.reputation, "peer reputation very low");
        }
    }

    /// Eligible as a flood target.
    pub fn can_gossip(&self) -> bool {
        self.is_connected && self.reputation > GOSSIP_REPUTATION_FLOOR
    }

    /// Queue a wire line; returns false when the connection is gone.
    pub fn send(&self, line: String) -> bool {
        self.outbox.send(line).is_ok()
    }

    pub fn snapshot(&self) -> PeerSnapshot {
        PeerSnapshot {
            node_id: self.node_id.clone(),
            address: self.address.clone(),
            port: self.port,
            last_seen: self.last_seen,
            reputation: self.reputation,
            is_connected: self.is_connected,
            version: self.version.clone(),
        }
    }
}

/// Read-only projection of a peer for the control surface.
#[derive(Clone, Debug, Serialize)]
pub struct PeerSnapshot {
    pub node_id: String,
    pub address: String,
    pub port: u16,
    pub last_seen: f64,
    pub reputation: i32,
    pub is_connected: bool,
    pub version: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_peer() -> (Peer, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Peer::new("p1".into(), "127.0.0.1".into(), 9000, tx), rx)
    }

    #[test]
    fn reputation_is_clamped() {
        let (mut peer, _rx) = test_peer();
        peer.reward();
        assert_eq!(peer.reputation, REPUTATION_MAX);

        for _ in 0..50 {
            peer.penalize();
        }
        assert_eq!(peer.reputation, 0);
    }

    #[test]
    fn gossip_floor_gates_eligibility() {
        let (mut peer, _rx) = test_peer();
        assert!(peer.can_gossip());

        // 16 penalties: 100 - 80 = 20, which is at the floor, not above it.
        for _ in 0..16 {
            peer.penalize();
        }
        assert_eq!(peer.reputation, 20);
        assert!(!peer.can_gossip());

        peer.reputation = 21;
        assert!(peer.can_gossip());
        peer.is_connected = false;
        assert!(!peer.can_gossip());
    }

    #[test]
    fn send_reports_closed_connection() {
        let (peer, rx) = test_peer();
        assert!(peer.send("hello".into()));
        drop(rx);
        assert!(!peer.send("gone".into()));
    }
}
