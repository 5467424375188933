use std::time::Duration;

/// Configuration for the gossip overlay.
#[derive(Debug, Clone)]
pub struct OverlayConfig {
    /// Stable identifier advertised in every envelope.
    pub node_id: String,
    /// TCP listen port; 0 binds an ephemeral port.
    pub listen_port: u16,
    /// `(host, port)` pairs dialed during discovery rounds.
    pub bootstrap: Vec<(String, u16)>,
    /// Protocol version advertised to peers.
    pub version: String,
    /// Cadence of bootstrap dialing and `peer_discovery` gossip.
    pub discovery_interval: Duration,
    /// Cadence of keepalive pings and stale-peer pruning.
    pub keepalive_interval: Duration,
    /// Seconds a seen message id is retained for deduplication.
    pub message_ttl_secs: f64,
    /// Cadence of seen-cache garbage collection.
    pub cleanup_interval: Duration,
    /// Peers unseen for this many seconds are dropped.
    pub peer_stale_secs: f64,
    /// Bound on outbound connection attempts.
    pub connect_timeout: Duration,
}

impl OverlayConfig {
    pub fn new(node_id: String, listen_port: u16) -> Self {
        Self {
            node_id,
            listen_port,
            bootstrap: Vec::new(),
            version: "1.0".to_string(),
            discovery_interval: Duration::from_secs(30),
            keepalive_interval: Duration::from_secs(60),
            message_ttl_secs: 3_600.0,
            cleanup_interval: Duration::from_secs(1_800),
            peer_stale_secs: 300.0,
            connect_timeout: Duration::from_secs(5),
        }
    }

    pub fn with_bootstrap(mut self, bootstrap: Vec<(String, u16)>) -> Self {
        self.bootstrap = bootstrap;
        self
    }

    /// The conventional local bootstrap set used when nothing is configured.
    pub fn default_bootstrap() -> Vec<(String, u16)> {
        vec![
            ("127.0.0.1".to_string(), 8000),
            ("127.0.0.1".to_string(), 8001),
            ("127.0.0.1".to_string(), 8002),
        ]
    }
}
