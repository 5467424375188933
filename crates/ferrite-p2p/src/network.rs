use std::collections::{HashMap, HashSet};
use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use ferrite_core::{unix_now, Block, LedgerError, Transaction};

use crate::config::OverlayConfig;
use crate::message::{Envelope, MessageKind};
use crate::peer::{Peer, PeerSnapshot};
use crate::SharedLedger;

/// Overlay statistics projected to the control surface.
#[derive(Clone, Debug, Serialize)]
pub struct NetworkStats {
    pub node_id: String,
    pub port: u16,
    pub uptime_seconds: f64,
    pub connected_peers: usize,
    pub known_peers: usize,
    pub messages_sent: u64,
    pub messages_received: u64,
    pub peer_list: Vec<PeerSnapshot>,
}

/// Owns the listener and the background timers. Consume with
/// `tokio::spawn(overlay.run())`.
pub struct Overlay {
    listener: TcpListener,
    state: Arc<OverlayState>,
}

/// Application-facing handle: broadcasting, sync triggers, statistics.
#[derive(Clone)]
pub struct OverlayHandle {
    state: Arc<OverlayState>,
}

struct OverlayState {
    config: OverlayConfig,
    /// Actual bound port (the configured one may have been 0).
    port: u16,
    ledger: SharedLedger,
    peers: Mutex<HashMap<String, Peer>>,
    /// Every `host:port` ever heard of, connected or not.
    known_peers: Mutex<HashSet<String>>,
    /// message_id → first-seen time, garbage-collected on a timer.
    seen: Mutex<HashMap<String, f64>>,
    messages_sent: AtomicU64,
    messages_received: AtomicU64,
    started_at: f64,
}

impl Overlay {
    /// Bind the listener and hand back the overlay plus its handle.
    pub async fn bind(config: OverlayConfig, ledger: SharedLedger) -> io::Result<(Self, OverlayHandle)> {
        let listener = TcpListener::bind(("0.0.0.0", config.listen_port)).await?;
        let port = listener.local_addr()?.port();

        let state = Arc::new(OverlayState {
            config,
            port,
            ledger,
            peers: Mutex::new(HashMap::new()),
            known_peers: Mutex::new(HashSet::new()),
            seen: Mutex::new(HashMap::new()),
            messages_sent: AtomicU64::new(0),
            messages_received: AtomicU64::new(0),
            started_at: unix_now(),
        });

        let handle = OverlayHandle { state: Arc::clone(&state) };
        Ok((Self { listener, state }, handle))
    }

    /// Accept loop plus the discovery, keepalive and cleanup timers. Run in
    /// a dedicated tokio task.
    pub async fn run(self) {
        let state = self.state;
        info!(node_id = %state.config.node_id, port = state.port, "overlay listening");

        tokio::spawn(discovery_loop(Arc::clone(&state)));
        tokio::spawn(keepalive_loop(Arc::clone(&state)));
        tokio::spawn(cleanup_loop(Arc::clone(&state)));

        loop {
            match self.listener.accept().await {
                Ok((stream, remote)) => {
                    debug!(remote = %remote, "inbound connection");
                    tokio::spawn(handle_connection(
                        Arc::clone(&state),
                        stream,
                        remote.ip().to_string(),
                        None,
                    ));
                }
                Err(e) => {
                    warn!(error = %e, "accept failed");
                    tokio::time::sleep(std::time::Duration::from_secs(1)).await;
                }
            }
        }
    }
}

impl OverlayHandle {
    pub fn node_id(&self) -> &str {
        &self.state.config.node_id
    }

    pub fn port(&self) -> u16 {
        self.state.port
    }

    /// Flood a transaction to all eligible peers.
    pub fn broadcast_transaction(&self, tx: &Transaction) {
        match serde_json::to_value(tx) {
            Ok(data) => self.state.broadcast(MessageKind::NewTransaction, data),
            Err(e) => warn!(error = %e, "failed to encode transaction for gossip"),
        }
    }

    /// Flood a block to all eligible peers.
    pub fn broadcast_block(&self, block: &Block) {
        match serde_json::to_value(block) {
            Ok(data) => self.state.broadcast(MessageKind::NewBlock, data),
            Err(e) => warn!(error = %e, "failed to encode block for gossip"),
        }
    }

    /// Ask every peer for its full chain (longest-chain consensus trigger).
    pub fn request_chain(&self) {
        self.state.request_chain();
    }

    /// Dial a peer outside the discovery schedule.
    pub fn connect(&self, host: &str, port: u16) {
        tokio::spawn(try_connect(Arc::clone(&self.state), host.to_string(), port));
    }

    pub fn connected_peer_count(&self) -> usize {
        self.state.peers.lock().values().filter(|p| p.is_connected).count()
    }

    pub fn peer_list(&self) -> Vec<PeerSnapshot> {
        self.state.peers.lock().values().map(Peer::snapshot).collect()
    }

    pub fn network_stats(&self) -> NetworkStats {
        let peers = self.state.peers.lock();
        NetworkStats {
            node_id: self.state.config.node_id.clone(),
            port: self.state.port,
            uptime_seconds: unix_now() - self.state.started_at,
            connected_peers: peers.values().filter(|p| p.is_connected).count(),
            known_peers: self.state.known_peers.lock().len(),
            messages_sent: self.state.messages_sent.load(Ordering::Relaxed),
            messages_received: self.state.messages_received.load(Ordering::Relaxed),
            peer_list: peers.values().map(Peer::snapshot).collect(),
        }
    }
}

// ── Message processing ───────────────────────────────────────────────────────

impl OverlayState {
    /// Record our own envelope ids before emission so a flooded copy coming
    /// back through a third peer is dropped instead of re-handled.
    fn stamp_own(&self, envelope: &Envelope) {
        self.seen.lock().insert(envelope.message_id.clone(), unix_now());
    }

    fn broadcast(&self, kind: MessageKind, data: Value) {
        let envelope = Envelope::new(kind, data, &self.config.node_id);
        self.stamp_own(&envelope);
        self.flood(&envelope, None);
    }

    fn request_chain(&self) {
        self.broadcast(MessageKind::ChainRequest, json!({}));
    }

    /// Forward to every connected, reputable peer except the sender. Failed
    /// sends mark the peer disconnected.
    fn flood(&self, envelope: &Envelope, exclude: Option<&str>) {
        let line = envelope.encode();
        let mut sent = 0u64;
        let mut peers = self.peers.lock();
        for (id, peer) in peers.iter_mut() {
            if Some(id.as_str()) == exclude || !peer.can_gossip() {
                continue;
            }
            if peer.send(line.clone()) {
                sent += 1;
            } else {
                peer.is_connected = false;
            }
        }
        self.messages_sent.fetch_add(sent, Ordering::Relaxed);
    }

    fn send_direct(&self, outbox: &mpsc::UnboundedSender<String>, envelope: &Envelope) {
        self.stamp_own(envelope);
        if outbox.send(envelope.encode()).is_ok() {
            self.messages_sent.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn known_peers_snapshot(&self) -> Vec<String> {
        let mut list: Vec<String> = self.known_peers.lock().iter().cloned().collect();
        list.sort();
        list
    }

    fn mark_disconnected(&self, node_id: &str) {
        if let Some(peer) = self.peers.lock().get_mut(node_id) {
            peer.is_connected = false;
            debug!(peer = %node_id, "peer disconnected");
        }
    }

    fn adjust_reputation(&self, node_id: &str, ok: bool) {
        if let Some(peer) = self.peers.lock().get_mut(node_id) {
            if ok {
                peer.reward();
            } else {
                peer.penalize();
            }
        }
    }

    /// One wire line: decode, dedup, upsert the sending peer, dispatch, and
    /// flood onward when the handler asks for it.
    fn process_line(
        &self,
        line: &str,
        outbox: &mpsc::UnboundedSender<String>,
        remote_ip: &str,
        conn_peer: &mut Option<String>,
    ) {
        let envelope = match Envelope::decode(line) {
            Ok(env) => env,
            Err(e) => {
                warn!(remote = remote_ip, error = %e, "malformed envelope");
                if let Some(id) = conn_peer.as_deref() {
                    self.adjust_reputation(id, false);
                }
                return;
            }
        };

        // Duplicate suppression before any handling or forwarding.
        {
            let mut seen = self.seen.lock();
            if seen.contains_key(&envelope.message_id) {
                return;
            }
            seen.insert(envelope.message_id.clone(), unix_now());
        }
        self.messages_received.fetch_add(1, Ordering::Relaxed);

        let sender_id = envelope.sender_id.clone();
        if sender_id != self.config.node_id {
            self.upsert_peer(&sender_id, remote_ip, outbox, conn_peer);
        }

        match self.handle_envelope(&envelope, outbox) {
            Ok(forward) => {
                if sender_id != self.config.node_id {
                    self.adjust_reputation(&sender_id, true);
                }
                if forward {
                    self.flood(&envelope, Some(sender_id.as_str()));
                }
            }
            Err(e) => {
                debug!(kind = ?envelope.kind, from = %sender_id, error = %e, "envelope handling failed");
                self.adjust_reputation(&sender_id, false);
            }
        }
    }

    /// Track the sender under its node id, folding away the provisional
    /// `host:port` entry an outbound dial registered.
    fn upsert_peer(
        &self,
        sender_id: &str,
        remote_ip: &str,
        outbox: &mpsc::UnboundedSender<String>,
        conn_peer: &mut Option<String>,
    ) {
        let mut peers = self.peers.lock();

        let mut carried: Option<Peer> = None;
        if conn_peer.as_deref() != Some(sender_id) {
            if let Some(old_key) = conn_peer.take() {
                carried = peers.remove(&old_key);
            }
        }

        let peer = peers.entry(sender_id.to_string()).or_insert_with(|| match carried {
            Some(previous) => Peer { node_id: sender_id.to_string(), ..previous },
            None => Peer::new(sender_id.to_string(), remote_ip.to_string(), 0, outbox.clone()),
        });
        peer.outbox = outbox.clone();
        peer.is_connected = true;
        peer.touch();

        *conn_peer = Some(sender_id.to_string());
    }

    /// Dispatch one envelope. `Ok(true)` floods it onward; `Ok(false)`
    /// handles without propagation (stale payloads, point-to-point replies);
    /// `Err` costs the sender reputation.
    fn handle_envelope(
        &self,
        envelope: &Envelope,
        outbox: &mpsc::UnboundedSender<String>,
    ) -> Result<bool, LedgerError> {
        match envelope.kind {
            MessageKind::PeerDiscovery => self.handle_peer_discovery(envelope, outbox),
            MessageKind::NewTransaction => self.handle_new_transaction(envelope),
            MessageKind::NewBlock => self.handle_new_block(envelope),
            MessageKind::ChainRequest => self.handle_chain_request(outbox),
            MessageKind::ChainResponse => self.handle_chain_response(envelope),
            MessageKind::Ping => {
                let pong = Envelope::new(
                    MessageKind::Pong,
                    json!({"timestamp": unix_now()}),
                    &self.config.node_id,
                );
                self.send_direct(outbox, &pong);
                Ok(false)
            }
            // Liveness was already recorded by the peer upsert.
            MessageKind::Pong => Ok(false),
        }
    }

    fn handle_peer_discovery(
        &self,
        envelope: &Envelope,
        outbox: &mpsc::UnboundedSender<String>,
    ) -> Result<bool, LedgerError> {
        // Union any gossiped peer list into ours.
        if let Some(list) = envelope.data.get("known_peers").and_then(Value::as_array) {
            let mut known = self.known_peers.lock();
            for entry in list {
                if let Some(addr) = entry.as_str() {
                    known.insert(addr.to_string());
                }
            }
        }

        // A connection introduction carries the peer's listen port.
        if let Some(port) = envelope.data.get("port").and_then(Value::as_u64) {
            let mut peers = self.peers.lock();
            if let Some(peer) = peers.get_mut(&envelope.sender_id) {
                peer.port = port as u16;
                if let Some(version) = envelope.data.get("version").and_then(Value::as_str) {
                    peer.version = version.to_string();
                }
                let addr = format!("{}:{}", peer.address, peer.port);
                drop(peers);
                self.known_peers.lock().insert(addr);
            }
        }

        // Answers are flagged so they never trigger an answer themselves;
        // without this, two peers echo discovery replies at each other
        // forever.
        if envelope.data.get("reply").and_then(Value::as_bool).unwrap_or(false) {
            return Ok(false);
        }

        // Answer with our own view of the network.
        let reply = Envelope::new(
            MessageKind::PeerDiscovery,
            json!({"known_peers": self.known_peers_snapshot(), "reply": true}),
            &self.config.node_id,
        );
        self.send_direct(outbox, &reply);
        Ok(true)
    }

    fn handle_new_transaction(&self, envelope: &Envelope) -> Result<bool, LedgerError> {
        let tx: Transaction = serde_json::from_value(envelope.data.clone())
            .map_err(|e| LedgerError::MalformedMessage(e.to_string()))?;

        let mut ledger = self.ledger.lock();

        if let Some(txid) = tx.txid() {
            if ledger.mempool().iter().any(|pending| pending.txid() == Some(txid)) {
                return Ok(false);
            }
        }

        match ledger.submit_transaction(tx) {
            Ok(_) => {
                debug!(from = %envelope.sender_id, "transaction accepted from gossip");
                Ok(true)
            }
            // Balance and timing misses are dropped silently on the gossip
            // path: the sender may simply be on a different chain view.
            Err(
                LedgerError::InsufficientBalance { .. }
                | LedgerError::InvalidAmount
                | LedgerError::UnknownAccount(_)
                | LedgerError::UnknownContract(_)
                | LedgerError::TimeLocked { .. },
            ) => Ok(false),
            Err(e) => Err(e),
        }
    }

    fn handle_new_block(&self, envelope: &Envelope) -> Result<bool, LedgerError> {
        let block: Block = serde_json::from_value(envelope.data.clone())
            .map_err(|e| LedgerError::MalformedMessage(e.to_string()))?;

        let mut ledger = self.ledger.lock();
        let local_height = ledger.chain_len() as u64;

        if block.index == local_height {
            if block.previous_hash != ledger.last_block().hash {
                debug!(index = block.index, "fork block at tip height, dropping");
                return Ok(false);
            }
            let committed = ledger.commit_block(block)?;
            info!(index = committed.index, hash = %committed.hash, "appended block from gossip");
            Ok(true)
        } else if block.index > local_height {
            drop(ledger);
            info!(
                received = block.index,
                local = local_height,
                "peer is ahead, requesting chain sync"
            );
            self.request_chain();
            Ok(false)
        } else {
            debug!(index = block.index, local = local_height, "stale block, dropping");
            Ok(false)
        }
    }

    fn handle_chain_request(&self, outbox: &mpsc::UnboundedSender<String>) -> Result<bool, LedgerError> {
        let chain = self.ledger.lock().chain_snapshot();
        let length = chain.len();
        let data = json!({"chain": chain, "length": length});
        let reply = Envelope::new(MessageKind::ChainResponse, data, &self.config.node_id);
        self.send_direct(outbox, &reply);
        Ok(true)
    }

    fn handle_chain_response(&self, envelope: &Envelope) -> Result<bool, LedgerError> {
        let chain_value = envelope
            .data
            .get("chain")
            .cloned()
            .ok_or_else(|| LedgerError::MalformedMessage("chain_response without chain".into()))?;
        let chain: Vec<Block> = serde_json::from_value(chain_value)
            .map_err(|e| LedgerError::MalformedMessage(e.to_string()))?;

        let mut ledger = self.ledger.lock();
        if ledger.adopt_chain(chain) {
            info!(from = %envelope.sender_id, height = ledger.chain_len(), "adopted peer chain");
        }
        Ok(false)
    }
}

// ── Connections ──────────────────────────────────────────────────────────────

/// Dial a peer with a bounded timeout and, on success, run the connection
/// with a provisional `host:port` identity until its first envelope arrives.
async fn try_connect(state: Arc<OverlayState>, host: String, port: u16) {
    let key = format!("{host}:{port}");
    {
        let peers = state.peers.lock();
        let already = peers.values().any(|p| p.is_connected && p.address == host && p.port == port)
            || peers.get(&key).is_some_and(|p| p.is_connected);
        if already {
            return;
        }
    }

    match tokio::time::timeout(state.config.connect_timeout, TcpStream::connect((host.as_str(), port))).await
    {
        Ok(Ok(stream)) => {
            debug!(peer = %key, "connected to peer");
            state.known_peers.lock().insert(key.clone());
            tokio::spawn(handle_connection(state, stream, host, Some((key, port))));
        }
        _ => {
            debug!(peer = %key, "peer not reachable");
        }
    }
}

/// One peer stream: a writer task draining an unbounded outbox, and a read
/// loop feeding lines into the overlay. Closing the stream cancels the read
/// loop; no half-open state survives.
async fn handle_connection(
    state: Arc<OverlayState>,
    stream: TcpStream,
    remote_ip: String,
    dialed: Option<(String, u16)>,
) {
    let (read_half, mut write_half) = stream.into_split();
    let (outbox, mut outbox_rx) = mpsc::unbounded_channel::<String>();

    let writer = tokio::spawn(async move {
        while let Some(line) = outbox_rx.recv().await {
            if write_half.write_all(line.as_bytes()).await.is_err() {
                break;
            }
            if write_half.write_all(b"\n").await.is_err() {
                break;
            }
        }
    });

    // For outbound dials: register a provisional peer and introduce
    // ourselves so the far side learns our node id and listen port.
    let mut conn_peer: Option<String> = None;
    if let Some((key, port)) = dialed {
        state
            .peers
            .lock()
            .insert(key.clone(), Peer::new(key.clone(), remote_ip.clone(), port, outbox.clone()));
        conn_peer = Some(key);

        let intro = Envelope::new(
            MessageKind::PeerDiscovery,
            json!({
                "node_id": state.config.node_id,
                "port": state.port,
                "version": state.config.version,
            }),
            &state.config.node_id,
        );
        state.send_direct(&outbox, &intro);
    }

    let mut reader = BufReader::new(read_half);
    let mut line = String::new();
    loop {
        line.clear();
        match reader.read_line(&mut line).await {
            Ok(0) | Err(_) => break,
            Ok(_) => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                state.process_line(trimmed, &outbox, &remote_ip, &mut conn_peer);
            }
        }
    }

    if let Some(id) = conn_peer {
        state.mark_disconnected(&id);
    }
    writer.abort();
}

// ── Timers ───────────────────────────────────────────────────────────────────

/// Every discovery round: dial the bootstrap set (skipping ourselves) and
/// gossip our `known_peers` so the sets converge.
async fn discovery_loop(state: Arc<OverlayState>) {
    let mut ticker = tokio::time::interval(state.config.discovery_interval);
    loop {
        ticker.tick().await;
        for (host, port) in state.config.bootstrap.clone() {
            if port == state.port && (host == "127.0.0.1" || host == "localhost" || host == "0.0.0.0") {
                continue;
            }
            try_connect(Arc::clone(&state), host, port).await;
        }

        state.broadcast(
            MessageKind::PeerDiscovery,
            json!({"known_peers": state.known_peers_snapshot()}),
        );
    }
}

/// Ping every connected peer and drop peers unseen for too long.
async fn keepalive_loop(state: Arc<OverlayState>) {
    let mut ticker = tokio::time::interval(state.config.keepalive_interval);
    ticker.tick().await; // the startup tick has nothing to ping yet
    loop {
        ticker.tick().await;

        let ping = Envelope::new(
            MessageKind::Ping,
            json!({"timestamp": unix_now()}),
            &state.config.node_id,
        );
        state.stamp_own(&ping);
        let line = ping.encode();
        {
            let mut peers = state.peers.lock();
            for peer in peers.values_mut().filter(|p| p.is_connected) {
                if !peer.send(line.clone()) {
                    peer.is_connected = false;
                }
            }
        }

        let now = unix_now();
        let stale = state.config.peer_stale_secs;
        state.peers.lock().retain(|id, peer| {
            if now - peer.last_seen > stale {
                info!(peer = %id, "removing stale peer");
                false
            } else {
                true
            }
        });
    }
}

/// Garbage-collect seen message ids past their TTL.
async fn cleanup_loop(state: Arc<OverlayState>) {
    let mut ticker = tokio::time::interval(state.config.cleanup_interval);
    ticker.tick().await;
    loop {
        ticker.tick().await;
        let now = unix_now();
        let ttl = state.config.message_ttl_secs;
        let mut seen = state.seen.lock();
        let before = seen.len();
        seen.retain(|_, first_seen| now - *first_seen <= ttl);
        let removed = before - seen.len();
        if removed > 0 {
            debug!(removed, retained = seen.len(), "seen-message cache cleaned");
        }
    }
}
