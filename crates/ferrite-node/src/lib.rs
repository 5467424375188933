//! ferrite-node
//!
//! The node handle: one owned instance wiring the ledger, the wallet
//! registry and the gossip overlay together behind a plain method surface.
//! An HTTP control API for wallet clients is an external collaborator that
//! calls these methods; nothing here depends on its shape.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::io;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info};

pub use ferrite_chain::{GenesisSeed, Ledger, LedgerConfig, LedgerStats};
use ferrite_core::{
    Address, Amount, BasicTx, Block, CallTx, DeployTx, LedgerError, MultisigTx, SmartContract,
    TimelockTx, Timestamp, Transaction,
};
use ferrite_crypto::{proof_of_work, Wallet};
use ferrite_p2p::{NetworkStats, Overlay, OverlayConfig, OverlayHandle, PeerSnapshot, SharedLedger};

// ── Configuration ────────────────────────────────────────────────────────────

#[derive(Clone, Default)]
pub struct NodeConfig {
    /// Stable node identifier; minted at random when omitted.
    pub node_id: Option<String>,
    /// Peers dialed by the overlay's discovery rounds.
    pub bootstrap: Vec<(String, u16)>,
    pub ledger: LedgerConfig,
}

// ── Projections ──────────────────────────────────────────────────────────────

#[derive(Clone, Debug, Serialize)]
pub struct WalletInfo {
    pub wallet_id: String,
    pub address: Address,
    pub balance: Amount,
}

#[derive(Clone, Debug, Serialize)]
pub struct WalletDetail {
    pub wallet_id: String,
    pub address: Address,
    pub balance: Amount,
    pub public_key_pem: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct NetworkInfo {
    pub node_id: String,
    pub p2p_enabled: bool,
    pub p2p_port: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<NetworkStats>,
    pub legacy_nodes: Vec<String>,
}

#[derive(Clone, Debug, Serialize)]
pub struct NodeStats {
    pub node_id: String,
    pub ledger: LedgerStats,
    pub network: NetworkInfo,
}

#[derive(Clone, Debug, Serialize)]
pub struct DifficultyInfo {
    pub current_difficulty: u32,
    pub target_block_time: f64,
    pub adjustment_interval: usize,
    pub transaction_fee: Amount,
}

/// Shape of a legacy collaborator's `GET /chain` answer.
#[derive(Deserialize)]
struct ChainPayload {
    chain: Vec<Block>,
    length: usize,
}

// ── Node ─────────────────────────────────────────────────────────────────────

/// A running ledger node. All shared state sits behind its own lock; no
/// lock is ever held across I/O.
pub struct Node {
    node_id: String,
    ledger: SharedLedger,
    overlay: Mutex<Option<OverlayHandle>>,
    wallets: Mutex<BTreeMap<String, Wallet>>,
    miner_address: Address,
    legacy_nodes: Mutex<BTreeSet<String>>,
    bootstrap: Vec<(String, u16)>,
    http: reqwest::Client,
}

impl Node {
    pub fn new(config: NodeConfig) -> Self {
        let node_id = config.node_id.unwrap_or_else(mint_node_id);
        let (ledger, genesis_wallet) = Ledger::with_config(config.ledger);

        let miner_wallet = Wallet::create();
        let miner_address = Address::new(miner_wallet.address());

        let mut wallets = BTreeMap::new();
        wallets.insert("genesis".to_string(), genesis_wallet);
        wallets.insert("miner".to_string(), miner_wallet);

        let http = reqwest::Client::builder()
            .connect_timeout(std::time::Duration::from_secs(5))
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .expect("HTTP client construction is infallible");

        info!(%node_id, miner = %miner_address, "node created");
        Self {
            node_id,
            ledger: Arc::new(Mutex::new(ledger)),
            overlay: Mutex::new(None),
            wallets: Mutex::new(wallets),
            miner_address,
            legacy_nodes: Mutex::new(BTreeSet::new()),
            bootstrap: config.bootstrap,
            http,
        }
    }

    /// Bind the overlay listener and spawn its event loop. Returns the
    /// actual bound port (useful when configured with port 0).
    pub async fn start_overlay(&self, listen_port: u16) -> io::Result<u16> {
        let config = OverlayConfig::new(self.node_id.clone(), listen_port)
            .with_bootstrap(self.bootstrap.clone());
        let (overlay, handle) = Overlay::bind(config, Arc::clone(&self.ledger)).await?;
        let port = handle.port();
        tokio::spawn(overlay.run());
        *self.overlay.lock() = Some(handle);
        Ok(port)
    }

    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    pub fn miner_address(&self) -> &Address {
        &self.miner_address
    }

    // ── Chain / state reads ──────────────────────────────────────────────────

    pub fn chain(&self) -> Vec<Block> {
        self.ledger.lock().chain_snapshot()
    }

    pub fn chain_len(&self) -> usize {
        self.ledger.lock().chain_len()
    }

    pub fn tip_hash(&self) -> String {
        self.ledger.lock().last_block().hash.clone()
    }

    pub fn state(&self) -> HashMap<Address, Amount> {
        self.ledger.lock().state().clone()
    }

    pub fn balance(&self, address: &Address) -> Amount {
        self.ledger.lock().balance(address)
    }

    pub fn mempool(&self) -> Vec<Transaction> {
        self.ledger.lock().mempool().to_vec()
    }

    pub fn contract(&self, address: &Address) -> Option<SmartContract> {
        self.ledger.lock().contract(address).cloned()
    }

    pub fn contracts(&self) -> Vec<SmartContract> {
        self.ledger.lock().contracts().values().cloned().collect()
    }

    pub fn genesis_address(&self) -> Address {
        self.ledger.lock().genesis_address().clone()
    }

    // ── Wallet lifecycle ─────────────────────────────────────────────────────

    /// Mint a wallet under a short random id.
    pub fn create_wallet(&self) -> (String, Address) {
        let wallet = Wallet::create();
        let address = Address::new(wallet.address());
        let wallet_id = mint_wallet_id();
        self.wallets.lock().insert(wallet_id.clone(), wallet);
        debug!(%wallet_id, %address, "wallet created");
        (wallet_id, address)
    }

    pub fn wallet_address(&self, wallet_id: &str) -> Result<Address, LedgerError> {
        self.wallets
            .lock()
            .get(wallet_id)
            .map(|w| Address::new(w.address()))
            .ok_or_else(|| LedgerError::UnknownWallet(wallet_id.to_string()))
    }

    pub fn wallets(&self) -> Vec<WalletInfo> {
        let wallets = self.wallets.lock();
        let ledger = self.ledger.lock();
        wallets
            .iter()
            .map(|(id, w)| {
                let address = Address::new(w.address());
                WalletInfo { wallet_id: id.clone(), balance: ledger.balance(&address), address }
            })
            .collect()
    }

    pub fn wallet_detail(&self, wallet_id: &str) -> Result<WalletDetail, LedgerError> {
        let wallets = self.wallets.lock();
        let wallet = wallets
            .get(wallet_id)
            .ok_or_else(|| LedgerError::UnknownWallet(wallet_id.to_string()))?;
        let address = Address::new(wallet.address());
        Ok(WalletDetail {
            wallet_id: wallet_id.to_string(),
            balance: self.ledger.lock().balance(&address),
            public_key_pem: wallet.public_key_pem().to_string(),
            address,
        })
    }

    fn with_wallet<T>(
        &self,
        wallet_id: &str,
        f: impl FnOnce(&Wallet) -> T,
    ) -> Result<T, LedgerError> {
        let wallets = self.wallets.lock();
        let wallet = wallets
            .get(wallet_id)
            .ok_or_else(|| LedgerError::UnknownWallet(wallet_id.to_string()))?;
        Ok(f(wallet))
    }

    // ── Submission ───────────────────────────────────────────────────────────

    /// Admit an externally built transaction and gossip it.
    pub fn submit_transaction(&self, tx: Transaction) -> Result<u64, LedgerError> {
        let index = self.ledger.lock().submit_transaction(tx.clone())?;
        self.gossip_transaction(&tx);
        Ok(index)
    }

    /// Build, sign, admit and gossip a basic transfer from a node wallet.
    pub fn sign_transfer(
        &self,
        wallet_id: &str,
        recipient: Address,
        amount: Amount,
    ) -> Result<Transaction, LedgerError> {
        let tx = self.with_wallet(wallet_id, |w| {
            Transaction::Basic(BasicTx::signed(w, recipient, amount))
        })?;
        self.submit_transaction(tx.clone())?;
        Ok(tx)
    }

    /// Build and sign a time-locked transfer. Admitted immediately when
    /// already unlocked; otherwise returned for later submission.
    pub fn create_timelock(
        &self,
        wallet_id: &str,
        recipient: Address,
        amount: Amount,
        unlock_time: Timestamp,
    ) -> Result<(Transaction, bool), LedgerError> {
        let tx = self.with_wallet(wallet_id, |w| {
            TimelockTx::signed(w, recipient, amount, unlock_time)
        })?;
        let unlocked = tx.is_unlocked();
        let tx = Transaction::Timelock(tx);
        if unlocked {
            self.submit_transaction(tx.clone())?;
        }
        Ok((tx, unlocked))
    }

    /// Draft a multisig transfer. The caller collects signatures from the
    /// co-spenders' wallets, then submits via `submit_transaction`.
    pub fn create_multisig(
        &self,
        sender_addresses: Vec<Address>,
        recipient: Address,
        amount: Amount,
        required: Option<usize>,
    ) -> MultisigTx {
        MultisigTx::new(sender_addresses, recipient, amount, required)
    }

    /// Sign a multisig draft with a node wallet.
    pub fn sign_multisig(&self, wallet_id: &str, tx: &mut MultisigTx) -> Result<(), LedgerError> {
        self.with_wallet(wallet_id, |w| tx.sign(w))?
    }

    /// Deploy a contract from a node wallet. Returns the transaction and
    /// the derived contract address.
    pub fn deploy_contract(
        &self,
        wallet_id: &str,
        contract_code: String,
        initial_value: Amount,
    ) -> Result<(Transaction, Address), LedgerError> {
        let deploy = self.with_wallet(wallet_id, |w| DeployTx::signed(w, contract_code, initial_value))?;
        let contract_address = deploy.contract_address.clone();
        let tx = Transaction::ContractDeploy(deploy);
        self.submit_transaction(tx.clone())?;
        Ok((tx, contract_address))
    }

    /// Call a contract function from a node wallet.
    pub fn call_contract(
        &self,
        wallet_id: &str,
        contract_address: Address,
        function_name: String,
        parameters: Map<String, Value>,
        value: Amount,
    ) -> Result<Transaction, LedgerError> {
        let call = self.with_wallet(wallet_id, |w| {
            CallTx::signed(w, contract_address, function_name, parameters, value)
        })?;
        let tx = Transaction::ContractCall(call);
        self.submit_transaction(tx.clone())?;
        Ok(tx)
    }

    fn gossip_transaction(&self, tx: &Transaction) {
        if let Some(handle) = self.overlay.lock().as_ref() {
            handle.broadcast_transaction(tx);
        }
    }

    // ── Mining ───────────────────────────────────────────────────────────────

    /// Mine one block: the nonce search runs on a blocking worker so the
    /// overlay stays responsive; sealing re-checks the tip under the lock.
    pub async fn mine(&self) -> Result<Block, LedgerError> {
        let target = self.ledger.lock().mining_target();
        let previous_hash = target.previous_hash.clone();
        let difficulty = target.difficulty;

        let proof = tokio::task::spawn_blocking(move || proof_of_work(&previous_hash, difficulty))
            .await
            .map_err(|e| LedgerError::Other(format!("mining worker failed: {e}")))?;

        let block = self.ledger.lock().seal_block(&target, proof, &self.miner_address)?;
        if let Some(handle) = self.overlay.lock().as_ref() {
            handle.broadcast_block(&block);
        }
        Ok(block)
    }

    // ── Consensus ────────────────────────────────────────────────────────────

    /// Record a legacy collaborator endpoint (`host:port`, with or without
    /// an http:// prefix) for the HTTP consensus fallback.
    pub fn register_peer_url(&self, url: &str) -> Result<String, LedgerError> {
        let trimmed = url.trim();
        let without_scheme = trimmed
            .strip_prefix("http://")
            .or_else(|| trimmed.strip_prefix("https://"))
            .unwrap_or(trimmed);
        let host_port = without_scheme.split('/').next().unwrap_or_default();
        if host_port.is_empty() || !host_port.contains(':') {
            return Err(LedgerError::Other(format!("invalid node URL: {url}")));
        }
        self.legacy_nodes.lock().insert(host_port.to_string());
        Ok(host_port.to_string())
    }

    pub fn legacy_nodes(&self) -> Vec<String> {
        self.legacy_nodes.lock().iter().cloned().collect()
    }

    /// Longest-valid-chain consensus trigger: ask overlay peers for their
    /// chains (answers adopt asynchronously) and poll any registered legacy
    /// endpoints over HTTP. Returns whether the HTTP path replaced the
    /// local chain.
    pub async fn resolve_conflicts(&self) -> bool {
        if let Some(handle) = self.overlay.lock().as_ref() {
            handle.request_chain();
        }

        let endpoints = self.legacy_nodes();
        if endpoints.is_empty() {
            return false;
        }

        let local_len = self.ledger.lock().chain_len();
        let mut candidates: Vec<(usize, Vec<Block>)> = Vec::new();
        for host in endpoints {
            match self.http.get(format!("http://{host}/chain")).send().await {
                Ok(response) => match response.json::<ChainPayload>().await {
                    Ok(payload) if payload.length > local_len => {
                        candidates.push((payload.length, payload.chain));
                    }
                    Ok(_) => {}
                    Err(e) => debug!(%host, error = %e, "unparseable chain from legacy node"),
                },
                Err(e) => {
                    debug!(%host, error = %e, "legacy node unreachable");
                }
            }
        }

        // Longest first; adoption re-validates each candidate.
        candidates.sort_by(|a, b| b.0.cmp(&a.0));
        let mut ledger = self.ledger.lock();
        for (_, chain) in candidates {
            if ledger.adopt_chain(chain) {
                return true;
            }
        }
        false
    }

    // ── Introspection ────────────────────────────────────────────────────────

    pub fn network_info(&self) -> NetworkInfo {
        let overlay = self.overlay.lock();
        match overlay.as_ref() {
            Some(handle) => NetworkInfo {
                node_id: self.node_id.clone(),
                p2p_enabled: true,
                p2p_port: Some(handle.port()),
                stats: Some(handle.network_stats()),
                legacy_nodes: self.legacy_nodes(),
            },
            None => NetworkInfo {
                node_id: self.node_id.clone(),
                p2p_enabled: false,
                p2p_port: None,
                stats: None,
                legacy_nodes: self.legacy_nodes(),
            },
        }
    }

    pub fn peers(&self) -> Vec<PeerSnapshot> {
        self.overlay
            .lock()
            .as_ref()
            .map(|h| h.peer_list())
            .unwrap_or_default()
    }

    pub fn connected_peer_count(&self) -> usize {
        self.overlay
            .lock()
            .as_ref()
            .map(|h| h.connected_peer_count())
            .unwrap_or(0)
    }

    pub fn stats(&self) -> NodeStats {
        NodeStats {
            node_id: self.node_id.clone(),
            ledger: self.ledger.lock().stats(),
            network: self.network_info(),
        }
    }

    pub fn difficulty_info(&self) -> DifficultyInfo {
        let ledger = self.ledger.lock();
        DifficultyInfo {
            current_difficulty: ledger.difficulty(),
            target_block_time: ledger.schedule().target_block_time,
            adjustment_interval: ledger.schedule().adjustment_interval,
            transaction_fee: ledger.fee(),
        }
    }
}

// ── Id minting ───────────────────────────────────────────────────────────────

fn mint_node_id() -> String {
    hex::encode(rand::random::<[u8; 6]>())
}

fn mint_wallet_id() -> String {
    hex::encode(rand::random::<[u8; 4]>())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_node() -> Node {
        let config = NodeConfig {
            ledger: LedgerConfig { initial_difficulty: 1, ..LedgerConfig::default() },
            ..NodeConfig::default()
        };
        Node::new(config)
    }

    #[test]
    fn node_registers_genesis_and_miner_wallets() {
        let node = test_node();
        let infos = node.wallets();
        let ids: Vec<&str> = infos.iter().map(|w| w.wallet_id.as_str()).collect();
        assert!(ids.contains(&"genesis"));
        assert!(ids.contains(&"miner"));

        let genesis = infos.iter().find(|w| w.wallet_id == "genesis").unwrap();
        assert_eq!(genesis.balance, ferrite_core::constants::INITIAL_SUPPLY);
        assert_eq!(genesis.address, node.genesis_address());
    }

    #[test]
    fn sign_transfer_admits_to_mempool() {
        let node = test_node();
        let (_, recipient) = node.create_wallet();
        let tx = node.sign_transfer("genesis", recipient, 10.0).unwrap();
        assert_eq!(node.mempool().len(), 1);
        assert_eq!(node.mempool()[0].txid(), tx.txid());
    }

    #[test]
    fn unknown_wallet_is_an_error() {
        let node = test_node();
        let err = node
            .sign_transfer("nope", Address::new("feedbeadfeedbeadfeed"), 1.0)
            .unwrap_err();
        assert!(matches!(err, LedgerError::UnknownWallet(_)));
    }

    #[test]
    fn locked_timelock_is_returned_not_admitted() {
        let node = test_node();
        let (tx, admitted) = node
            .create_timelock(
                "genesis",
                Address::new("feedbeadfeedbeadfeed"),
                5.0,
                ferrite_core::unix_now() + 3600.0,
            )
            .unwrap();
        assert!(!admitted);
        assert!(node.mempool().is_empty());
        assert!(matches!(tx, Transaction::Timelock(_)));
    }

    #[test]
    fn register_peer_url_normalizes() {
        let node = test_node();
        assert_eq!(node.register_peer_url("http://127.0.0.1:5001").unwrap(), "127.0.0.1:5001");
        assert_eq!(node.register_peer_url("127.0.0.1:5002/chain").unwrap(), "127.0.0.1:5002");
        assert!(node.register_peer_url("garbage").is_err());
        assert_eq!(node.legacy_nodes().len(), 2);
    }

    #[tokio::test]
    async fn mine_appends_and_pays_the_miner() {
        let node = test_node();
        let block = node.mine().await.unwrap();
        assert_eq!(block.index, 1);
        assert_eq!(node.chain_len(), 2);
        assert_eq!(
            node.balance(node.miner_address()),
            ferrite_core::constants::MINING_REWARD
        );
    }

    #[test]
    fn multisig_draft_and_signing_flow() {
        let node = test_node();
        let (id_a, addr_a) = node.create_wallet();
        let (id_b, addr_b) = node.create_wallet();
        let mut draft = node.create_multisig(
            vec![addr_a, addr_b],
            Address::new("feedbeadfeedbeadfeed"),
            10.0,
            Some(2),
        );
        node.sign_multisig(&id_a, &mut draft).unwrap();
        assert!(!draft.verify());
        node.sign_multisig(&id_b, &mut draft).unwrap();
        assert!(draft.verify());
    }
}
