use std::collections::{HashMap, HashSet};

use serde::Serialize;
use tracing::{debug, info, warn};

use ferrite_consensus::{validate_structure, DifficultySchedule};
use ferrite_core::constants::{
    GENESIS_PREVIOUS_HASH, INITIAL_DIFFICULTY, INITIAL_SUPPLY, MEMPOOL_CAP, MINING_REWARD,
    TRANSACTION_FEE,
};
use ferrite_core::{Address, Amount, BasicTx, Block, LedgerError, SmartContract, Transaction};
use ferrite_crypto::{proof_of_work, Wallet};

use crate::genesis::{build_genesis_block, GenesisSeed};

// ── Configuration ────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct LedgerConfig {
    pub initial_supply: Amount,
    pub initial_difficulty: u32,
    pub transaction_fee: Amount,
    pub mempool_cap: usize,
    pub schedule: DifficultySchedule,
    /// Deterministic genesis; `None` mints a fresh genesis wallet.
    pub genesis: Option<GenesisSeed>,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            initial_supply: INITIAL_SUPPLY,
            initial_difficulty: INITIAL_DIFFICULTY,
            transaction_fee: TRANSACTION_FEE,
            mempool_cap: MEMPOOL_CAP,
            schedule: DifficultySchedule::default(),
            genesis: None,
        }
    }
}

/// Inputs frozen at the start of a PoW search. Sealing re-checks the tip so
/// a proof found against a superseded tip is rejected, not committed.
#[derive(Clone, Debug)]
pub struct MiningTarget {
    pub previous_hash: String,
    pub difficulty: u32,
}

/// Aggregate figures projected to the control surface.
#[derive(Clone, Debug, Serialize)]
pub struct LedgerStats {
    pub chain_length: usize,
    pub total_transactions: usize,
    pub pending_transactions: usize,
    pub total_accounts: usize,
    pub current_difficulty: u32,
    pub average_block_time: f64,
    pub total_supply: Amount,
    pub last_block_hash: String,
    pub last_block_time: f64,
}

// ── Ledger ───────────────────────────────────────────────────────────────────

/// The ledger state machine. Every mutation (admission, sealing, block from
/// a peer, chain adoption, rebuild) happens through `&mut self`, so a single
/// exterior lock makes each operation indivisible.
pub struct Ledger {
    chain: Vec<Block>,
    mempool: Vec<Transaction>,
    state: HashMap<Address, Amount>,
    contracts: HashMap<Address, SmartContract>,
    difficulty: u32,
    fee: Amount,
    schedule: DifficultySchedule,
    mempool_cap: usize,
    genesis_address: Address,
}

impl Ledger {
    pub fn new() -> (Self, Wallet) {
        Self::with_config(LedgerConfig::default())
    }

    /// Build a ledger holding only the genesis block. Returns the genesis
    /// wallet so the caller can spend the initial supply.
    pub fn with_config(config: LedgerConfig) -> (Self, Wallet) {
        let seed = config.genesis.unwrap_or_default();
        let genesis_address = Address::new(seed.wallet.address());
        let genesis_block = build_genesis_block(&seed, config.initial_supply, config.initial_difficulty);

        let mut state = HashMap::new();
        state.insert(genesis_address.clone(), config.initial_supply);

        info!(
            genesis = %genesis_address,
            supply = config.initial_supply,
            difficulty = config.initial_difficulty,
            "ledger initialised"
        );

        let ledger = Self {
            chain: vec![genesis_block],
            mempool: Vec::new(),
            state,
            contracts: HashMap::new(),
            difficulty: config.initial_difficulty,
            fee: config.transaction_fee,
            schedule: config.schedule,
            mempool_cap: config.mempool_cap,
            genesis_address,
        };
        (ledger, seed.wallet)
    }

    // ── Read access ──────────────────────────────────────────────────────────

    pub fn chain(&self) -> &[Block] {
        &self.chain
    }

    pub fn chain_snapshot(&self) -> Vec<Block> {
        self.chain.clone()
    }

    pub fn chain_len(&self) -> usize {
        self.chain.len()
    }

    pub fn last_block(&self) -> &Block {
        self.chain.last().expect("chain is never empty")
    }

    pub fn mempool(&self) -> &[Transaction] {
        &self.mempool
    }

    pub fn state(&self) -> &HashMap<Address, Amount> {
        &self.state
    }

    pub fn balance(&self, address: &Address) -> Amount {
        self.state.get(address).copied().unwrap_or(0.0)
    }

    pub fn contract(&self, address: &Address) -> Option<&SmartContract> {
        self.contracts.get(address)
    }

    pub fn contracts(&self) -> &HashMap<Address, SmartContract> {
        &self.contracts
    }

    pub fn difficulty(&self) -> u32 {
        self.difficulty
    }

    pub fn fee(&self) -> Amount {
        self.fee
    }

    pub fn schedule(&self) -> &DifficultySchedule {
        &self.schedule
    }

    pub fn genesis_address(&self) -> &Address {
        &self.genesis_address
    }

    // ── Admission ────────────────────────────────────────────────────────────

    /// Validate a transaction against current state and queue it for the
    /// next block. Returns the index of the block it will land in. Genesis
    /// and coinbase transactions are never admissible here.
    pub fn submit_transaction(&mut self, tx: Transaction) -> Result<u64, LedgerError> {
        if matches!(tx, Transaction::Genesis(_)) {
            return Err(LedgerError::InvalidTransaction(
                "genesis transactions are not admissible".into(),
            ));
        }
        if tx.is_coinbase() {
            return Err(LedgerError::InvalidTransaction(
                "coinbase transactions exist only inside mined blocks".into(),
            ));
        }

        let txid = tx
            .txid()
            .expect("non-genesis transactions carry an id")
            .to_string();
        if self.mempool.iter().any(|pending| pending.txid() == Some(txid.as_str())) {
            return Err(LedgerError::InvalidTransaction(format!(
                "transaction {txid} already pending"
            )));
        }

        Self::validate_in_context(self.fee, &tx, &self.state, &self.contracts, false)?;

        if self.mempool.len() >= self.mempool_cap {
            warn!(cap = self.mempool_cap, "mempool full, dropping oldest pending transaction");
            self.mempool.remove(0);
        }
        self.mempool.push(tx);
        debug!(%txid, pending = self.mempool.len(), "transaction admitted");
        Ok(self.chain.len() as u64)
    }

    // ── Per-transaction rules ────────────────────────────────────────────────

    /// Admission pre-conditions against an arbitrary state/contract view.
    /// `in_block` permits coinbase entries, which only exist inside blocks.
    fn validate_in_context(
        fee: Amount,
        tx: &Transaction,
        state: &HashMap<Address, Amount>,
        contracts: &HashMap<Address, SmartContract>,
        in_block: bool,
    ) -> Result<(), LedgerError> {
        match tx {
            Transaction::Genesis(_) => Err(LedgerError::InvalidTransaction(
                "genesis transaction outside the genesis block".into(),
            )),

            Transaction::Basic(t) => {
                if t.sender.is_coinbase() {
                    return if in_block {
                        Ok(())
                    } else {
                        Err(LedgerError::InvalidTransaction(
                            "coinbase transactions exist only inside mined blocks".into(),
                        ))
                    };
                }
                if t.transaction_id != t.compute_txid() {
                    return Err(LedgerError::InvalidTransaction("transaction id mismatch".into()));
                }
                if !t.verify() {
                    return Err(LedgerError::InvalidSignature);
                }
                if t.amount <= 0.0 {
                    return Err(LedgerError::InvalidAmount);
                }
                let have = state
                    .get(&t.sender)
                    .copied()
                    .ok_or_else(|| LedgerError::UnknownAccount(t.sender.to_string()))?;
                if have < t.amount {
                    return Err(LedgerError::InsufficientBalance { need: t.amount, have });
                }
                Ok(())
            }

            Transaction::Multisig(t) => {
                if t.transaction_id != t.compute_txid() {
                    return Err(LedgerError::InvalidTransaction("transaction id mismatch".into()));
                }
                if t.sender_addresses.is_empty() {
                    return Err(LedgerError::InvalidTransaction("multisig with no senders".into()));
                }
                if t.amount <= 0.0 {
                    return Err(LedgerError::InvalidAmount);
                }
                if !t.verify() {
                    return Err(LedgerError::InvalidSignature);
                }
                // Combined balance across every listed sender, present or not.
                let have: Amount = t
                    .sender_addresses
                    .iter()
                    .map(|addr| state.get(addr).copied().unwrap_or(0.0))
                    .sum();
                if have < t.amount {
                    return Err(LedgerError::InsufficientBalance { need: t.amount, have });
                }
                Ok(())
            }

            Transaction::Timelock(t) => {
                if t.transaction_id != t.compute_txid() {
                    return Err(LedgerError::InvalidTransaction("transaction id mismatch".into()));
                }
                if !t.is_unlocked() {
                    return Err(LedgerError::TimeLocked { unlock_time: t.unlock_time });
                }
                if !t.verify_signature() {
                    return Err(LedgerError::InvalidSignature);
                }
                if t.amount <= 0.0 {
                    return Err(LedgerError::InvalidAmount);
                }
                let have = state
                    .get(&t.sender)
                    .copied()
                    .ok_or_else(|| LedgerError::UnknownAccount(t.sender.to_string()))?;
                if have < t.amount {
                    return Err(LedgerError::InsufficientBalance { need: t.amount, have });
                }
                Ok(())
            }

            Transaction::ContractDeploy(t) => {
                if t.transaction_id != t.compute_txid() {
                    return Err(LedgerError::InvalidTransaction("transaction id mismatch".into()));
                }
                let derived = ferrite_core::derive_contract_address(
                    &t.creator_address,
                    &t.contract_code,
                    t.timestamp,
                );
                if derived != t.contract_address {
                    return Err(LedgerError::InvalidTransaction("contract address mismatch".into()));
                }
                if !t.verify() {
                    return Err(LedgerError::InvalidSignature);
                }
                if t.initial_value < 0.0 {
                    return Err(LedgerError::InvalidAmount);
                }
                let need = t.initial_value + fee;
                let have = state
                    .get(&t.creator_address)
                    .copied()
                    .ok_or_else(|| LedgerError::UnknownAccount(t.creator_address.to_string()))?;
                if have < need {
                    return Err(LedgerError::InsufficientBalance { need, have });
                }
                Ok(())
            }

            Transaction::ContractCall(t) => {
                if t.transaction_id != t.compute_txid() {
                    return Err(LedgerError::InvalidTransaction("transaction id mismatch".into()));
                }
                if !t.verify() {
                    return Err(LedgerError::InvalidSignature);
                }
                if t.value < 0.0 {
                    return Err(LedgerError::InvalidAmount);
                }
                if !contracts.contains_key(&t.contract_address) {
                    return Err(LedgerError::UnknownContract(t.contract_address.to_string()));
                }
                let need = t.value + fee;
                let have = state
                    .get(&t.caller_address)
                    .copied()
                    .ok_or_else(|| LedgerError::UnknownAccount(t.caller_address.to_string()))?;
                if have < need {
                    return Err(LedgerError::InsufficientBalance { need, have });
                }
                Ok(())
            }
        }
    }

    /// Apply one validated transaction. Callers pass either the live maps or
    /// scratch copies; the rules are identical.
    fn apply_in_context(
        fee: Amount,
        tx: &Transaction,
        state: &mut HashMap<Address, Amount>,
        contracts: &mut HashMap<Address, SmartContract>,
    ) -> Result<(), LedgerError> {
        match tx {
            Transaction::Genesis(g) => {
                state.insert(g.recipient.clone(), g.amount);
            }

            Transaction::Basic(t) => {
                if t.sender.is_coinbase() {
                    *state.entry(t.recipient.clone()).or_insert(0.0) += t.amount;
                } else {
                    let sender = state
                        .get_mut(&t.sender)
                        .ok_or_else(|| LedgerError::UnknownAccount(t.sender.to_string()))?;
                    *sender -= t.amount;
                    *state.entry(t.recipient.clone()).or_insert(0.0) += t.amount;
                }
            }

            Transaction::Multisig(t) => {
                // Equal share from every listed sender, signers or not.
                let share = t.amount / t.sender_addresses.len() as f64;
                for sender in &t.sender_addresses {
                    *state.entry(sender.clone()).or_insert(0.0) -= share;
                }
                *state.entry(t.recipient.clone()).or_insert(0.0) += t.amount;
            }

            Transaction::Timelock(t) => {
                let sender = state
                    .get_mut(&t.sender)
                    .ok_or_else(|| LedgerError::UnknownAccount(t.sender.to_string()))?;
                *sender -= t.amount;
                *state.entry(t.recipient.clone()).or_insert(0.0) += t.amount;
            }

            Transaction::ContractDeploy(t) => {
                let mut contract =
                    SmartContract::new(t.contract_code.clone(), t.creator_address.clone(), t.timestamp);
                let creator = state
                    .get_mut(&t.creator_address)
                    .ok_or_else(|| LedgerError::UnknownAccount(t.creator_address.to_string()))?;
                *creator -= fee;
                if t.initial_value > 0.0 {
                    *creator -= t.initial_value;
                    contract.balance = t.initial_value;
                }
                contracts.insert(contract.contract_address.clone(), contract);
            }

            Transaction::ContractCall(t) => {
                let contract = contracts
                    .get_mut(&t.contract_address)
                    .ok_or_else(|| LedgerError::UnknownContract(t.contract_address.to_string()))?;
                let result =
                    contract.execute(&t.function_name, &t.parameters, &t.caller_address, t.value);
                if !result.success {
                    debug!(
                        contract = %t.contract_address,
                        function = %t.function_name,
                        message = result.message.as_deref().unwrap_or(""),
                        "contract call failed; charges still apply"
                    );
                }

                let caller = state
                    .get_mut(&t.caller_address)
                    .ok_or_else(|| LedgerError::UnknownAccount(t.caller_address.to_string()))?;
                *caller -= t.value + fee;

                if result.success {
                    if let Some(out) = result.transfer {
                        *state.entry(out.to).or_insert(0.0) += out.amount;
                    }
                }
            }
        }
        Ok(())
    }

    // ── Mining ───────────────────────────────────────────────────────────────

    /// Freeze the PoW inputs for the next block, retargeting difficulty
    /// first when a window boundary has been reached.
    pub fn mining_target(&mut self) -> MiningTarget {
        if self.schedule.should_retarget(self.chain.len()) {
            self.difficulty = self.schedule.adjust(&self.chain);
        }
        MiningTarget {
            previous_hash: self.last_block().hash.clone(),
            difficulty: self.difficulty,
        }
    }

    /// Assemble and commit a block from a found proof: coinbase first, then
    /// the mempool snapshot in admission order.
    pub fn seal_block(
        &mut self,
        target: &MiningTarget,
        proof: u64,
        miner: &Address,
    ) -> Result<Block, LedgerError> {
        if target.previous_hash != self.last_block().hash {
            return Err(LedgerError::StaleProof);
        }

        let mut transactions = vec![Transaction::Basic(BasicTx::coinbase(miner.clone(), MINING_REWARD))];
        transactions.extend(self.mempool.iter().cloned());

        let block = Block::new(
            self.chain.len() as u64,
            transactions,
            proof,
            target.previous_hash.clone(),
            miner.to_string(),
            target.difficulty,
        );
        self.commit_block(block)
    }

    /// Run the whole mining flow synchronously. Nodes that must keep an
    /// event loop responsive run `proof_of_work` on a worker instead and
    /// call `seal_block` themselves.
    pub fn mine(&mut self, miner: &Address) -> Result<Block, LedgerError> {
        let target = self.mining_target();
        let proof = proof_of_work(&target.previous_hash, target.difficulty);
        self.seal_block(&target, proof, miner)
    }

    // ── Block commit ─────────────────────────────────────────────────────────

    /// Validate a candidate block against the tip and, if sound, apply its
    /// transactions, append it, and clear the mined entries from the
    /// mempool. Used both for locally sealed blocks and blocks from peers.
    pub fn commit_block(&mut self, block: Block) -> Result<Block, LedgerError> {
        self.validate_new_block(&block)?;

        for tx in &block.transactions {
            Self::apply_in_context(self.fee, tx, &mut self.state, &mut self.contracts)?;
        }

        self.remove_mined_from_mempool(&block);
        info!(
            index = block.index,
            transactions = block.transactions.len(),
            hash = %block.hash,
            "block committed"
        );
        self.chain.push(block);
        Ok(self.last_block().clone())
    }

    /// Structural checks plus a left-to-right replay of the transactions
    /// against scratch copies of state and contracts. Nothing live mutates
    /// until every transaction has passed, and a block that would leave any
    /// balance negative is rejected outright.
    fn validate_new_block(&self, block: &Block) -> Result<(), LedgerError> {
        validate_structure(block, self.chain.len() as u64, &self.last_block().hash)?;

        let mut scratch_state = self.state.clone();
        let mut scratch_contracts = self.contracts.clone();
        for tx in &block.transactions {
            Self::validate_in_context(self.fee, tx, &scratch_state, &scratch_contracts, true)?;
            Self::apply_in_context(self.fee, tx, &mut scratch_state, &mut scratch_contracts)?;
        }

        if let Some((address, balance)) = scratch_state.iter().find(|(_, b)| **b < 0.0) {
            return Err(LedgerError::InvalidBlock(format!(
                "balance of {address} would go negative ({balance})"
            )));
        }
        Ok(())
    }

    fn remove_mined_from_mempool(&mut self, block: &Block) {
        let mined: HashSet<&str> = block.transactions.iter().filter_map(Transaction::txid).collect();
        if mined.is_empty() {
            return;
        }
        let before = self.mempool.len();
        self.mempool
            .retain(|tx| tx.txid().map_or(true, |id| !mined.contains(id)));
        let removed = before - self.mempool.len();
        if removed > 0 {
            debug!(removed, "cleared mined transactions from mempool");
        }
    }

    // ── Chain validation & consensus ─────────────────────────────────────────

    /// Full validation of a candidate chain: genesis shape, then per-block
    /// structure and transaction replay against a state seeded from the
    /// genesis pseudo-transaction.
    pub fn valid_chain(&self, chain: &[Block]) -> bool {
        let Some(genesis) = chain.first() else {
            return false;
        };
        if genesis.index != 0
            || genesis.previous_hash != GENESIS_PREVIOUS_HASH
            || genesis.merkle_root != genesis.compute_merkle_root()
            || genesis.hash != genesis.compute_hash()
        {
            return false;
        }

        let mut state = HashMap::new();
        let mut contracts = HashMap::new();
        for tx in &genesis.transactions {
            if let Transaction::Genesis(g) = tx {
                state.insert(g.recipient.clone(), g.amount);
            }
        }

        for i in 1..chain.len() {
            let block = &chain[i];
            let previous = &chain[i - 1];
            if validate_structure(block, i as u64, &previous.hash).is_err() {
                return false;
            }
            for tx in &block.transactions {
                if Self::validate_in_context(self.fee, tx, &state, &contracts, true).is_err() {
                    return false;
                }
                if Self::apply_in_context(self.fee, tx, &mut state, &mut contracts).is_err() {
                    return false;
                }
            }
        }
        true
    }

    /// Longest-valid-chain rule. Replaces the local chain when the
    /// candidate is strictly longer and fully valid, rebuilding state and
    /// pruning mempool entries the adopted chain already contains. Equal
    /// length keeps the local chain.
    pub fn adopt_chain(&mut self, candidate: Vec<Block>) -> bool {
        if candidate.len() <= self.chain.len() {
            debug!(
                local = self.chain.len(),
                candidate = candidate.len(),
                "candidate chain is not longer, keeping local chain"
            );
            return false;
        }
        if !self.valid_chain(&candidate) {
            warn!(length = candidate.len(), "rejecting invalid candidate chain");
            return false;
        }

        info!(
            old_length = self.chain.len(),
            new_length = candidate.len(),
            "adopting longer chain"
        );
        self.chain = candidate;
        self.difficulty = self.last_block().difficulty;
        self.rebuild_state();

        let on_chain: HashSet<String> = self
            .chain
            .iter()
            .flat_map(|b| &b.transactions)
            .filter_map(|tx| tx.txid().map(str::to_string))
            .collect();
        self.mempool
            .retain(|tx| tx.txid().map_or(true, |id| !on_chain.contains(id)));
        true
    }

    /// Derive state and contracts from scratch by replaying the whole
    /// chain. Deterministic: the same chain always yields the same maps.
    pub fn rebuild_state(&mut self) {
        self.state.clear();
        self.contracts.clear();
        for block in &self.chain {
            for tx in &block.transactions {
                if let Err(e) = Self::apply_in_context(self.fee, tx, &mut self.state, &mut self.contracts)
                {
                    warn!(error = %e, "transaction skipped during state rebuild");
                }
            }
        }
    }

    // ── Stats ────────────────────────────────────────────────────────────────

    pub fn stats(&self) -> LedgerStats {
        let average_block_time = if self.chain.len() > 1 {
            (self.last_block().timestamp - self.chain[0].timestamp) / (self.chain.len() - 1) as f64
        } else {
            0.0
        };
        LedgerStats {
            chain_length: self.chain.len(),
            total_transactions: self.chain.iter().map(|b| b.transactions.len()).sum(),
            pending_transactions: self.mempool.len(),
            total_accounts: self.state.len(),
            current_difficulty: self.difficulty,
            average_block_time,
            total_supply: self.state.values().sum(),
            last_block_hash: self.last_block().hash.clone(),
            last_block_time: self.last_block().timestamp,
        }
    }
}
