use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;

use ferrite_crypto::{address_from_pem, canonical_json, sha256_hex_str, Wallet};

use crate::contract::derive_contract_address;
use crate::error::LedgerError;
use crate::types::{unix_now, Address, Amount, Timestamp};

/// Transaction id: SHA-256 of the canonical encoding of the variant's
/// content fields, excluding signatures.
fn txid_of(payload: &Value) -> String {
    sha256_hex_str(&canonical_json(payload))
}

/// Whether `pem` is the public key that `address` was derived from.
fn key_matches(address: &Address, pem: &str) -> bool {
    address_from_pem(pem) == address.as_str()
}

// ── Genesis ──────────────────────────────────────────────────────────────────

/// The pseudo-transaction crediting the genesis wallet with the initial
/// supply. Never signed, never admitted to a mempool; exists only in block 0.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct GenesisTx {
    pub sender: Address,
    pub recipient: Address,
    pub amount: Amount,
    pub timestamp: Timestamp,
}

impl GenesisTx {
    pub fn new(recipient: Address, amount: Amount, timestamp: Timestamp) -> Self {
        Self { sender: Address::coinbase(), recipient, amount, timestamp }
    }
}

// ── Basic transfer ───────────────────────────────────────────────────────────

/// A single-signature transfer. With `sender == "0"` this is a coinbase
/// transaction, valid only as the first entry of a mined block.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct BasicTx {
    pub sender: Address,
    pub recipient: Address,
    pub amount: Amount,
    pub timestamp: Timestamp,
    pub transaction_id: String,
    #[serde(default)]
    pub signature: Option<String>,
    #[serde(default)]
    pub sender_public_key: Option<String>,
}

impl BasicTx {
    pub fn new(sender: Address, recipient: Address, amount: Amount) -> Self {
        Self::at_time(sender, recipient, amount, unix_now())
    }

    pub fn at_time(sender: Address, recipient: Address, amount: Amount, timestamp: Timestamp) -> Self {
        let payload = Self::hash_payload(&sender, &recipient, amount, timestamp);
        Self {
            sender,
            recipient,
            amount,
            timestamp,
            transaction_id: txid_of(&payload),
            signature: None,
            sender_public_key: None,
        }
    }

    /// The coinbase transaction prepended to every mined block.
    pub fn coinbase(miner: Address, amount: Amount) -> Self {
        Self::new(Address::coinbase(), miner, amount)
    }

    /// Build and sign in one step.
    pub fn signed(wallet: &Wallet, recipient: Address, amount: Amount) -> Self {
        let mut tx = Self::new(Address::new(wallet.address()), recipient, amount);
        tx.sign(wallet).expect("signer address matches by construction");
        tx
    }

    fn hash_payload(sender: &Address, recipient: &Address, amount: Amount, timestamp: Timestamp) -> Value {
        json!({
            "sender": sender,
            "recipient": recipient,
            "amount": amount,
            "timestamp": timestamp,
        })
    }

    fn signing_payload(&self) -> Value {
        json!({
            "sender": self.sender,
            "recipient": self.recipient,
            "amount": self.amount,
            "timestamp": self.timestamp,
            "transaction_id": self.transaction_id,
        })
    }

    pub fn compute_txid(&self) -> String {
        txid_of(&Self::hash_payload(&self.sender, &self.recipient, self.amount, self.timestamp))
    }

    pub fn sign(&mut self, wallet: &Wallet) -> Result<(), LedgerError> {
        if wallet.address() != self.sender.as_str() {
            return Err(LedgerError::SignerNotListed(wallet.address().to_string()));
        }
        self.signature = Some(wallet.sign(&self.signing_payload()));
        self.sender_public_key = Some(wallet.public_key_pem().to_string());
        Ok(())
    }

    /// Coinbase transactions are always considered verified; anything else
    /// needs a signature that checks out against the embedded public key.
    pub fn verify(&self) -> bool {
        if self.sender.is_coinbase() {
            return true;
        }
        match (&self.signature, &self.sender_public_key) {
            (Some(sig), Some(pem)) => {
                key_matches(&self.sender, pem) && Wallet::verify(&self.signing_payload(), sig, pem)
            }
            _ => false,
        }
    }
}

// ── Multi-signature transfer ─────────────────────────────────────────────────

/// A k-of-n transfer co-spent by several listed senders. Application debits
/// `amount / n` from every listed sender, signers or not; that equal-share
/// split is protocol behavior, not an implementation choice.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct MultisigTx {
    pub sender_addresses: Vec<Address>,
    pub recipient: Address,
    pub amount: Amount,
    pub required_signatures: usize,
    pub timestamp: Timestamp,
    pub transaction_id: String,
    #[serde(default)]
    pub signatures: BTreeMap<Address, String>,
    #[serde(default)]
    pub public_keys: BTreeMap<Address, String>,
}

impl MultisigTx {
    /// `required` defaults to "all listed senders must sign".
    pub fn new(
        sender_addresses: Vec<Address>,
        recipient: Address,
        amount: Amount,
        required: Option<usize>,
    ) -> Self {
        Self::at_time(sender_addresses, recipient, amount, required, unix_now())
    }

    pub fn at_time(
        sender_addresses: Vec<Address>,
        recipient: Address,
        amount: Amount,
        required: Option<usize>,
        timestamp: Timestamp,
    ) -> Self {
        let required_signatures = required.unwrap_or(sender_addresses.len());
        let payload = Self::hash_payload(&sender_addresses, &recipient, amount, required_signatures, timestamp);
        Self {
            sender_addresses,
            recipient,
            amount,
            required_signatures,
            timestamp,
            transaction_id: txid_of(&payload),
            signatures: BTreeMap::new(),
            public_keys: BTreeMap::new(),
        }
    }

    fn sorted_senders(senders: &[Address]) -> Vec<Address> {
        let mut sorted = senders.to_vec();
        sorted.sort();
        sorted
    }

    fn hash_payload(
        senders: &[Address],
        recipient: &Address,
        amount: Amount,
        required: usize,
        timestamp: Timestamp,
    ) -> Value {
        json!({
            "sender_addresses": Self::sorted_senders(senders),
            "recipient": recipient,
            "amount": amount,
            "timestamp": timestamp,
            "required_signatures": required,
            "type": "multisig",
        })
    }

    fn signing_payload(&self) -> Value {
        json!({
            "sender_addresses": Self::sorted_senders(&self.sender_addresses),
            "recipient": self.recipient,
            "amount": self.amount,
            "timestamp": self.timestamp,
            "transaction_id": self.transaction_id,
            "required_signatures": self.required_signatures,
        })
    }

    pub fn compute_txid(&self) -> String {
        txid_of(&Self::hash_payload(
            &self.sender_addresses,
            &self.recipient,
            self.amount,
            self.required_signatures,
            self.timestamp,
        ))
    }

    /// Collect one signature. The wallet must be one of the listed senders.
    pub fn sign(&mut self, wallet: &Wallet) -> Result<(), LedgerError> {
        let address = Address::new(wallet.address());
        if !self.sender_addresses.contains(&address) {
            return Err(LedgerError::SignerNotListed(wallet.address().to_string()));
        }
        self.signatures.insert(address.clone(), wallet.sign(&self.signing_payload()));
        self.public_keys.insert(address, wallet.public_key_pem().to_string());
        Ok(())
    }

    /// True iff at least `required_signatures` distinct listed senders have
    /// produced valid signatures over the canonical content.
    pub fn verify(&self) -> bool {
        if self.signatures.len() < self.required_signatures {
            return false;
        }
        let payload = self.signing_payload();
        let mut valid = 0usize;
        for (address, signature) in &self.signatures {
            if !self.sender_addresses.contains(address) {
                continue;
            }
            let Some(pem) = self.public_keys.get(address) else {
                continue;
            };
            if key_matches(address, pem) && Wallet::verify(&payload, signature, pem) {
                valid += 1;
            }
        }
        valid >= self.required_signatures
    }
}

// ── Time-locked transfer ─────────────────────────────────────────────────────

/// A transfer that only becomes spendable once `unlock_time` has passed. It
/// may be created and signed while still locked and held back; the mempool
/// refuses it until it unlocks.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct TimelockTx {
    pub sender: Address,
    pub recipient: Address,
    pub amount: Amount,
    pub unlock_time: Timestamp,
    pub timestamp: Timestamp,
    pub transaction_id: String,
    #[serde(default)]
    pub signature: Option<String>,
    #[serde(default)]
    pub sender_public_key: Option<String>,
}

impl TimelockTx {
    pub fn new(sender: Address, recipient: Address, amount: Amount, unlock_time: Timestamp) -> Self {
        Self::at_time(sender, recipient, amount, unlock_time, unix_now())
    }

    pub fn at_time(
        sender: Address,
        recipient: Address,
        amount: Amount,
        unlock_time: Timestamp,
        timestamp: Timestamp,
    ) -> Self {
        let payload = Self::hash_payload(&sender, &recipient, amount, unlock_time, timestamp);
        Self {
            sender,
            recipient,
            amount,
            unlock_time,
            timestamp,
            transaction_id: txid_of(&payload),
            signature: None,
            sender_public_key: None,
        }
    }

    pub fn signed(wallet: &Wallet, recipient: Address, amount: Amount, unlock_time: Timestamp) -> Self {
        let mut tx = Self::new(Address::new(wallet.address()), recipient, amount, unlock_time);
        tx.sign(wallet).expect("signer address matches by construction");
        tx
    }

    fn hash_payload(
        sender: &Address,
        recipient: &Address,
        amount: Amount,
        unlock_time: Timestamp,
        timestamp: Timestamp,
    ) -> Value {
        json!({
            "sender": sender,
            "recipient": recipient,
            "amount": amount,
            "timestamp": timestamp,
            "unlock_time": unlock_time,
            "type": "timelock",
        })
    }

    /// The signing pre-image matches the basic transfer's; `unlock_time` is
    /// covered transitively through the transaction id.
    fn signing_payload(&self) -> Value {
        json!({
            "sender": self.sender,
            "recipient": self.recipient,
            "amount": self.amount,
            "timestamp": self.timestamp,
            "transaction_id": self.transaction_id,
        })
    }

    pub fn compute_txid(&self) -> String {
        txid_of(&Self::hash_payload(
            &self.sender,
            &self.recipient,
            self.amount,
            self.unlock_time,
            self.timestamp,
        ))
    }

    pub fn sign(&mut self, wallet: &Wallet) -> Result<(), LedgerError> {
        if wallet.address() != self.sender.as_str() {
            return Err(LedgerError::SignerNotListed(wallet.address().to_string()));
        }
        self.signature = Some(wallet.sign(&self.signing_payload()));
        self.sender_public_key = Some(wallet.public_key_pem().to_string());
        Ok(())
    }

    pub fn is_unlocked(&self) -> bool {
        unix_now() >= self.unlock_time
    }

    pub fn verify_signature(&self) -> bool {
        match (&self.signature, &self.sender_public_key) {
            (Some(sig), Some(pem)) => {
                key_matches(&self.sender, pem) && Wallet::verify(&self.signing_payload(), sig, pem)
            }
            _ => false,
        }
    }

    pub fn verify(&self) -> bool {
        self.is_unlocked() && self.verify_signature()
    }
}

// ── Contract deployment ──────────────────────────────────────────────────────

/// Registers a contract at its derived address. Application debits the flat
/// fee and, when `initial_value > 0`, funds the contract balance from the
/// creator.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct DeployTx {
    pub creator_address: Address,
    pub contract_code: String,
    pub initial_value: Amount,
    pub timestamp: Timestamp,
    pub transaction_id: String,
    pub contract_address: Address,
    #[serde(default)]
    pub signature: Option<String>,
    #[serde(default)]
    pub sender_public_key: Option<String>,
}

impl DeployTx {
    pub fn new(creator_address: Address, contract_code: String, initial_value: Amount) -> Self {
        Self::at_time(creator_address, contract_code, initial_value, unix_now())
    }

    pub fn at_time(
        creator_address: Address,
        contract_code: String,
        initial_value: Amount,
        timestamp: Timestamp,
    ) -> Self {
        let payload = Self::hash_payload(&creator_address, &contract_code, initial_value, timestamp);
        let contract_address = derive_contract_address(&creator_address, &contract_code, timestamp);
        Self {
            creator_address,
            contract_code,
            initial_value,
            timestamp,
            transaction_id: txid_of(&payload),
            contract_address,
            signature: None,
            sender_public_key: None,
        }
    }

    pub fn signed(wallet: &Wallet, contract_code: String, initial_value: Amount) -> Self {
        let mut tx = Self::new(Address::new(wallet.address()), contract_code, initial_value);
        tx.sign(wallet).expect("signer address matches by construction");
        tx
    }

    fn hash_payload(creator: &Address, code: &str, initial_value: Amount, timestamp: Timestamp) -> Value {
        json!({
            "creator_address": creator,
            "contract_code": code,
            "initial_value": initial_value,
            "timestamp": timestamp,
            "type": "contract_deploy",
        })
    }

    fn signing_payload(&self) -> Value {
        json!({
            "creator_address": self.creator_address,
            "contract_code": self.contract_code,
            "initial_value": self.initial_value,
            "timestamp": self.timestamp,
            "transaction_id": self.transaction_id,
        })
    }

    pub fn compute_txid(&self) -> String {
        txid_of(&Self::hash_payload(
            &self.creator_address,
            &self.contract_code,
            self.initial_value,
            self.timestamp,
        ))
    }

    pub fn sign(&mut self, wallet: &Wallet) -> Result<(), LedgerError> {
        if wallet.address() != self.creator_address.as_str() {
            return Err(LedgerError::SignerNotListed(wallet.address().to_string()));
        }
        self.signature = Some(wallet.sign(&self.signing_payload()));
        self.sender_public_key = Some(wallet.public_key_pem().to_string());
        Ok(())
    }

    pub fn verify(&self) -> bool {
        match (&self.signature, &self.sender_public_key) {
            (Some(sig), Some(pem)) => {
                key_matches(&self.creator_address, pem)
                    && Wallet::verify(&self.signing_payload(), sig, pem)
            }
            _ => false,
        }
    }
}

// ── Contract call ────────────────────────────────────────────────────────────

/// Invokes a deployed contract. Application debits `value + fee` from the
/// caller whether or not the call succeeds; a successful `transfer` result
/// credits its recipient from the contract balance.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct CallTx {
    pub caller_address: Address,
    pub contract_address: Address,
    pub function_name: String,
    pub parameters: Map<String, Value>,
    pub value: Amount,
    pub timestamp: Timestamp,
    pub transaction_id: String,
    #[serde(default)]
    pub signature: Option<String>,
    #[serde(default)]
    pub sender_public_key: Option<String>,
}

impl CallTx {
    pub fn new(
        caller_address: Address,
        contract_address: Address,
        function_name: String,
        parameters: Map<String, Value>,
        value: Amount,
    ) -> Self {
        Self::at_time(caller_address, contract_address, function_name, parameters, value, unix_now())
    }

    pub fn at_time(
        caller_address: Address,
        contract_address: Address,
        function_name: String,
        parameters: Map<String, Value>,
        value: Amount,
        timestamp: Timestamp,
    ) -> Self {
        let payload = Self::hash_payload(
            &caller_address,
            &contract_address,
            &function_name,
            &parameters,
            value,
            timestamp,
        );
        Self {
            caller_address,
            contract_address,
            function_name,
            parameters,
            value,
            timestamp,
            transaction_id: txid_of(&payload),
            signature: None,
            sender_public_key: None,
        }
    }

    pub fn signed(
        wallet: &Wallet,
        contract_address: Address,
        function_name: String,
        parameters: Map<String, Value>,
        value: Amount,
    ) -> Self {
        let mut tx = Self::new(
            Address::new(wallet.address()),
            contract_address,
            function_name,
            parameters,
            value,
        );
        tx.sign(wallet).expect("signer address matches by construction");
        tx
    }

    fn hash_payload(
        caller: &Address,
        contract: &Address,
        function_name: &str,
        parameters: &Map<String, Value>,
        value: Amount,
        timestamp: Timestamp,
    ) -> Value {
        json!({
            "caller_address": caller,
            "contract_address": contract,
            "function_name": function_name,
            "parameters": parameters,
            "value": value,
            "timestamp": timestamp,
            "type": "contract_call",
        })
    }

    fn signing_payload(&self) -> Value {
        json!({
            "caller_address": self.caller_address,
            "contract_address": self.contract_address,
            "function_name": self.function_name,
            "parameters": self.parameters,
            "value": self.value,
            "timestamp": self.timestamp,
            "transaction_id": self.transaction_id,
        })
    }

    pub fn compute_txid(&self) -> String {
        txid_of(&Self::hash_payload(
            &self.caller_address,
            &self.contract_address,
            &self.function_name,
            &self.parameters,
            self.value,
            self.timestamp,
        ))
    }

    pub fn sign(&mut self, wallet: &Wallet) -> Result<(), LedgerError> {
        if wallet.address() != self.caller_address.as_str() {
            return Err(LedgerError::SignerNotListed(wallet.address().to_string()));
        }
        self.signature = Some(wallet.sign(&self.signing_payload()));
        self.sender_public_key = Some(wallet.public_key_pem().to_string());
        Ok(())
    }

    pub fn verify(&self) -> bool {
        match (&self.signature, &self.sender_public_key) {
            (Some(sig), Some(pem)) => {
                key_matches(&self.caller_address, pem)
                    && Wallet::verify(&self.signing_payload(), sig, pem)
            }
            _ => false,
        }
    }
}

// ── Transaction sum type ─────────────────────────────────────────────────────

/// Every transaction the ledger knows how to validate and apply. The chain
/// engine dispatches on this sum; nothing downstream probes for fields.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "transaction_type", rename_all = "snake_case")]
pub enum Transaction {
    Genesis(GenesisTx),
    Basic(BasicTx),
    Multisig(MultisigTx),
    Timelock(TimelockTx),
    ContractDeploy(DeployTx),
    ContractCall(CallTx),
}

impl Transaction {
    /// The transaction id, if this variant carries one (genesis does not).
    pub fn txid(&self) -> Option<&str> {
        match self {
            Transaction::Genesis(_) => None,
            Transaction::Basic(t) => Some(&t.transaction_id),
            Transaction::Multisig(t) => Some(&t.transaction_id),
            Transaction::Timelock(t) => Some(&t.transaction_id),
            Transaction::ContractDeploy(t) => Some(&t.transaction_id),
            Transaction::ContractCall(t) => Some(&t.transaction_id),
        }
    }

    /// Signature-level validity, per variant.
    pub fn verify(&self) -> bool {
        match self {
            Transaction::Genesis(_) => true,
            Transaction::Basic(t) => t.verify(),
            Transaction::Multisig(t) => t.verify(),
            Transaction::Timelock(t) => t.verify(),
            Transaction::ContractDeploy(t) => t.verify(),
            Transaction::ContractCall(t) => t.verify(),
        }
    }

    pub fn timestamp(&self) -> Timestamp {
        match self {
            Transaction::Genesis(t) => t.timestamp,
            Transaction::Basic(t) => t.timestamp,
            Transaction::Multisig(t) => t.timestamp,
            Transaction::Timelock(t) => t.timestamp,
            Transaction::ContractDeploy(t) => t.timestamp,
            Transaction::ContractCall(t) => t.timestamp,
        }
    }

    pub fn is_coinbase(&self) -> bool {
        matches!(self, Transaction::Basic(t) if t.sender.is_coinbase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_txid_is_stable() {
        let tx = BasicTx::at_time(
            Address::new("ab12cd34ef56ab78cd90"),
            Address::new("feedbeadfeedbeadfeed"),
            50.0,
            1_700_000_000.5,
        );
        assert_eq!(tx.transaction_id, tx.compute_txid());
        assert_eq!(tx.transaction_id.len(), 64);
        // Content change, id change.
        let other = BasicTx::at_time(
            Address::new("ab12cd34ef56ab78cd90"),
            Address::new("feedbeadfeedbeadfeed"),
            51.0,
            1_700_000_000.5,
        );
        assert_ne!(tx.transaction_id, other.transaction_id);
    }

    #[test]
    fn basic_sign_and_verify() {
        let wallet = Wallet::create();
        let tx = BasicTx::signed(&wallet, Address::new("feedbeadfeedbeadfeed"), 12.5);
        assert!(tx.verify());
    }

    #[test]
    fn unsigned_basic_fails() {
        let tx = BasicTx::new(
            Address::new("ab12cd34ef56ab78cd90"),
            Address::new("feedbeadfeedbeadfeed"),
            1.0,
        );
        assert!(!tx.verify());
    }

    #[test]
    fn coinbase_verifies_without_signature() {
        let tx = BasicTx::coinbase(Address::new("feedbeadfeedbeadfeed"), 1.0);
        assert!(tx.verify());
    }

    #[test]
    fn signing_for_someone_else_is_refused() {
        let wallet = Wallet::create();
        let mut tx = BasicTx::new(
            Address::new("ab12cd34ef56ab78cd90"),
            Address::new("feedbeadfeedbeadfeed"),
            1.0,
        );
        assert!(matches!(tx.sign(&wallet), Err(LedgerError::SignerNotListed(_))));
    }

    #[test]
    fn stolen_key_cannot_impersonate_sender() {
        // A signature from a key that does not derive the sender address
        // must not verify even though the embedded PEM checks out.
        let mallory = Wallet::create();
        let mut tx = BasicTx::new(
            Address::new("ab12cd34ef56ab78cd90"),
            Address::new(mallory.address()),
            1.0,
        );
        tx.signature = Some(mallory.sign(&tx.signing_payload()));
        tx.sender_public_key = Some(mallory.public_key_pem().to_string());
        assert!(!tx.verify());
    }

    #[test]
    fn multisig_threshold() {
        let a = Wallet::create();
        let b = Wallet::create();
        let c = Wallet::create();
        let senders = vec![
            Address::new(a.address()),
            Address::new(b.address()),
            Address::new(c.address()),
        ];
        let mut tx = MultisigTx::new(senders, Address::new("feedbeadfeedbeadfeed"), 60.0, Some(2));

        tx.sign(&a).unwrap();
        assert!(!tx.verify(), "one of two required signatures must not verify");

        tx.sign(&b).unwrap();
        assert!(tx.verify(), "two of two required signatures must verify");
    }

    #[test]
    fn multisig_rejects_unlisted_signer() {
        let a = Wallet::create();
        let outsider = Wallet::create();
        let mut tx = MultisigTx::new(
            vec![Address::new(a.address())],
            Address::new("feedbeadfeedbeadfeed"),
            10.0,
            Some(1),
        );
        assert!(matches!(tx.sign(&outsider), Err(LedgerError::SignerNotListed(_))));
    }

    #[test]
    fn multisig_txid_ignores_sender_order() {
        let s1 = Address::new("ab12cd34ef56ab78cd90");
        let s2 = Address::new("feedbeadfeedbeadfeed");
        let t1 = MultisigTx::at_time(vec![s1.clone(), s2.clone()], s1.clone(), 5.0, Some(1), 1_700_000_000.0);
        let t2 = MultisigTx::at_time(vec![s2, s1.clone()], s1, 5.0, Some(1), 1_700_000_000.0);
        assert_eq!(t1.transaction_id, t2.transaction_id);
    }

    #[test]
    fn timelock_locked_then_unlocked() {
        let wallet = Wallet::create();
        let locked = TimelockTx::signed(
            &wallet,
            Address::new("feedbeadfeedbeadfeed"),
            10.0,
            unix_now() + 3600.0,
        );
        assert!(locked.verify_signature());
        assert!(!locked.is_unlocked());
        assert!(!locked.verify());

        let unlocked = TimelockTx::signed(
            &wallet,
            Address::new("feedbeadfeedbeadfeed"),
            10.0,
            unix_now() - 1.0,
        );
        assert!(unlocked.is_unlocked());
        assert!(unlocked.verify());
    }

    #[test]
    fn deploy_derives_contract_address() {
        let wallet = Wallet::create();
        let tx = DeployTx::signed(&wallet, "storage_v1".into(), 0.0);
        assert!(tx.verify());
        assert!(tx.contract_address.is_well_formed());
        assert_eq!(
            tx.contract_address,
            derive_contract_address(&tx.creator_address, &tx.contract_code, tx.timestamp)
        );
    }

    #[test]
    fn call_sign_and_verify() {
        let wallet = Wallet::create();
        let params = serde_json::json!({"key": "greeting", "value": "hi"})
            .as_object()
            .cloned()
            .unwrap();
        let tx = CallTx::signed(
            &wallet,
            Address::new("ab12cd34ef56ab78cd90"),
            "set_value".into(),
            params,
            0.0,
        );
        assert!(tx.verify());
        assert_eq!(tx.transaction_id, tx.compute_txid());
    }

    #[test]
    fn tagged_wire_format_round_trips() {
        let wallet = Wallet::create();
        let tx = Transaction::Basic(BasicTx::signed(&wallet, Address::new("feedbeadfeedbeadfeed"), 3.0));
        let value = serde_json::to_value(&tx).unwrap();
        assert_eq!(value["transaction_type"], "basic");
        let back: Transaction = serde_json::from_value(value).unwrap();
        assert_eq!(tx, back);
        assert!(back.verify());
    }

    #[test]
    fn tag_names_cover_all_variants() {
        let g = Transaction::Genesis(GenesisTx::new(Address::new("ab12cd34ef56ab78cd90"), 1000.0, 0.0));
        assert_eq!(serde_json::to_value(&g).unwrap()["transaction_type"], "genesis");

        let wallet = Wallet::create();
        let d = Transaction::ContractDeploy(DeployTx::signed(&wallet, "c".into(), 0.0));
        assert_eq!(serde_json::to_value(&d).unwrap()["transaction_type"], "contract_deploy");
    }

    #[test]
    fn bit_flipped_signature_fails_verification() {
        let wallet = Wallet::create();
        let mut tx = BasicTx::signed(&wallet, Address::new("feedbeadfeedbeadfeed"), 100.0);
        let sig = tx.signature.take().unwrap();
        let mut bytes = sig.into_bytes();
        bytes[5] ^= 0x01;
        tx.signature = Some(String::from_utf8(bytes).unwrap());
        assert!(!tx.verify());
    }
}
