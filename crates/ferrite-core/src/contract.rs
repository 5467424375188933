use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use ferrite_crypto::sha256_hex_str;

use crate::types::{Address, Amount, Timestamp};

/// Derive a contract address: the first 20 hex characters of
/// SHA-256(creator ++ code ++ deploy_timestamp).
pub fn derive_contract_address(creator: &Address, code: &str, deploy_timestamp: Timestamp) -> Address {
    let digest = sha256_hex_str(&format!("{creator}{code}{deploy_timestamp}"));
    Address::new(&digest[..20])
}

// ── Execution results ────────────────────────────────────────────────────────

/// A balance movement requested by contract code. The chain engine applies
/// it to external account state; the VM only debits the contract balance.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ContractTransfer {
    pub to: Address,
    pub amount: Amount,
}

/// Outcome of one contract invocation. Failures carry a message and leave
/// contract state untouched.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ExecutionResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transfer: Option<ContractTransfer>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_balance: Option<Amount>,
}

impl ExecutionResult {
    fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            value: None,
            transfer: None,
            new_balance: None,
        }
    }

    fn fail(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
            value: None,
            transfer: None,
            new_balance: None,
        }
    }
}

// ── SmartContract ────────────────────────────────────────────────────────────

/// An on-chain contract: a mutable key/value store with an internal balance
/// and a fixed set of four callable functions. Contract state changes only
/// when a contract-call transaction is applied inside a committed block.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SmartContract {
    pub contract_address: Address,
    pub contract_code: String,
    pub creator_address: Address,
    pub state: BTreeMap<String, Value>,
    pub balance: Amount,
    pub created_at: Timestamp,
}

impl SmartContract {
    /// Register a contract at its derived address with empty state.
    pub fn new(contract_code: String, creator_address: Address, deploy_timestamp: Timestamp) -> Self {
        let contract_address = derive_contract_address(&creator_address, &contract_code, deploy_timestamp);
        Self {
            contract_address,
            contract_code,
            creator_address,
            state: BTreeMap::new(),
            balance: 0.0,
            created_at: deploy_timestamp,
        }
    }

    /// Run one of the four opcodes. `value` is the amount carried by the
    /// calling transaction (consumed by `deposit`). Unknown functions and
    /// bad parameters fail without mutating anything.
    pub fn execute(
        &mut self,
        function_name: &str,
        parameters: &Map<String, Value>,
        _caller: &Address,
        value: Amount,
    ) -> ExecutionResult {
        match function_name {
            "set_value" => {
                let key = parameters.get("key").and_then(Value::as_str);
                let val = parameters.get("value");
                match (key, val) {
                    (Some(key), Some(val)) if !key.is_empty() => {
                        self.state.insert(key.to_string(), val.clone());
                        ExecutionResult::ok(format!("Set {key}"))
                    }
                    _ => ExecutionResult::fail("set_value requires a key and a value"),
                }
            }

            "get_value" => {
                let Some(key) = parameters.get("key").and_then(Value::as_str) else {
                    return ExecutionResult::fail("get_value requires a key");
                };
                match self.state.get(key) {
                    Some(val) => ExecutionResult {
                        value: Some(val.clone()),
                        ..ExecutionResult::ok(format!("Read {key}"))
                    },
                    None => ExecutionResult::fail("Key not found"),
                }
            }

            "transfer" => {
                let Some(recipient) = parameters.get("recipient").and_then(Value::as_str) else {
                    return ExecutionResult::fail("transfer requires a recipient");
                };
                let amount = parameters.get("amount").and_then(Value::as_f64).unwrap_or(0.0);
                if amount <= 0.0 || self.balance < amount {
                    return ExecutionResult::fail("Insufficient contract balance");
                }
                self.balance -= amount;
                ExecutionResult {
                    transfer: Some(ContractTransfer { to: Address::new(recipient), amount }),
                    ..ExecutionResult::ok(format!("Transferred {amount} to {recipient}"))
                }
            }

            "deposit" => {
                self.balance += value;
                ExecutionResult {
                    new_balance: Some(self.balance),
                    ..ExecutionResult::ok(format!("Deposited {value}"))
                }
            }

            _ => ExecutionResult::fail(format!("Function {function_name} not found")),
        }
    }
}
