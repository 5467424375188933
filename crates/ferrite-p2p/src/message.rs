use serde::{Deserialize, Serialize};
use serde_json::Value;

use ferrite_core::unix_now;
use ferrite_crypto::{canonical_json, sha256_hex_str};

/// Envelope types exchanged on the overlay. `transaction` and `block` are
/// accepted as aliases of the `new_*` forms on the wire.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    PeerDiscovery,
    #[serde(alias = "transaction")]
    NewTransaction,
    #[serde(alias = "block")]
    NewBlock,
    ChainRequest,
    ChainResponse,
    Ping,
    Pong,
}

/// One overlay message: a payload wrapped with its sender and a unique
/// `message_id` used for duplicate suppression.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub kind: MessageKind,
    pub data: Value,
    pub sender_id: String,
    pub timestamp: f64,
    pub message_id: String,
}

impl Envelope {
    /// Wrap a payload. `message_id` is
    /// `sender_id ++ "_" ++ timestamp ++ "_" ++ sha256(canonical(data))`,
    /// unique per emission.
    pub fn new(kind: MessageKind, data: Value, sender_id: &str) -> Self {
        let timestamp = unix_now();
        let digest = sha256_hex_str(&canonical_json(&data));
        let message_id = format!("{sender_id}_{timestamp}_{digest}");
        Self {
            kind,
            data,
            sender_id: sender_id.to_string(),
            timestamp,
            message_id,
        }
    }

    /// One wire line, without the trailing newline.
    pub fn encode(&self) -> String {
        serde_json::to_string(self).expect("envelope serialization is infallible")
    }

    pub fn decode(line: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn wire_round_trip() {
        let env = Envelope::new(MessageKind::Ping, json!({"timestamp": 1.5}), "node_a");
        let back = Envelope::decode(&env.encode()).unwrap();
        assert_eq!(back.kind, MessageKind::Ping);
        assert_eq!(back.sender_id, "node_a");
        assert_eq!(back.message_id, env.message_id);
    }

    #[test]
    fn kind_tags() {
        let env = Envelope::new(MessageKind::NewTransaction, json!({}), "n");
        let value: Value = serde_json::from_str(&env.encode()).unwrap();
        assert_eq!(value["type"], "new_transaction");
    }

    #[test]
    fn legacy_aliases_accepted() {
        let line = r#"{"type":"transaction","data":{},"sender_id":"n","timestamp":1.0,"message_id":"n_1_x"}"#;
        assert_eq!(Envelope::decode(line).unwrap().kind, MessageKind::NewTransaction);

        let line = r#"{"type":"block","data":{},"sender_id":"n","timestamp":1.0,"message_id":"n_1_x"}"#;
        assert_eq!(Envelope::decode(line).unwrap().kind, MessageKind::NewBlock);
    }

    #[test]
    fn unknown_kind_is_malformed() {
        let line = r#"{"type":"evil","data":{},"sender_id":"n","timestamp":1.0,"message_id":"x"}"#;
        assert!(Envelope::decode(line).is_err());
    }

    #[test]
    fn missing_fields_are_malformed() {
        assert!(Envelope::decode(r#"{"type":"ping"}"#).is_err());
        assert!(Envelope::decode("not json at all").is_err());
    }

    #[test]
    fn message_id_distinguishes_payloads() {
        let a = Envelope::new(MessageKind::Ping, json!({"n": 1}), "node");
        let b = Envelope::new(MessageKind::Ping, json!({"n": 2}), "node");
        assert_ne!(a.message_id, b.message_id);
    }
}
