use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use k256::ecdsa::signature::{Signer, Verifier};
use k256::ecdsa::{Signature, SigningKey, VerifyingKey};
use k256::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey, LineEnding};
use rand::rngs::OsRng;
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::canonical::canonical_json;

/// Number of hex characters kept from the double-SHA-256 of the public key
/// when deriving an address.
pub const ADDRESS_HEX_LEN: usize = 20;

/// Derive a ledger address from a SubjectPublicKeyInfo PEM: the first 20 hex
/// characters of SHA-256(SHA-256(pem_bytes)).
pub fn address_from_pem(public_key_pem: &str) -> String {
    let first = Sha256::digest(public_key_pem.as_bytes());
    let second = Sha256::digest(first);
    hex::encode(second)[..ADDRESS_HEX_LEN].to_string()
}

/// A ferrite wallet: a secp256k1 keypair with its derived address.
///
/// Signatures are ECDSA-SHA256 in DER form, base64-encoded for transport.
/// The signing pre-image is always the canonical JSON of the payload.
#[derive(Clone)]
pub struct Wallet {
    signing_key: SigningKey,
    public_key_pem: String,
    address: String,
}

impl Wallet {
    /// Generate a fresh secp256k1 keypair.
    pub fn create() -> Self {
        let signing_key = SigningKey::random(&mut OsRng);
        Self::from_signing_key(signing_key)
    }

    /// Restore a wallet from a PKCS#8 PEM private key.
    pub fn from_private_key_pem(pem: &str) -> Result<Self, k256::pkcs8::Error> {
        let signing_key = SigningKey::from_pkcs8_pem(pem)?;
        Ok(Self::from_signing_key(signing_key))
    }

    fn from_signing_key(signing_key: SigningKey) -> Self {
        let public_key_pem = signing_key
            .verifying_key()
            .to_public_key_pem(LineEnding::LF)
            .expect("SPKI encoding of a valid public key is infallible");
        let address = address_from_pem(&public_key_pem);
        Self { signing_key, public_key_pem, address }
    }

    /// The 20-hex-character address derived from this wallet's public key.
    pub fn address(&self) -> &str {
        &self.address
    }

    /// The public key as a SubjectPublicKeyInfo PEM string.
    pub fn public_key_pem(&self) -> &str {
        &self.public_key_pem
    }

    /// Export the private key as a PKCS#8 PEM string.
    pub fn private_key_pem(&self) -> String {
        self.signing_key
            .to_pkcs8_pem(LineEnding::LF)
            .expect("PKCS#8 encoding of a valid private key is infallible")
            .to_string()
    }

    /// Sign the canonical encoding of `payload`. Returns base64(DER).
    pub fn sign<T: Serialize>(&self, payload: &T) -> String {
        let message = canonical_json(payload);
        let signature: Signature = self.signing_key.sign(message.as_bytes());
        BASE64.encode(signature.to_der().as_bytes())
    }

    /// Verify a signature over the canonical encoding of `payload` against a
    /// PEM public key. Returns false on any decoding or verification error,
    /// never panics.
    pub fn verify<T: Serialize>(payload: &T, signature_b64: &str, public_key_pem: &str) -> bool {
        let Ok(verifying_key) = VerifyingKey::from_public_key_pem(public_key_pem) else {
            return false;
        };
        let Ok(der_bytes) = BASE64.decode(signature_b64) else {
            return false;
        };
        let Ok(signature) = Signature::from_der(&der_bytes) else {
            return false;
        };
        let Ok(value) = serde_json::to_value(payload) else {
            return false;
        };
        let Ok(message) = serde_json::to_string(&value) else {
            return false;
        };
        verifying_key.verify(message.as_bytes(), &signature).is_ok()
    }
}

impl std::fmt::Debug for Wallet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Wallet {{ address: {} }}", self.address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn address_shape() {
        let w = Wallet::create();
        assert_eq!(w.address().len(), ADDRESS_HEX_LEN);
        assert!(w.address().chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn sign_verify_round_trip() {
        let w = Wallet::create();
        let payload = json!({"sender": w.address(), "recipient": "feedbead", "amount": 50.0});
        let sig = w.sign(&payload);
        assert!(Wallet::verify(&payload, &sig, w.public_key_pem()));
    }

    #[test]
    fn tampered_signature_fails() {
        let w = Wallet::create();
        let payload = json!({"amount": 1.0});
        let sig = w.sign(&payload);
        // Flip one character of the base64.
        let mut tampered: Vec<u8> = sig.clone().into_bytes();
        tampered[10] = if tampered[10] == b'A' { b'B' } else { b'A' };
        let tampered = String::from_utf8(tampered).unwrap();
        assert!(!Wallet::verify(&payload, &tampered, w.public_key_pem()));
    }

    #[test]
    fn tampered_content_fails() {
        let w = Wallet::create();
        let payload = json!({"amount": 1.0});
        let sig = w.sign(&payload);
        assert!(!Wallet::verify(&json!({"amount": 2.0}), &sig, w.public_key_pem()));
    }

    #[test]
    fn wrong_key_fails() {
        let w1 = Wallet::create();
        let w2 = Wallet::create();
        let payload = json!({"amount": 1.0});
        let sig = w1.sign(&payload);
        assert!(!Wallet::verify(&payload, &sig, w2.public_key_pem()));
    }

    #[test]
    fn garbage_inputs_return_false() {
        let payload = json!({"amount": 1.0});
        assert!(!Wallet::verify(&payload, "not base64 \u{1F980}", "not a pem"));
        let w = Wallet::create();
        assert!(!Wallet::verify(&payload, "QUJD", w.public_key_pem())); // valid b64, bad DER
    }

    #[test]
    fn private_key_pem_round_trip() {
        let w = Wallet::create();
        let restored = Wallet::from_private_key_pem(&w.private_key_pem()).unwrap();
        assert_eq!(w.address(), restored.address());
        assert_eq!(w.public_key_pem(), restored.public_key_pem());
    }
}
