use sha2::{Digest, Sha256};

/// SHA-256 over raw bytes, rendered as lowercase hex.
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// SHA-256 over a UTF-8 string, rendered as lowercase hex.
pub fn sha256_hex_str(data: &str) -> String {
    sha256_hex(data.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_digest() {
        // SHA-256 of the empty string is a well-known constant.
        assert_eq!(
            sha256_hex(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn hex_is_lowercase() {
        let digest = sha256_hex(b"ferrite");
        assert_eq!(digest, digest.to_lowercase());
        assert_eq!(digest.len(), 64);
    }
}
