use crate::hash::{sha256_hex, sha256_hex_str};

/// Root of the pairwise SHA-256 Merkle tree over pre-hashed leaves.
///
/// Adjacent hex digests are concatenated as strings and re-hashed. Odd-width
/// levels duplicate their last hash. The empty tree commits to SHA-256 of
/// the empty string.
pub fn merkle_root(leaf_hashes: &[String]) -> String {
    if leaf_hashes.is_empty() {
        return sha256_hex(b"");
    }

    let mut level = leaf_hashes.to_vec();
    while level.len() > 1 {
        if level.len() % 2 != 0 {
            level.push(level.last().cloned().expect("level is non-empty"));
        }
        level = level
            .chunks(2)
            .map(|pair| sha256_hex_str(&format!("{}{}", pair[0], pair[1])))
            .collect();
    }
    level.into_iter().next().expect("level is non-empty")
}
