//! SHA-256 helpers and the rolling checksum chain over received output

use sha2::{Digest, Sha256};

/// Seed value of every checksum chain
pub const CHAIN_SEED: &str = "0000000000000000000000000000000000000000000000000000000000000000";

/// Lowercase hex SHA-256 of `data`
pub fn hex_digest(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Render a hex digest in the log's `algo:hex` form
pub fn tagged(hex: &str) -> String {
    format!("sha256:{}", hex)
}

/// Rolling hash over an ordered sequence of chunks
///
/// `link[i] = sha256(hex(link[i-1]) || hex(sha256(chunk[i])))`, with the
/// zero digest as the seed. Chunk contents, boundaries and order all feed
/// into the final value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChecksumChain {
    current: String,
}

impl Default for ChecksumChain {
    fn default() -> Self {
        Self {
            current: CHAIN_SEED.to_string(),
        }
    }
}

impl ChecksumChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Extend the chain with one chunk and return that chunk's digest
    pub fn extend(&mut self, chunk: &[u8]) -> String {
        let chunk_hash = hex_digest(chunk);
        self.extend_with_digest(&chunk_hash);
        chunk_hash
    }

    /// Extend the chain with an already-computed chunk digest
    pub fn extend_with_digest(&mut self, chunk_hash: &str) {
        let mut link = String::with_capacity(self.current.len() + chunk_hash.len());
        link.push_str(&self.current);
        link.push_str(chunk_hash);
        self.current = hex_digest(link.as_bytes());
    }

    /// Current chain value (hex, no prefix)
    pub fn value(&self) -> &str {
        &self.current
    }
}
