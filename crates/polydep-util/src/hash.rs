use sha2::{Digest, Sha256};

/// Compute the SHA-256 hash of a byte slice, returning a lowercase hex string.
pub fn sha256_bytes(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}

/// First 12 hex characters of the SHA-256 of `data`.
pub fn short_digest(data: &[u8]) -> String {
    let mut full = sha256_bytes(data);
    full.truncate(12);
    full
}
