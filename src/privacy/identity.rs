//! Email → storage namespace keying.

use sha2::{Digest, Sha256};

/// Hex characters kept from the digest unless configured otherwise.
pub const DEFAULT_HASH_LEN: usize = 16;
pub const MIN_HASH_LEN: usize = 8;
/// Full SHA-256 digest in hex.
pub const MAX_HASH_LEN: usize = 64;

/// Trim and lower-case an email address.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Deterministic, truncated SHA-256 of a normalized email.
///
/// The output groups every record for one address under a shared key prefix.
/// It is never used to recover the address.
#[derive(Debug, Clone, Copy)]
pub struct IdentityHasher {
    hex_len: usize,
}

impl IdentityHasher {
    /// `hex_len` is clamped to `MIN_HASH_LEN..=MAX_HASH_LEN`.
    pub fn new(hex_len: usize) -> Self {
        Self {
            hex_len: hex_len.clamp(MIN_HASH_LEN, MAX_HASH_LEN),
        }
    }

    pub fn hex_len(&self) -> usize {
        self.hex_len
    }

    pub fn hash(&self, email: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(normalize_email(email).as_bytes());
        let mut digest = hex::encode(hasher.finalize());
        digest.truncate(self.hex_len);
        digest
    }
}

impl Default for IdentityHasher {
    fn default() -> Self {
        Self::new(DEFAULT_HASH_LEN)
    }
}
