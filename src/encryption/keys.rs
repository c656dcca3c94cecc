//! Encryption key normalization.
//!
//! Passphrases are folded to exactly 32 key bytes by padding or truncating,
//! matching the scheme existing ciphertexts were produced with.

use crate::error::{Result, VaultError};

pub const KEY_LEN: usize = 32;

/// A normalized 32-byte AES-256 key.
#[derive(Clone, PartialEq, Eq)]
pub struct RecordKey([u8; KEY_LEN]);

impl RecordKey {
    /// Normalizes a passphrase to a fixed 32-byte key: shorter input is
    /// right-padded with ASCII `'0'`, longer input is truncated to its
    /// first 32 bytes.
    ///
    /// This is a known weakness, not a real KDF (no salt, no stretching);
    /// it is kept as-is for compatibility with ciphertexts already pinned
    /// under keys normalized this way.
    pub fn derive(passphrase: &str) -> Self {
        let mut key = [b'0'; KEY_LEN];
        let bytes = passphrase.as_bytes();
        let take = bytes.len().min(KEY_LEN);
        key[..take].copy_from_slice(&bytes[..take]);
        RecordKey(key)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != KEY_LEN {
            return Err(VaultError::InvalidKey(format!(
                "Key must be {} bytes for AES-256, got {}",
                KEY_LEN,
                bytes.len()
            )));
        }
        let mut key = [0u8; KEY_LEN];
        key.copy_from_slice(bytes);
        Ok(RecordKey(key))
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }
}

// Key material stays out of logs.
impl std::fmt::Debug for RecordKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("RecordKey(..)")
    }
}
