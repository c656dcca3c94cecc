//! Binary codec between raw byte buffers and the big-endian 32-bit word
//! representation the cipher layer works in.
//!
//! The word form always rounds up to 4-byte boundaries, so the exact byte
//! length is tracked separately (`sig_bytes`); conversion back truncates to
//! it, otherwise trailing zero bytes corrupt binary payloads.

use rand::{thread_rng, RngCore};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WordArray {
    pub words: Vec<u32>,
    pub sig_bytes: usize,
}

impl WordArray {
    pub fn new(words: Vec<u32>, sig_bytes: usize) -> Self {
        debug_assert!(sig_bytes <= words.len() * 4);
        WordArray { words, sig_bytes }
    }

    /// Packs bytes big-endian, four per word. The final word of a buffer
    /// whose length is not a multiple of 4 is zero-filled on the right.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let mut words = Vec::with_capacity((bytes.len() + 3) / 4);
        for chunk in bytes.chunks(4) {
            let mut word = 0u32;
            for (i, &b) in chunk.iter().enumerate() {
                word |= (b as u32) << (24 - i * 8);
            }
            words.push(word);
        }
        WordArray {
            words,
            sig_bytes: bytes.len(),
        }
    }

    /// Exact inverse of `from_bytes`: truncates to `sig_bytes`, never to
    /// the rounded word length.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.sig_bytes);
        for i in 0..self.sig_bytes {
            let byte = (self.words[i >> 2] >> (24 - (i % 4) * 8)) & 0xff;
            bytes.push(byte as u8);
        }
        bytes
    }

    /// Fresh random material from the thread RNG. Used for IVs and salts.
    pub fn random(n: usize) -> Self {
        let mut bytes = vec![0u8; n];
        thread_rng().fill_bytes(&mut bytes);
        WordArray::from_bytes(&bytes)
    }

    pub fn len(&self) -> usize {
        self.sig_bytes
    }

    pub fn is_empty(&self) -> bool {
        self.sig_bytes == 0
    }

    /// Appends `other`, keeping `sig_bytes` exact. Word-aligned buffers
    /// append in place; the unaligned case goes through bytes.
    pub fn concat(&mut self, other: &WordArray) {
        if self.sig_bytes % 4 == 0 {
            self.words.truncate(self.sig_bytes / 4);
            self.words.extend_from_slice(&other.words);
            self.sig_bytes += other.sig_bytes;
        } else {
            let mut bytes = self.to_bytes();
            bytes.extend(other.to_bytes());
            *self = WordArray::from_bytes(&bytes);
        }
    }
}
