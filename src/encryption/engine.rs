//! AES-256-CBC record cipher with two framings.
//!
//! Text payloads use a self-describing salted header: the literal prefix
//! `Salted__` followed by base64 of `salt(8) || ciphertext`, with cipher key
//! and IV derived per-message from the record key and salt. Binary payloads
//! carry no header: a fresh 16-byte IV is prepended to the ciphertext and
//! the whole buffer is base64-encoded.
//!
//! CBC carries no authentication tag, so a wrong key is detected only
//! heuristically (padding or UTF-8 failure, or an empty plaintext). A wrong
//! key can in principle survive those checks and yield garbage; callers get
//! a `DecryptionError` in every case this layer can detect.

use aes::Aes256;
use cipher::{
    consts::U16,
    generic_array::GenericArray,
    BlockDecrypt, BlockEncrypt, KeyInit,
};
use sha2::{Digest, Sha256};

use crate::encryption::codec::WordArray;
use crate::encryption::keys::RecordKey;
use crate::error::{Result, VaultError};

const BLOCK_SIZE: usize = 16;
const IV_SIZE: usize = 16;
const SALT_SIZE: usize = 8;

/// Marker prefix of text-framed ciphertext. Also the framing sniff key:
/// anything not starting with it is treated as binary-framed.
pub const SALTED_MAGIC: &str = "Salted__";

pub struct RecordCipher {
    key: RecordKey,
}

impl RecordCipher {
    pub fn new(key: RecordKey) -> Self {
        Self { key }
    }

    /// Encrypts a text payload into the salted self-describing framing.
    /// The caller manages no IV; key and IV come out of the salt schedule.
    pub fn encrypt_text(&self, plaintext: &str) -> Result<String> {
        let salt = WordArray::random(SALT_SIZE);
        let salt_bytes = salt.to_bytes();
        let (key, iv) = salted_key_schedule(self.key.as_bytes(), &salt_bytes);

        let padded = pad(plaintext.as_bytes());
        let ciphertext = cbc_encrypt(&padded, &key, &iv);

        let mut framed = salt;
        framed.concat(&WordArray::from_bytes(&ciphertext));
        Ok(format!("{}{}", SALTED_MAGIC, base64::encode(framed.to_bytes())))
    }

    /// Inverse of `encrypt_text`. Fails with `DecryptionError` on a
    /// missing header, bad padding, non-UTF-8 output, or an empty
    /// plaintext (the wrong-key heuristic).
    pub fn decrypt_text(&self, ciphertext: &str) -> Result<String> {
        let encoded = ciphertext.strip_prefix(SALTED_MAGIC).ok_or_else(|| {
            VaultError::DecryptionError("Missing salted header".to_string())
        })?;
        let framed = base64::decode(encoded)
            .map_err(|e| VaultError::DecryptionError(format!("Invalid base64: {}", e)))?;
        if framed.len() < SALT_SIZE {
            return Err(VaultError::DecryptionError(
                "Data too short for salt".to_string(),
            ));
        }

        let (salt, body) = framed.split_at(SALT_SIZE);
        let (key, iv) = salted_key_schedule(self.key.as_bytes(), salt);
        let decrypted = cbc_decrypt(body, &key, &iv)?;
        let plaintext = unpad(&decrypted)?;

        let text = String::from_utf8(plaintext).map_err(|_| {
            VaultError::DecryptionError(
                "Decrypted data is not valid UTF-8 - possibly wrong key".to_string(),
            )
        })?;
        if text.is_empty() {
            return Err(VaultError::DecryptionError(
                "Decryption produced empty output - possibly wrong key".to_string(),
            ));
        }
        Ok(text)
    }

    /// Encrypts a binary payload: fresh random 16-byte IV, record key used
    /// directly, output base64(IV || ciphertext). No self-describing
    /// header in this framing.
    pub fn encrypt_binary(&self, data: &[u8]) -> Result<String> {
        let iv = WordArray::random(IV_SIZE);
        let iv_bytes = iv.to_bytes();

        let padded = pad(data);
        let ciphertext = cbc_encrypt(
            &padded,
            self.key.as_bytes(),
            iv_bytes.as_slice().try_into().expect("IV is 16 bytes"),
        );

        let mut combined = iv;
        combined.concat(&WordArray::from_bytes(&ciphertext));
        Ok(base64::encode(combined.to_bytes()))
    }

    /// Inverse of `encrypt_binary`: splits off the 16-byte IV and decrypts
    /// the remainder. Input shorter than one IV cannot be valid.
    pub fn decrypt_binary(&self, encoded: &str) -> Result<Vec<u8>> {
        let decoded = base64::decode(encoded.trim())
            .map_err(|e| VaultError::DecryptionError(format!("Invalid base64: {}", e)))?;
        let combined = WordArray::from_bytes(&decoded);
        if combined.len() < IV_SIZE {
            return Err(VaultError::DecryptionError(
                "Data too short for IV + ciphertext".to_string(),
            ));
        }

        let bytes = combined.to_bytes();
        let (iv, body) = bytes.split_at(IV_SIZE);
        let decrypted = cbc_decrypt(
            body,
            self.key.as_bytes(),
            iv.try_into().expect("IV is 16 bytes"),
        )?;
        unpad(&decrypted)
    }
}

/// OpenSSL-style bytes-to-key schedule over SHA-256: hash the key material
/// and salt, then re-hash with the previous digest prepended, until 48
/// bytes are available (32 key + 16 IV).
fn salted_key_schedule(key_material: &[u8], salt: &[u8]) -> ([u8; 32], [u8; IV_SIZE]) {
    let mut derived = Vec::with_capacity(64);
    let mut previous: Vec<u8> = Vec::new();
    while derived.len() < 48 {
        let mut hasher = Sha256::new();
        hasher.update(&previous);
        hasher.update(key_material);
        hasher.update(salt);
        previous = hasher.finalize().to_vec();
        derived.extend_from_slice(&previous);
    }

    let mut key = [0u8; 32];
    key.copy_from_slice(&derived[..32]);
    let mut iv = [0u8; IV_SIZE];
    iv.copy_from_slice(&derived[32..48]);
    (key, iv)
}

fn pad(data: &[u8]) -> Vec<u8> {
    let padding_len = BLOCK_SIZE - (data.len() % BLOCK_SIZE);
    let mut padded = data.to_vec();
    padded.extend(vec![padding_len as u8; padding_len]);
    padded
}

fn unpad(data: &[u8]) -> Result<Vec<u8>> {
    let padding_len = *data.last().ok_or_else(|| {
        VaultError::DecryptionError("Empty decrypted data".to_string())
    })? as usize;

    if padding_len == 0 || padding_len > BLOCK_SIZE {
        return Err(VaultError::DecryptionError(
            "Invalid padding length".to_string(),
        ));
    }

    let start = data.len().checked_sub(padding_len).ok_or_else(|| {
        VaultError::DecryptionError("Invalid padding length".to_string())
    })?;

    if data[start..].iter().all(|&x| x == padding_len as u8) {
        Ok(data[..start].to_vec())
    } else {
        Err(VaultError::DecryptionError("Invalid padding".to_string()))
    }
}

fn cbc_encrypt(padded: &[u8], key: &[u8; 32], iv: &[u8; IV_SIZE]) -> Vec<u8> {
    let cipher = Aes256::new(GenericArray::from_slice(key));
    let mut output = Vec::with_capacity(padded.len());
    let mut previous = *iv;

    for chunk in padded.chunks(BLOCK_SIZE) {
        let mut block: GenericArray<u8, U16> = GenericArray::default();
        block.copy_from_slice(chunk);
        for (b, p) in block.iter_mut().zip(previous.iter()) {
            *b ^= p;
        }
        cipher.encrypt_block(&mut block);
        previous.copy_from_slice(&block);
        output.extend_from_slice(&block);
    }
    output
}

fn cbc_decrypt(ciphertext: &[u8], key: &[u8; 32], iv: &[u8; IV_SIZE]) -> Result<Vec<u8>> {
    if ciphertext.is_empty() || ciphertext.len() % BLOCK_SIZE != 0 {
        return Err(VaultError::DecryptionError(
            "Ciphertext length must be a non-zero multiple of 16 bytes".to_string(),
        ));
    }

    let cipher = Aes256::new(GenericArray::from_slice(key));
    let mut output = Vec::with_capacity(ciphertext.len());
    let mut previous = *iv;

    for chunk in ciphertext.chunks(BLOCK_SIZE) {
        let mut block: GenericArray<u8, U16> = GenericArray::default();
        block.copy_from_slice(chunk);
        cipher.decrypt_block(&mut block);
        for (b, p) in block.iter_mut().zip(previous.iter()) {
            *b ^= p;
        }
        previous.copy_from_slice(chunk);
        output.extend_from_slice(&block);
    }
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cipher(passphrase: &str) -> RecordCipher {
        RecordCipher::new(RecordKey::derive(passphrase))
    }

    #[test]
    fn test_text_roundtrip() {
        let c = cipher("patient-passphrase");
        for msg in ["hello", "{\"bp\":\"120/80\"}", "x", "a longer clinical note with unicode: °C µg"] {
            let encrypted = c.encrypt_text(msg).unwrap();
            assert!(encrypted.starts_with(SALTED_MAGIC));
            assert_eq!(c.decrypt_text(&encrypted).unwrap(), msg);
        }
    }

    #[test]
    fn test_binary_roundtrip_various_lengths() {
        let c = cipher("shortkey");
        for len in [0usize, 1, 3, 5, 15, 16, 17, 64, 255] {
            let data: Vec<u8> = (0..len).map(|i| (i * 97 % 256) as u8).collect();
            let encrypted = c.encrypt_binary(&data).unwrap();
            let decoded = base64::decode(&encrypted).unwrap();
            assert!(decoded.len() >= IV_SIZE + BLOCK_SIZE);
            assert_eq!(c.decrypt_binary(&encrypted).unwrap(), data, "length {}", len);
        }
    }

    #[test]
    fn test_binary_roundtrip_non_utf8() {
        let c = cipher("shortkey");
        let data = vec![0x00, 0xff, 0xfe, 0x80, 0xc3, 0x28];
        let encrypted = c.encrypt_binary(&data).unwrap();
        assert_eq!(c.decrypt_binary(&encrypted).unwrap(), data);
    }

    #[test]
    fn test_fresh_iv_per_binary_encryption() {
        let c = cipher("shortkey");
        let data = b"same plaintext".to_vec();
        let a = c.encrypt_binary(&data).unwrap();
        let b = c.encrypt_binary(&data).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_wrong_key_text_is_detected() {
        let c = cipher("the-right-key");
        let encrypted = c.encrypt_text("confidential note").unwrap();
        let wrong = cipher("the-wrong-key");
        match wrong.decrypt_text(&encrypted) {
            Err(VaultError::DecryptionError(_)) => {}
            Ok(text) => panic!("wrong key silently accepted: {:?}", text),
            Err(e) => panic!("unexpected error kind: {:?}", e),
        }
    }

    #[test]
    fn test_wrong_key_binary_never_returns_original() {
        let c = cipher("key-one");
        let data = vec![1, 2, 3, 4, 5];
        let encrypted = c.encrypt_binary(&data).unwrap();
        let wrong = cipher("key-two");
        match wrong.decrypt_binary(&encrypted) {
            Err(VaultError::DecryptionError(_)) => {}
            // Unauthenticated CBC: garbage can occasionally unpad cleanly,
            // but it is never the original plaintext.
            Ok(bytes) => assert_ne!(bytes, data),
            Err(e) => panic!("unexpected error kind: {:?}", e),
        }
    }

    #[test]
    fn test_binary_too_short_for_iv() {
        let c = cipher("key");
        let short = base64::encode([0u8; 8]);
        assert!(matches!(
            c.decrypt_binary(&short),
            Err(VaultError::DecryptionError(_))
        ));
    }

    #[test]
    fn test_text_missing_header_rejected() {
        let c = cipher("key");
        assert!(matches!(
            c.decrypt_text("bm90IHNhbHRlZA=="),
            Err(VaultError::DecryptionError(_))
        ));
    }

    #[test]
    fn test_unpad_rejects_corrupt_padding() {
        assert!(unpad(&[1, 2, 3, 17]).is_err());
        assert!(unpad(&[1, 2, 3, 0]).is_err());
        assert!(unpad(&[1, 2, 2, 3]).is_err());
        assert_eq!(unpad(&[1, 2, 2, 2]).unwrap(), vec![1, 2]);
    }
}
