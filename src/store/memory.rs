//! In-process content-addressed store for tests and local development.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::RwLock;
use sha2::{Digest, Sha256};

use crate::error::{Result, VaultError};
use crate::metadata::RecordMetadata;
use crate::store::ContentStore;

#[derive(Default)]
pub struct MemoryStore {
    blobs: RwLock<HashMap<String, Vec<u8>>>,
    tags: RwLock<HashMap<String, RecordMetadata>>,
    upload_count: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of uploads accepted so far. Lets tests assert call counts.
    pub fn upload_count(&self) -> usize {
        self.upload_count.load(Ordering::SeqCst)
    }

    pub fn metadata_for(&self, content_hash: &str) -> Option<RecordMetadata> {
        self.tags.read().get(content_hash).cloned()
    }

    fn address(payload: &[u8]) -> String {
        let digest = Sha256::digest(payload);
        format!("Qm{:x}", digest)
    }
}

impl ContentStore for MemoryStore {
    async fn upload(&self, payload: Vec<u8>, metadata: &RecordMetadata) -> Result<String> {
        let hash = Self::address(&payload);
        self.blobs.write().insert(hash.clone(), payload);
        self.tags.write().insert(hash.clone(), metadata.clone());
        self.upload_count.fetch_add(1, Ordering::SeqCst);
        Ok(hash)
    }

    async fn fetch(&self, content_hash: &str) -> Result<Vec<u8>> {
        self.blobs
            .read()
            .get(content_hash)
            .cloned()
            .ok_or_else(|| {
                VaultError::FetchError(format!("No blob stored for {}", content_hash))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_upload_then_fetch() {
        let store = MemoryStore::new();
        let hash = store
            .upload(b"ciphertext".to_vec(), &RecordMetadata::new())
            .await
            .unwrap();
        assert_eq!(store.fetch(&hash).await.unwrap(), b"ciphertext");
        assert_eq!(store.upload_count(), 1);
    }

    #[tokio::test]
    async fn test_fetch_unknown_hash_fails() {
        let store = MemoryStore::new();
        assert!(matches!(
            store.fetch("QmMissing").await,
            Err(VaultError::FetchError(_))
        ));
    }
}
