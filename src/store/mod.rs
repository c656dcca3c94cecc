//! Content-addressed blob storage.
//!
//! The store is pure ingress/egress: it moves opaque ciphertext bytes and
//! plaintext key-value tags, and knows nothing about encryption. Keys never
//! cross this boundary.

pub mod memory;

use serde::Deserialize;
use serde_json::json;

use crate::config::VaultConfig;
use crate::error::{Result, VaultError};
use crate::metadata::RecordMetadata;

pub use memory::MemoryStore;

/// Upload/fetch surface of a content-addressed pinning service.
#[allow(async_fn_in_trait)]
pub trait ContentStore {
    /// Stores a payload with its metadata tags and returns the content
    /// hash. Single attempt; callers own any retry policy so duplicate
    /// pins are a deliberate choice.
    async fn upload(&self, payload: Vec<u8>, metadata: &RecordMetadata) -> Result<String>;

    /// Resolves a content hash back to raw bytes.
    async fn fetch(&self, content_hash: &str) -> Result<Vec<u8>>;
}

#[derive(Deserialize)]
struct PinResponse {
    #[serde(rename = "IpfsHash")]
    ipfs_hash: String,
}

#[derive(Deserialize)]
struct PinErrorBody {
    error: Option<PinErrorReason>,
}

#[derive(Deserialize)]
struct PinErrorReason {
    reason: Option<String>,
}

/// Pinata-backed store: multipart POST with bearer auth for uploads, plain
/// gateway GET for fetches.
pub struct PinataStore {
    client: reqwest::Client,
    config: VaultConfig,
}

impl PinataStore {
    pub fn new(config: VaultConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    /// Public gateway URL for a pinned blob.
    pub fn gateway_url(&self, content_hash: &str) -> String {
        format!(
            "{}/{}",
            self.config.pinata_gateway_url.trim_end_matches('/'),
            content_hash
        )
    }
}

impl ContentStore for PinataStore {
    async fn upload(&self, payload: Vec<u8>, metadata: &RecordMetadata) -> Result<String> {
        let jwt = self.config.pinata_jwt.as_ref().ok_or_else(|| {
            VaultError::UploadError("Pinata JWT token not configured".to_string())
        })?;

        let file_name = metadata
            .file_name
            .clone()
            .unwrap_or_else(|| "record".to_string());
        log::debug!("Uploading {} bytes as {}", payload.len(), file_name);

        // Ciphertext travels as an opaque text/plain part; the tags ride in
        // the pinataMetadata side-channel, never inside the payload.
        let part = reqwest::multipart::Part::bytes(payload)
            .file_name(file_name.clone())
            .mime_str("text/plain")
            .map_err(|e| VaultError::UploadError(e.to_string()))?;
        let pinata_metadata = json!({
            "name": file_name,
            "keyvalues": metadata.keyvalues(),
        });
        let form = reqwest::multipart::Form::new()
            .part("file", part)
            .text("pinataMetadata", pinata_metadata.to_string());

        let response = self
            .client
            .post(&self.config.pinata_api_url)
            .bearer_auth(jwt)
            .multipart(form)
            .send()
            .await
            .map_err(|e| VaultError::UploadError(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let reason = response
                .json::<PinErrorBody>()
                .await
                .ok()
                .and_then(|b| b.error)
                .and_then(|e| e.reason)
                .unwrap_or_else(|| status.to_string());
            return Err(VaultError::UploadError(format!(
                "Pinning service rejected upload: {}",
                reason
            )));
        }

        let pinned: PinResponse = response
            .json()
            .await
            .map_err(|e| VaultError::UploadError(e.to_string()))?;
        log::info!("Pinned {} as {}", file_name, pinned.ipfs_hash);
        Ok(pinned.ipfs_hash)
    }

    async fn fetch(&self, content_hash: &str) -> Result<Vec<u8>> {
        let url = self.gateway_url(content_hash);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| VaultError::FetchError(e.to_string()))?;

        if !response.status().is_success() {
            return Err(VaultError::FetchError(format!(
                "Gateway returned {} for {}",
                response.status(),
                content_hash
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| VaultError::FetchError(e.to_string()))?;
        log::debug!("Fetched {} bytes for {}", bytes.len(), content_hash);
        Ok(bytes.to_vec())
    }
}
