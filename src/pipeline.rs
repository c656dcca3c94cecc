//! Upload/download orchestration: byte extraction, encryption-method
//! selection, metadata tagging, and the inverse fetch/sniff/decrypt round
//! trip. Stateless between calls; all durable state lives in the content
//! store and the ledger.

use std::path::Path;

use crate::encryption::{detect_framing, RecordCipher, RecordKey};
use crate::error::{Result, VaultError};
use crate::metadata::{EncryptionMethod, RecordMetadata};
use crate::store::ContentStore;

/// A file handed in for upload: name, declared MIME type, raw bytes.
#[derive(Debug, Clone)]
pub struct RecordFile {
    pub name: String,
    pub mime_type: String,
    pub data: Vec<u8>,
}

impl RecordFile {
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            data,
        }
    }

    /// Reads a file from disk, guessing the MIME type from its extension.
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = tokio::fs::read(path)
            .await
            .map_err(|e| VaultError::UploadError(format!("{}: {}", path.display(), e)))?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "record".to_string());
        let mime_type = guess_mime(path).to_string();
        Ok(Self { name, mime_type, data })
    }

    /// Text MIME types take the text encryption path; everything else is
    /// treated as binary.
    pub fn encryption_method(&self) -> EncryptionMethod {
        if self.mime_type.starts_with("text") || self.mime_type == "application/json" {
            EncryptionMethod::Text
        } else {
            EncryptionMethod::Binary
        }
    }
}

fn guess_mime(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("txt") | Some("md") | Some("csv") => "text/plain",
        Some("json") => "application/json",
        Some("html") => "text/html",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("pdf") => "application/pdf",
        Some("dcm") => "application/dicom",
        _ => "application/octet-stream",
    }
}

/// Decrypted record content, typed by the framing it was stored with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordContent {
    Text(String),
    Binary(Vec<u8>),
}

#[derive(Debug, Clone)]
pub struct DecryptedRecord {
    pub content: RecordContent,
    pub mime_type: String,
}

impl DecryptedRecord {
    pub fn is_binary(&self) -> bool {
        matches!(self.content, RecordContent::Binary(_))
    }

    pub fn as_bytes(&self) -> &[u8] {
        match &self.content {
            RecordContent::Text(s) => s.as_bytes(),
            RecordContent::Binary(b) => b,
        }
    }
}

pub struct RecordPipeline<S: ContentStore> {
    store: S,
}

impl<S: ContentStore> RecordPipeline<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Encrypts and uploads a file, returning its content hash. The
    /// declared MIME type picks the encryption method; the method and the
    /// original type are recorded in the upload tags so viewers can decode
    /// without re-sniffing.
    pub async fn upload_record(
        &self,
        file: &RecordFile,
        key: &RecordKey,
        metadata: RecordMetadata,
    ) -> Result<String> {
        let method = file.encryption_method();
        let cipher = RecordCipher::new(key.clone());
        log::debug!(
            "Encrypting {} ({} bytes, {}) via {} framing",
            file.name,
            file.data.len(),
            file.mime_type,
            method.as_str()
        );

        let ciphertext = match method {
            EncryptionMethod::Text => {
                // Mirrors the browser TextDecoder: lossy, never fails.
                let text = String::from_utf8_lossy(&file.data);
                cipher
                    .encrypt_text(&text)
                    .map_err(|e| with_context(e, "encrypt", &file.name))?
            }
            EncryptionMethod::Binary => cipher
                .encrypt_binary(&file.data)
                .map_err(|e| with_context(e, "encrypt", &file.name))?,
        };

        let mut tagged = metadata;
        tagged.original_mime_type = Some(file.mime_type.clone());
        tagged.encryption_method = Some(method);
        tagged.file_name = Some(file.name.clone());
        tagged.file_size = Some(file.data.len() as u64);
        if tagged.timestamp.is_none() {
            tagged.timestamp = Some(chrono::Utc::now());
        }

        self.store.upload(ciphertext.into_bytes(), &tagged).await
    }

    /// Fetches, sniffs the framing, and decrypts. Returns typed content
    /// plus a MIME type defaulting from the framing when no hint is given.
    ///
    /// Wrong-key detection is approximate: CBC is unauthenticated, so a
    /// wrong key usually fails padding or the empty-plaintext check but can
    /// in principle produce plausible garbage.
    pub async fn download_record(
        &self,
        content_hash: &str,
        key: &RecordKey,
        hinted_mime_type: Option<&str>,
    ) -> Result<DecryptedRecord> {
        let raw = self.store.fetch(content_hash).await?;
        let content = String::from_utf8(raw).map_err(|_| {
            VaultError::FetchError(format!(
                "Stored payload for {} is not a ciphertext string",
                content_hash
            ))
        })?;

        let cipher = RecordCipher::new(key.clone());
        match detect_framing(&content) {
            EncryptionMethod::Text => {
                let text = cipher
                    .decrypt_text(&content)
                    .map_err(|e| with_context(e, "decrypt", content_hash))?;
                Ok(DecryptedRecord {
                    content: RecordContent::Text(text),
                    mime_type: hinted_mime_type.unwrap_or("text/plain").to_string(),
                })
            }
            EncryptionMethod::Binary => {
                let bytes = cipher
                    .decrypt_binary(&content)
                    .map_err(|e| with_context(e, "decrypt", content_hash))?;
                Ok(DecryptedRecord {
                    content: RecordContent::Binary(bytes),
                    mime_type: hinted_mime_type
                        .unwrap_or("application/octet-stream")
                        .to_string(),
                })
            }
        }
    }
}

/// Attaches which record and which operation to a propagated engine error
/// without changing its kind.
fn with_context(err: VaultError, operation: &str, subject: &str) -> VaultError {
    match err {
        VaultError::EncryptionError(msg) => {
            VaultError::EncryptionError(format!("{} {}: {}", operation, subject, msg))
        }
        VaultError::DecryptionError(msg) => {
            VaultError::DecryptionError(format!("{} {}: {}", operation, subject, msg))
        }
        other => other,
    }
}
