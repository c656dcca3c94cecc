use thiserror::Error;

pub type Result<T> = std::result::Result<T, VaultError>;

/// Crate-wide error taxonomy. Wrong-key/corrupt-data failures, network
/// failures, and access-control rejections are kept distinct so callers
/// can present different recovery actions for each.
#[derive(Error, Debug)]
pub enum VaultError {
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    #[error("Encryption error: {0}")]
    EncryptionError(String),

    #[error("Decryption error: {0}")]
    DecryptionError(String),

    #[error("Upload error: {0}")]
    UploadError(String),

    #[error("Fetch error: {0}")]
    FetchError(String),

    #[error("Ledger call error: {0}")]
    LedgerCallError(String),

    #[error("Access not granted: {0}")]
    PermissionDenied(String),
}
