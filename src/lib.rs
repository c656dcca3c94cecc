//! Encrypted medical-record storage pipeline with ledger-backed consent.
//!
//! Records are encrypted client-side (AES-256-CBC, text or IV-prefixed
//! binary framing), pinned to a content-addressed store, and registered on
//! a consent ledger that tracks doctor/patient permission grants with
//! block-indexed events. The symmetric key never leaves the local session.

pub mod config;
pub mod encryption;
pub mod error;
pub mod ledger;
pub mod metadata;
pub mod pipeline;
pub mod session;
pub mod store;

pub use config::VaultConfig;
pub use encryption::{detect_framing, RecordCipher, RecordKey, WordArray};
pub use error::{Result, VaultError};
pub use ledger::{
    query_grant_state, ConsentLedger, EventFilter, EventKind, EventSubscription, GrantState,
    Identity, LedgerEvent, MemoryLedger, TxReceipt, EVENT_WINDOW_BLOCKS,
};
pub use metadata::{EncryptionMethod, RecordMetadata};
pub use pipeline::{DecryptedRecord, RecordContent, RecordFile, RecordPipeline};
pub use session::VaultSession;
pub use store::{ContentStore, MemoryStore, PinataStore};
