//! Per-login session tying an identity to its store and ledger handles.
//!
//! Constructed once after login and passed explicitly; there is no ambient
//! singleton to look up. The symmetric key is taken per call and never
//! stored here, so it cannot outlive the operation that needed it.

use crate::encryption::RecordKey;
use crate::error::{Result, VaultError};
use crate::ledger::{
    query_grant_state, ConsentLedger, EventFilter, EventSubscription, GrantState, Identity,
    TxReceipt,
};
use crate::metadata::RecordMetadata;
use crate::pipeline::{DecryptedRecord, RecordFile, RecordPipeline};
use crate::store::ContentStore;

pub struct VaultSession<S: ContentStore, L: ConsentLedger> {
    identity: Identity,
    pipeline: RecordPipeline<S>,
    ledger: L,
}

impl<S: ContentStore, L: ConsentLedger> VaultSession<S, L> {
    pub fn new(identity: impl Into<Identity>, store: S, ledger: L) -> Self {
        Self {
            identity: identity.into(),
            pipeline: RecordPipeline::new(store),
            ledger,
        }
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    pub fn pipeline(&self) -> &RecordPipeline<S> {
        &self.pipeline
    }

    /// Encrypts and pins a file, then registers the resulting content hash
    /// against this session's identity. Returns the hash and the ledger
    /// receipt.
    pub async fn upload_report(
        &self,
        file: &RecordFile,
        key: &RecordKey,
        mut metadata: RecordMetadata,
    ) -> Result<(String, TxReceipt)> {
        if metadata.patient_id.is_none() {
            metadata.patient_id = Some(self.identity.clone());
        }
        let content_hash = self.pipeline.upload_record(file, key, metadata).await?;
        let receipt = self
            .ledger
            .upload_report(&self.identity, &content_hash)
            .await?;
        Ok((content_hash, receipt))
    }

    pub async fn download_report(
        &self,
        content_hash: &str,
        key: &RecordKey,
        hinted_mime_type: Option<&str>,
    ) -> Result<DecryptedRecord> {
        self.pipeline
            .download_record(content_hash, key, hinted_mime_type)
            .await
    }

    /// This identity's own report hashes, insertion order.
    pub async fn my_reports(&self) -> Result<Vec<String>> {
        self.ledger.get_reports(&self.identity).await
    }

    /// Another patient's report hashes, gated on a current grant (or an
    /// emergency unlock). The grant flag is re-queried from the ledger on
    /// every call rather than cached.
    pub async fn patient_reports(&self, patient: &str) -> Result<Vec<String>> {
        let permitted = self
            .ledger
            .doctor_permissions(patient, &self.identity)
            .await?
            || self.ledger.is_unlocked(patient).await?;
        if !permitted {
            return Err(VaultError::PermissionDenied(format!(
                "{} has not granted access to {}",
                patient, self.identity
            )));
        }
        self.ledger.get_reports(patient).await
    }

    /// Doctor-side: ask a patient for access.
    pub async fn request_access(&self, patient: &str) -> Result<TxReceipt> {
        self.ledger.request_access(&self.identity, patient).await
    }

    /// Patient-side: answer a doctor's request (or revoke a grant).
    pub async fn respond_to_access(&self, doctor: &str, grant: bool) -> Result<TxReceipt> {
        self.ledger
            .approve_access(&self.identity, doctor, grant)
            .await
    }

    pub async fn grant_state(&self, patient: &str, doctor: &str) -> Result<GrantState> {
        query_grant_state(&self.ledger, patient, doctor).await
    }

    /// Live events touching this session's identity. Callers must
    /// `unsubscribe` on session teardown.
    pub fn subscribe(&self) -> EventSubscription {
        self.ledger
            .subscribe(EventFilter::for_identity(self.identity.clone()))
    }
}
