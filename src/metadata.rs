use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// How a record payload was encrypted. Fixed per record at upload time and
/// recorded in the upload metadata so viewers can pick the decode path even
/// without sniffing the ciphertext.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EncryptionMethod {
    Text,
    Binary,
}

impl EncryptionMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            EncryptionMethod::Text => "text",
            EncryptionMethod::Binary => "binary",
        }
    }
}

/// Key-value tags attached to an upload. Stored plaintext by the pinning
/// service, so nothing confidential may go in here.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecordMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_mime_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encryption_method: Option<EncryptionMethod>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub patient_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_size: Option<u64>,
    /// Open-ended extension tags for forward compatibility.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, String>,
}

impl RecordMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_description(description: impl Into<String>) -> Self {
        Self {
            description: Some(description.into()),
            ..Self::default()
        }
    }

    /// Flattens the recognized fields and extension tags into the flat
    /// string map the pinning service expects as `keyvalues`.
    pub fn keyvalues(&self) -> BTreeMap<String, String> {
        let mut kv = self.extra.clone();
        if let Some(v) = &self.original_mime_type {
            kv.insert("originalMimeType".to_string(), v.clone());
        }
        if let Some(v) = &self.encryption_method {
            kv.insert("encryptionMethod".to_string(), v.as_str().to_string());
        }
        if let Some(v) = &self.patient_id {
            kv.insert("patientId".to_string(), v.clone());
        }
        if let Some(v) = &self.report_type {
            kv.insert("reportType".to_string(), v.clone());
        }
        if let Some(v) = &self.description {
            kv.insert("description".to_string(), v.clone());
        }
        if let Some(v) = &self.timestamp {
            kv.insert("timestamp".to_string(), v.to_rfc3339());
        }
        if let Some(v) = &self.file_name {
            kv.insert("fileName".to_string(), v.clone());
        }
        if let Some(v) = &self.file_size {
            kv.insert("fileSize".to_string(), v.to_string());
        }
        kv
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyvalues_includes_recognized_fields() {
        let mut meta = RecordMetadata::with_description("blood panel");
        meta.original_mime_type = Some("image/png".to_string());
        meta.encryption_method = Some(EncryptionMethod::Binary);
        meta.extra.insert("clinic".to_string(), "north".to_string());

        let kv = meta.keyvalues();
        assert_eq!(kv.get("originalMimeType").unwrap(), "image/png");
        assert_eq!(kv.get("encryptionMethod").unwrap(), "binary");
        assert_eq!(kv.get("description").unwrap(), "blood panel");
        assert_eq!(kv.get("clinic").unwrap(), "north");
        assert!(!kv.contains_key("patientId"));
    }
}
