use medlink_vault::{
    detect_framing, ContentStore, EncryptionMethod, MemoryLedger, MemoryStore, RecordFile,
    RecordKey, RecordMetadata, RecordPipeline, VaultError, VaultSession,
};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[tokio::test]
async fn test_binary_upload_download_roundtrip() {
    init_logging();
    let store = MemoryStore::new();
    let pipeline = RecordPipeline::new(store);
    let key = RecordKey::derive("shortkey");
    assert_eq!(key.as_bytes().len(), 32);

    let original = vec![0x00, 0xff, 0x41, 0x42, 0x10];
    let file = RecordFile::new("scan.png", "image/png", original.clone());

    let hash = pipeline
        .upload_record(&file, &key, RecordMetadata::new())
        .await
        .unwrap();
    assert_eq!(pipeline.store().upload_count(), 1);

    // The stored payload is the base64 binary framing: IV plus at least
    // one padded block.
    let stored = pipeline.store().fetch(&hash).await.unwrap();
    let stored_text = String::from_utf8(stored).unwrap();
    let decoded = base64::decode(&stored_text).unwrap();
    assert!(decoded.len() >= 21);

    let record = pipeline.download_record(&hash, &key, None).await.unwrap();
    assert!(record.is_binary());
    assert_eq!(record.as_bytes(), original.as_slice());
    assert_eq!(record.mime_type, "application/octet-stream");
}

#[tokio::test]
async fn test_text_upload_download_roundtrip() {
    init_logging();
    let pipeline = RecordPipeline::new(MemoryStore::new());
    let key = RecordKey::derive("abcdefghijklmnopqrstuvwxyz012345");

    let json = r#"{"bp":"120/80"}"#;
    let file = RecordFile::new("vitals.json", "application/json", json.as_bytes().to_vec());

    let hash = pipeline
        .upload_record(&file, &key, RecordMetadata::new())
        .await
        .unwrap();

    let stored = pipeline.store().fetch(&hash).await.unwrap();
    let stored_text = String::from_utf8(stored).unwrap();
    assert!(stored_text.starts_with("Salted__"));
    assert_eq!(detect_framing(&stored_text), EncryptionMethod::Text);

    let record = pipeline.download_record(&hash, &key, None).await.unwrap();
    assert!(!record.is_binary());
    assert_eq!(record.as_bytes(), json.as_bytes());
    assert_eq!(record.mime_type, "text/plain");
}

#[tokio::test]
async fn test_mime_hint_overrides_default() {
    init_logging();
    let pipeline = RecordPipeline::new(MemoryStore::new());
    let key = RecordKey::derive("k");
    let file = RecordFile::new("scan.png", "image/png", vec![1, 2, 3]);
    let hash = pipeline
        .upload_record(&file, &key, RecordMetadata::new())
        .await
        .unwrap();

    let record = pipeline
        .download_record(&hash, &key, Some("image/png"))
        .await
        .unwrap();
    assert_eq!(record.mime_type, "image/png");
}

#[tokio::test]
async fn test_upload_tags_carry_method_and_mime() {
    init_logging();
    let pipeline = RecordPipeline::new(MemoryStore::new());
    let key = RecordKey::derive("k");
    let file = RecordFile::new("scan.png", "image/png", vec![9, 9, 9]);
    let hash = pipeline
        .upload_record(&file, &key, RecordMetadata::with_description("x-ray"))
        .await
        .unwrap();

    let tags = pipeline.store().metadata_for(&hash).unwrap().keyvalues();
    assert_eq!(tags.get("originalMimeType").unwrap(), "image/png");
    assert_eq!(tags.get("encryptionMethod").unwrap(), "binary");
    assert_eq!(tags.get("fileName").unwrap(), "scan.png");
    assert_eq!(tags.get("fileSize").unwrap(), "3");
    assert_eq!(tags.get("description").unwrap(), "x-ray");
    assert!(tags.contains_key("timestamp"));
}

#[tokio::test]
async fn test_wrong_key_download_is_rejected() {
    init_logging();
    let pipeline = RecordPipeline::new(MemoryStore::new());
    let key = RecordKey::derive("right-key");
    let file = RecordFile::new("note.txt", "text/plain", b"private note".to_vec());
    let hash = pipeline
        .upload_record(&file, &key, RecordMetadata::new())
        .await
        .unwrap();

    let wrong = RecordKey::derive("wrong-key");
    match pipeline.download_record(&hash, &wrong, None).await {
        Err(VaultError::DecryptionError(msg)) => {
            assert!(msg.contains(&hash), "context missing from: {}", msg)
        }
        other => panic!("expected DecryptionError, got {:?}", other.map(|r| r.mime_type)),
    }
}

#[tokio::test]
async fn test_download_unknown_hash_is_fetch_error() {
    init_logging();
    let pipeline = RecordPipeline::new(MemoryStore::new());
    let key = RecordKey::derive("k");
    assert!(matches!(
        pipeline.download_record("QmNope", &key, None).await,
        Err(VaultError::FetchError(_))
    ));
}

#[tokio::test]
async fn test_session_upload_registers_on_ledger() {
    init_logging();
    let ledger = MemoryLedger::new();
    let session = VaultSession::new("0xpatient", MemoryStore::new(), ledger.clone());
    let key = RecordKey::derive("patient-key");

    let file = RecordFile::new("vitals.json", "application/json", b"{\"hr\":62}".to_vec());
    let (hash, receipt) = session
        .upload_report(&file, &key, RecordMetadata::new())
        .await
        .unwrap();
    assert!(receipt.block > 0);

    let reports = session.my_reports().await.unwrap();
    assert_eq!(reports, vec![hash.clone()]);

    let record = session.download_report(&hash, &key, None).await.unwrap();
    assert_eq!(record.as_bytes(), b"{\"hr\":62}");
}

#[tokio::test]
async fn test_doctor_needs_grant_to_list_patient_reports() {
    init_logging();
    let ledger = MemoryLedger::new();
    let patient = VaultSession::new("0xpatient", MemoryStore::new(), ledger.clone());
    let doctor = VaultSession::new("0xdoctor", MemoryStore::new(), ledger.clone());
    let key = RecordKey::derive("patient-key");

    let file = RecordFile::new("note.txt", "text/plain", b"history".to_vec());
    patient
        .upload_report(&file, &key, RecordMetadata::new())
        .await
        .unwrap();

    // Not granted yet: distinct from a generic ledger failure so a UI can
    // prompt for an access request.
    assert!(matches!(
        doctor.patient_reports("0xpatient").await,
        Err(VaultError::PermissionDenied(_))
    ));

    doctor.request_access("0xpatient").await.unwrap();
    patient.respond_to_access("0xdoctor", true).await.unwrap();

    let reports = doctor.patient_reports("0xpatient").await.unwrap();
    assert_eq!(reports.len(), 1);
}

#[tokio::test]
async fn test_session_subscription_sees_own_events() {
    init_logging();
    let ledger = MemoryLedger::new();
    let patient = VaultSession::new("0xpatient", MemoryStore::new(), ledger.clone());
    let key = RecordKey::derive("patient-key");

    let mut sub = patient.subscribe();

    let file = RecordFile::new("note.txt", "text/plain", b"entry".to_vec());
    let (hash, _) = patient
        .upload_report(&file, &key, RecordMetadata::new())
        .await
        .unwrap();

    match sub.next().await {
        Some(medlink_vault::LedgerEvent::ReportUploaded {
            user, content_hash, ..
        }) => {
            assert_eq!(user, "0xpatient");
            assert_eq!(content_hash, hash);
        }
        other => panic!("expected ReportUploaded, got {:?}", other),
    }
    sub.unsubscribe();
}
