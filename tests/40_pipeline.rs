mod common;

use anyhow::Result;
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

use field_vault::crypto::FieldCipher;
use field_vault::database::{MemoryStore, Record, RecordStore, SensitiveSchema};
use field_vault::observer::{ObserverError, ObserverPipeline, ObserverRing, Operation};

fn user_schema() -> Arc<SensitiveSchema> {
    Arc::new(SensitiveSchema::new(
        "user",
        ["first_name", "last_name", "full_name", "phone_number", "address"],
    ))
}

fn pipeline(store: Arc<MemoryStore>, cipher: Arc<common::CountingCipher>) -> ObserverPipeline {
    ObserverPipeline::with_default_observers(store, cipher)
}

#[tokio::test]
async fn create_runs_every_ring_and_persists_ciphertext() -> Result<()> {
    let store = Arc::new(MemoryStore::new());
    let cipher = Arc::new(common::CountingCipher::new());
    let pipeline = pipeline(store.clone(), cipher.clone());

    let record = Record::from_json(json!({"full_name": "Jane Doe", "email": "jane@example.com"}))?;
    let result = pipeline
        .execute_crud(Operation::Create, user_schema(), vec![record])
        .await?;

    assert!(result.success);
    assert_eq!(result.rings_executed.len(), 7);
    assert_eq!(result.rings_executed.last(), Some(&ObserverRing::PostDatabase));

    let rows = result.into_rows()?;
    assert_eq!(rows.len(), 1);
    let full_name = rows[0]["full_name"].as_str().expect("text");
    assert!(cipher.looks_encrypted(full_name));
    assert_eq!(rows[0]["email"], json!("jane@example.com"));
    assert_eq!(store.len("user").await, 1);
    assert_eq!(cipher.encrypts(), 1);
    Ok(())
}

#[tokio::test]
async fn update_of_missing_record_is_not_found() -> Result<()> {
    let store = Arc::new(MemoryStore::new());
    let pipeline = pipeline(store.clone(), Arc::new(common::CountingCipher::new()));

    let mut record = Record::from_json(json!({"address": "nowhere"}))?;
    record.set_id(Uuid::new_v4());
    let result = pipeline
        .execute_crud(Operation::Update, user_schema(), vec![record])
        .await?;

    assert_eq!(result.rings_executed, vec![ObserverRing::DataPreparation]);
    let error = result.into_rows().unwrap_err();
    assert!(matches!(error, ObserverError::NotFound(_)));
    assert!(store.is_empty("user").await);
    Ok(())
}

#[tokio::test]
async fn validation_failure_stops_before_encryption() -> Result<()> {
    let store = Arc::new(MemoryStore::new());
    let cipher = Arc::new(common::CountingCipher::new());
    let pipeline = pipeline(store.clone(), cipher.clone());

    let record = Record::from_json(json!({"first_name": "Jane", "phone_number": ["+1", "555"]}))?;
    let result = pipeline
        .execute_crud(Operation::Create, user_schema(), vec![record])
        .await?;

    assert!(!result.success);
    assert_eq!(result.rings_executed.last(), Some(&ObserverRing::InputValidation));
    assert_eq!(cipher.encrypts(), 0);
    assert!(store.is_empty("user").await);
    Ok(())
}

#[tokio::test]
async fn update_writes_only_changed_fields() -> Result<()> {
    let store = Arc::new(MemoryStore::new());
    let cipher = Arc::new(common::CountingCipher::new());
    let pipeline = pipeline(store.clone(), cipher.clone());
    let id = Uuid::new_v4();
    let phone = common::codec().encrypt("+1-555-123-4567")?;
    store
        .seed(
            "user",
            [common::row(id, json!({"phone_number": phone.clone(), "first_name": "Jane"}))],
        )
        .await?;

    let mut record = Record::from_json(json!({"first_name": "Janet"}))?;
    record.set_id(id);
    pipeline
        .execute_crud(Operation::Update, user_schema(), vec![record])
        .await?
        .into_rows()?;

    let stored = store.get("user", id).await?.expect("row");
    assert_eq!(stored["phone_number"], json!(phone));
    let first_name = stored["first_name"].as_str().expect("text");
    assert_eq!(common::codec().decrypt(first_name)?, "Janet");
    assert_eq!(cipher.encrypts(), 1);
    Ok(())
}

#[tokio::test]
async fn untouched_legacy_plaintext_raises_a_warning() -> Result<()> {
    let store = Arc::new(MemoryStore::new());
    let pipeline = pipeline(store.clone(), Arc::new(common::CountingCipher::new()));
    let id = Uuid::new_v4();
    store
        .seed(
            "user",
            [common::row(id, json!({"address": "10 Downing St", "email": "old@example.com"}))],
        )
        .await?;

    let mut record = Record::from_json(json!({"email": "new@example.com"}))?;
    record.set_id(id);
    let result = pipeline
        .execute_crud(Operation::Update, user_schema(), vec![record])
        .await?;

    assert!(result.success);
    assert_eq!(result.warnings.len(), 1);
    assert!(result.warnings[0].message.contains("migrate"));
    let stored = store.get("user", id).await?.expect("row");
    assert_eq!(stored["address"], json!("10 Downing St"));
    Ok(())
}
