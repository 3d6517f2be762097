use serde_json::Value;
use std::sync::Arc;
use uuid::Uuid;

use crate::crypto::codec::FieldCipher;
use crate::database::record::{Record, RecordError};
use crate::database::schema::{SchemaRegistry, SensitiveSchema};
use crate::database::store::{RecordStore, StoreError};
use crate::encryption::EncryptedRecord;
use crate::observer::error::ObserverError;
use crate::observer::pipeline::ObserverPipeline;
use crate::observer::traits::Operation;

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Unknown record type: {0}")]
    UnknownSchema(String),
    #[error("Record {id} not found in {schema}")]
    NotFound { schema: String, id: Uuid },
    #[error(transparent)]
    Record(#[from] RecordError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Observer(#[from] ObserverError),
}

/// Loads and saves records of declared types, routing every save through the
/// observer pipeline so sensitive fields are encrypted before they are stored.
pub struct VaultService {
    store: Arc<dyn RecordStore>,
    cipher: Arc<dyn FieldCipher>,
    schemas: Arc<SchemaRegistry>,
    pipeline: ObserverPipeline,
}

impl VaultService {
    pub fn new(store: Arc<dyn RecordStore>, cipher: Arc<dyn FieldCipher>, schemas: SchemaRegistry) -> Self {
        let pipeline = ObserverPipeline::with_default_observers(store.clone(), cipher.clone());
        Self {
            store,
            cipher,
            schemas: Arc::new(schemas),
            pipeline,
        }
    }

    pub fn store(&self) -> &Arc<dyn RecordStore> {
        &self.store
    }

    pub fn cipher(&self) -> &Arc<dyn FieldCipher> {
        &self.cipher
    }

    pub fn schemas(&self) -> &SchemaRegistry {
        &self.schemas
    }

    pub fn schema(&self, name: &str) -> Result<Arc<SensitiveSchema>, ServiceError> {
        self.schemas
            .get(name)
            .ok_or_else(|| ServiceError::UnknownSchema(name.to_string()))
    }

    fn wrap(&self, schema: Arc<SensitiveSchema>, record: Record) -> EncryptedRecord {
        EncryptedRecord::new(record, schema, self.cipher.clone())
    }

    /// Empty, unsaved record of the given type
    pub fn new_record(&self, schema: &str) -> Result<EncryptedRecord, ServiceError> {
        Ok(self.wrap(self.schema(schema)?, Record::new()))
    }

    pub async fn load(&self, schema: &str, id: Uuid) -> Result<EncryptedRecord, ServiceError> {
        let sensitive = self.schema(schema)?;
        let row = self
            .store
            .get(schema, id)
            .await?
            .ok_or_else(|| ServiceError::NotFound {
                schema: schema.to_string(),
                id,
            })?;
        Ok(self.wrap(sensitive, Record::from_sql_data(row)))
    }

    /// Records ordered by id, strictly after `after`
    pub async fn page(
        &self,
        schema: &str,
        after: Option<Uuid>,
        limit: usize,
    ) -> Result<Vec<EncryptedRecord>, ServiceError> {
        let sensitive = self.schema(schema)?;
        let rows = self.store.page(schema, after, limit).await?;
        Ok(rows
            .into_iter()
            .map(|row| self.wrap(sensitive.clone(), Record::from_sql_data(row)))
            .collect())
    }

    /// Persist pending changes, then reload the record from the stored row.
    ///
    /// On error the in-memory record is left untouched.
    pub async fn save(&self, record: &mut EncryptedRecord) -> Result<(), ServiceError> {
        let operation = if record.record().original().is_some() {
            Operation::Update
        } else {
            Operation::Create
        };
        let schema = self.schema(record.schema().name())?;

        let result = self
            .pipeline
            .execute_crud(operation, schema, vec![record.record().clone()])
            .await?;
        let stored = result
            .into_rows()?
            .into_iter()
            .next()
            .ok_or_else(|| ObserverError::PipelineError("Save produced no stored row".to_string()))?;

        record.refresh(stored);
        Ok(())
    }

    /// Create a record from API input
    pub async fn create(&self, schema: &str, input: Value) -> Result<EncryptedRecord, ServiceError> {
        let sensitive = self.schema(schema)?;
        let mut record = self.wrap(sensitive, Record::from_json(input)?);
        self.save(&mut record).await?;
        Ok(record)
    }

    /// Apply API input to a stored record; the loader ring supplies the original row
    pub async fn update(&self, schema: &str, id: Uuid, input: Value) -> Result<EncryptedRecord, ServiceError> {
        let sensitive = self.schema(schema)?;
        let mut changes = Record::from_json(input)?;
        changes.set_id(id);

        let result = self
            .pipeline
            .execute_crud(Operation::Update, sensitive.clone(), vec![changes])
            .await?;
        let stored = result
            .into_rows()?
            .into_iter()
            .next()
            .ok_or_else(|| ObserverError::PipelineError("Update produced no stored row".to_string()))?;

        Ok(self.wrap(sensitive, Record::from_sql_data(stored)))
    }
}
