// Ring 5: Store Executor - persists records through the RecordStore
use async_trait::async_trait;
use std::sync::Arc;
use uuid::Uuid;

use crate::database::record::Record;
use crate::database::store::RecordStore;
use crate::observer::context::ObserverContext;
use crate::observer::error::ObserverError;
use crate::observer::traits::{DatabaseObserver, Observer, ObserverRing, Operation};

pub struct StoreExecutor {
    store: Arc<dyn RecordStore>,
}

impl StoreExecutor {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }
}

impl Observer for StoreExecutor {
    fn name(&self) -> &'static str {
        "StoreExecutor"
    }

    fn ring(&self) -> ObserverRing {
        ObserverRing::Database
    }

    fn applies_to_operation(&self, op: Operation) -> bool {
        matches!(op, Operation::Create | Operation::Update)
    }

    fn timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(30)
    }
}

#[async_trait]
impl DatabaseObserver for StoreExecutor {
    async fn execute(&self, ctx: &mut ObserverContext) -> Result<(), ObserverError> {
        if ctx.records.is_empty() {
            tracing::debug!("No records to persist for {:?}", ctx.operation);
            return Ok(());
        }

        let schema = ctx.schema.clone();
        let mut results = Vec::with_capacity(ctx.records.len());

        for record in ctx.records.iter_mut() {
            let stored = match ctx.operation {
                Operation::Create => self.insert(schema.name(), record).await,
                Operation::Update => self.update(schema.name(), record).await,
            };

            match stored {
                Ok(row) => results.push(row),
                Err(error) => {
                    tracing::error!("{:?} failed for {} record {:?}: {}", ctx.operation, schema.name(), record.id(), error);
                    ctx.errors.push(error);
                }
            }
        }

        tracing::info!("{:?} persisted {}/{} {} records", ctx.operation, results.len(), ctx.records.len(), schema.name());
        ctx.result = Some(results);
        Ok(())
    }
}

impl StoreExecutor {
    async fn insert(&self, schema: &str, record: &mut Record) -> Result<crate::database::RowData, ObserverError> {
        if record.id().is_none() {
            record.set_id(Uuid::new_v4());
        }
        Ok(self.store.insert(schema, record.to_hashmap()).await?)
    }

    async fn update(&self, schema: &str, record: &Record) -> Result<crate::database::RowData, ObserverError> {
        let id = record
            .id()
            .ok_or_else(|| ObserverError::ValidationError("Record missing ID for update".to_string()))?;
        Ok(self.store.update(schema, id, record.changed_fields()).await?)
    }
}
