// Ring 0: Record Loader - injects stored rows into update records
use async_trait::async_trait;
use std::sync::Arc;

use crate::database::store::RecordStore;
use crate::observer::context::ObserverContext;
use crate::observer::error::ObserverError;
use crate::observer::traits::{DataPreparationObserver, Observer, ObserverRing, Operation};

/// Loads the stored row for each update record that arrived without one, so
/// later rings can see which fields actually changed.
pub struct RecordLoader {
    store: Arc<dyn RecordStore>,
}

impl RecordLoader {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }
}

impl Observer for RecordLoader {
    fn name(&self) -> &'static str {
        "RecordLoader"
    }

    fn ring(&self) -> ObserverRing {
        ObserverRing::DataPreparation
    }

    fn applies_to_operation(&self, op: Operation) -> bool {
        matches!(op, Operation::Update)
    }
}

#[async_trait]
impl DataPreparationObserver for RecordLoader {
    async fn execute(&self, ctx: &mut ObserverContext) -> Result<(), ObserverError> {
        let needs_preparation = ctx.records.iter().any(|record| record.original().is_none());
        if !needs_preparation {
            tracing::debug!("UPDATE records already have original data loaded, skipping data preparation");
            return Ok(());
        }

        let schema = ctx.schema.clone();
        let mut loaded = 0;

        for record in ctx.records.iter_mut().filter(|r| r.original().is_none()) {
            let Some(id) = record.id() else {
                return Err(ObserverError::ValidationError(
                    "UPDATE operations require record IDs".to_string(),
                ));
            };

            match self.store.get(schema.name(), id).await? {
                Some(existing) => {
                    record.inject(existing);
                    loaded += 1;
                }
                None => {
                    return Err(ObserverError::NotFound(format!(
                        "Record {} not found in {} for update",
                        id,
                        schema.name()
                    )));
                }
            }
        }

        tracing::info!("UPDATE data preparation loaded {} records from {}", loaded, schema.name());
        Ok(())
    }
}
