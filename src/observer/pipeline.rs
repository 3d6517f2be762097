use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::time::timeout;

use crate::database::record::Record;
use crate::database::schema::SensitiveSchema;
use crate::observer::context::ObserverContext;
use crate::observer::error::{ObserverError, ObserverResult};
use crate::observer::traits::{ObserverBox, ObserverRing, Operation};

/// Runs registered observers ring by ring for each save
pub struct ObserverPipeline {
    observers: HashMap<ObserverRing, Vec<ObserverBox>>,
}

impl ObserverPipeline {
    /// Create new observer pipeline with empty observer registry
    pub fn new() -> Self {
        Self {
            observers: HashMap::new(),
        }
    }

    pub fn register_observer(&mut self, observer: ObserverBox) {
        let ring = observer.ring();
        let name = observer.name();
        self.observers.entry(ring).or_default().push(observer);

        tracing::debug!("Registered observer '{}' for ring {:?}", name, ring);
    }

    pub fn observer_count(&self) -> usize {
        self.observers.values().map(Vec::len).sum()
    }

    /// Execute the pipeline for a create or update.
    ///
    /// Errors raised before ring 5 stop the pipeline, so nothing is persisted.
    pub async fn execute_crud(
        &self,
        operation: Operation,
        schema: Arc<SensitiveSchema>,
        records: Vec<Record>,
    ) -> Result<ObserverResult, ObserverError> {
        let mut ctx = ObserverContext::new(operation, schema, records);
        let relevant_rings = ObserverRing::for_operation(&operation);
        let mut rings_executed = Vec::with_capacity(relevant_rings.len());

        tracing::info!(
            "Observer pipeline starting: operation={:?}, schema={}, records={}",
            ctx.operation,
            ctx.schema_name(),
            ctx.records.len()
        );

        for ring in relevant_rings {
            ctx.current_ring = Some(ring);
            rings_executed.push(ring);

            let should_continue = self.execute_ring(ring, &mut ctx).await?;
            if !should_continue {
                tracing::warn!("Observer pipeline stopped at ring {:?} due to errors", ring);
                break;
            }
        }

        Ok(ObserverResult {
            success: ctx.errors.is_empty(),
            execution_time: ctx.execution_time(),
            result: ctx.result.unwrap_or_default(),
            errors: ctx.errors,
            warnings: ctx.warnings,
            rings_executed,
        })
    }

    /// Execute observers in a specific ring
    async fn execute_ring(&self, ring: ObserverRing, ctx: &mut ObserverContext) -> Result<bool, ObserverError> {
        let observers = match self.observers.get(&ring) {
            Some(obs) => obs,
            None => {
                tracing::trace!("No observers registered for ring {:?}", ring);
                return Ok(true);
            }
        };

        for observer in observers {
            if !observer.applies_to_operation(ctx.operation) {
                tracing::trace!(
                    "Observer {} skipped - doesn't apply to operation {:?}",
                    observer.name(),
                    ctx.operation
                );
                continue;
            }

            if !observer.applies_to_schema(ctx.schema_name()) {
                tracing::trace!(
                    "Observer {} skipped - doesn't apply to schema {}",
                    observer.name(),
                    ctx.schema_name()
                );
                continue;
            }

            let observer_start = Instant::now();
            let result = timeout(observer.timeout(), observer.execute(ctx)).await;
            let execution_time = observer_start.elapsed();

            match result {
                Ok(Ok(_)) => {
                    tracing::debug!(
                        "Observer: {} completed successfully in {:?}",
                        observer.name(),
                        execution_time
                    );
                }
                Ok(Err(error)) => {
                    tracing::warn!("Observer: {} failed in {:?}: {}", observer.name(), execution_time, error);
                    ctx.errors.push(error);
                }
                Err(_timeout) => {
                    tracing::error!("Observer: {} timed out after {:?}", observer.name(), observer.timeout());
                    ctx.errors.push(ObserverError::TimeoutError(format!(
                        "Observer {} timed out after {:?}",
                        observer.name(),
                        observer.timeout()
                    )));
                }
            }
        }

        if ctx.has_errors() && ring.is_pre_database() {
            return Ok(false);
        }

        Ok(true)
    }
}

impl Default for ObserverPipeline {
    fn default() -> Self {
        Self::new()
    }
}
