use std::sync::Arc;
use std::time::Instant;

use crate::database::record::{Record, RowData};
use crate::database::schema::SensitiveSchema;
use crate::observer::error::{ObserverError, ObserverWarning};
use crate::observer::traits::{ObserverRing, Operation};

/// State that flows through the observer pipeline for one save
#[derive(Debug)]
pub struct ObserverContext {
    pub operation: Operation,
    pub schema: Arc<SensitiveSchema>,

    pub records: Vec<Record>,

    // Stored rows, populated by Ring 5
    pub result: Option<Vec<RowData>>,

    pub start_time: Instant,
    pub current_ring: Option<ObserverRing>,

    pub errors: Vec<ObserverError>,
    pub warnings: Vec<ObserverWarning>,
}

impl ObserverContext {
    pub fn new(operation: Operation, schema: Arc<SensitiveSchema>, records: Vec<Record>) -> Self {
        Self {
            operation,
            schema,
            records,
            result: None,
            start_time: Instant::now(),
            current_ring: None,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub fn schema_name(&self) -> &str {
        self.schema.name()
    }

    pub fn add_error(&mut self, error: ObserverError) {
        self.errors.push(error);
    }

    pub fn add_warning(&mut self, warning: ObserverWarning) {
        self.warnings.push(warning);
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn execution_time(&self) -> std::time::Duration {
        self.start_time.elapsed()
    }
}
