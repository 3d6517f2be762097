use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::observer::context::ObserverContext;
use crate::observer::error::ObserverError;

/// Observer rings with semantic meaning, executed in ascending order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum ObserverRing {
    DataPreparation = 0, // Load stored rows for updates
    InputValidation = 1, // Field type checks
    Security = 2,        // Access control
    Business = 3,        // Domain rules
    Enrichment = 4,      // Field transforms, including encryption
    Database = 5,        // Store execution
    PostDatabase = 6,    // Immediate processing after persistence
}

impl ObserverRing {
    /// Rings that can abort the save before anything is persisted
    pub fn is_pre_database(&self) -> bool {
        (*self as u8) < (ObserverRing::Database as u8)
    }

    /// Get all rings for an operation type
    pub fn for_operation(operation: &Operation) -> Vec<Self> {
        use ObserverRing::*;

        match operation {
            Operation::Create | Operation::Update => vec![
                DataPreparation,
                InputValidation,
                Security,
                Business,
                Enrichment,
                Database,
                PostDatabase,
            ],
        }
    }
}

/// Write operations that flow through the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operation {
    Create,
    Update,
}

/// Base trait for all observers with metadata and applicability checks
pub trait Observer: Send + Sync {
    /// Observer name for logging and debugging
    fn name(&self) -> &'static str;

    /// Which ring this observer belongs to
    fn ring(&self) -> ObserverRing;

    /// Check if observer applies to this operation
    fn applies_to_operation(&self, op: Operation) -> bool;

    /// Check if observer applies to this record type
    fn applies_to_schema(&self, _schema: &str) -> bool {
        true
    }

    /// Execution timeout (default 5 seconds)
    fn timeout(&self) -> Duration {
        Duration::from_secs(5)
    }
}

/// Ring 0: Data Preparation - load stored rows so change tracking works
#[async_trait]
pub trait DataPreparationObserver: Observer {
    async fn execute(&self, ctx: &mut ObserverContext) -> Result<(), ObserverError>;
}

/// Ring 1: Input Validation - reject values the later rings cannot handle
#[async_trait]
pub trait InputValidationObserver: Observer {
    async fn execute(&self, ctx: &mut ObserverContext) -> Result<(), ObserverError>;
}

/// Ring 4: Enrichment - transform field values before persistence
#[async_trait]
pub trait EnrichmentObserver: Observer {
    async fn execute(&self, ctx: &mut ObserverContext) -> Result<(), ObserverError>;
}

/// Ring 5: Database - hand rows to the record store
#[async_trait]
pub trait DatabaseObserver: Observer {
    async fn execute(&self, ctx: &mut ObserverContext) -> Result<(), ObserverError>;
}

/// Concrete observer types for dynamic dispatch
pub enum ObserverBox {
    DataPreparation(Box<dyn DataPreparationObserver>),
    InputValidation(Box<dyn InputValidationObserver>),
    Enrichment(Box<dyn EnrichmentObserver>),
    Database(Box<dyn DatabaseObserver>),
}

impl ObserverBox {
    pub fn name(&self) -> &'static str {
        match self {
            ObserverBox::DataPreparation(o) => o.name(),
            ObserverBox::InputValidation(o) => o.name(),
            ObserverBox::Enrichment(o) => o.name(),
            ObserverBox::Database(o) => o.name(),
        }
    }

    pub fn ring(&self) -> ObserverRing {
        match self {
            ObserverBox::DataPreparation(o) => o.ring(),
            ObserverBox::InputValidation(o) => o.ring(),
            ObserverBox::Enrichment(o) => o.ring(),
            ObserverBox::Database(o) => o.ring(),
        }
    }

    pub fn applies_to_operation(&self, op: Operation) -> bool {
        match self {
            ObserverBox::DataPreparation(o) => o.applies_to_operation(op),
            ObserverBox::InputValidation(o) => o.applies_to_operation(op),
            ObserverBox::Enrichment(o) => o.applies_to_operation(op),
            ObserverBox::Database(o) => o.applies_to_operation(op),
        }
    }

    pub fn applies_to_schema(&self, schema: &str) -> bool {
        match self {
            ObserverBox::DataPreparation(o) => o.applies_to_schema(schema),
            ObserverBox::InputValidation(o) => o.applies_to_schema(schema),
            ObserverBox::Enrichment(o) => o.applies_to_schema(schema),
            ObserverBox::Database(o) => o.applies_to_schema(schema),
        }
    }

    pub fn timeout(&self) -> Duration {
        match self {
            ObserverBox::DataPreparation(o) => o.timeout(),
            ObserverBox::InputValidation(o) => o.timeout(),
            ObserverBox::Enrichment(o) => o.timeout(),
            ObserverBox::Database(o) => o.timeout(),
        }
    }

    pub async fn execute(&self, ctx: &mut ObserverContext) -> Result<(), ObserverError> {
        match self {
            ObserverBox::DataPreparation(o) => o.execute(ctx).await,
            ObserverBox::InputValidation(o) => o.execute(ctx).await,
            ObserverBox::Enrichment(o) => o.execute(ctx).await,
            ObserverBox::Database(o) => o.execute(ctx).await,
        }
    }
}
