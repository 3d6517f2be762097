use std::time::Duration;
use thiserror::Error;

use crate::crypto::error::EncryptionError;
use crate::database::record::RowData;
use crate::database::store::StoreError;
use crate::observer::traits::ObserverRing;

/// Observer system errors with structured error types
#[derive(Debug, Error, Clone)]
pub enum ObserverError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Encryption error: {0}")]
    EncryptionError(String),

    #[error("Timeout error: {0}")]
    TimeoutError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Pipeline execution failed: {0}")]
    PipelineError(String),
}

impl From<StoreError> for ObserverError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::NotFound { .. } => ObserverError::NotFound(error.to_string()),
            other => ObserverError::DatabaseError(other.to_string()),
        }
    }
}

impl From<EncryptionError> for ObserverError {
    fn from(error: EncryptionError) -> Self {
        ObserverError::EncryptionError(error.to_string())
    }
}

/// Observer warnings (non-fatal issues)
#[derive(Debug, Clone)]
pub struct ObserverWarning {
    pub observer: String,
    pub ring: u8,
    pub message: String,
}

impl ObserverWarning {
    pub fn new(observer: &str, ring: ObserverRing, message: String) -> Self {
        Self {
            observer: observer.to_string(),
            ring: ring as u8,
            message,
        }
    }
}

/// Results from observer pipeline execution
#[derive(Debug, Clone)]
pub struct ObserverResult {
    pub success: bool,
    pub result: Vec<RowData>,
    pub errors: Vec<ObserverError>,
    pub warnings: Vec<ObserverWarning>,
    pub execution_time: Duration,
    pub rings_executed: Vec<ObserverRing>,
}

impl ObserverResult {
    /// Stored rows, or the first error collected by any ring
    pub fn into_rows(self) -> Result<Vec<RowData>, ObserverError> {
        match self.errors.into_iter().next() {
            Some(error) => Err(error),
            None => Ok(self.result),
        }
    }
}
