// Observer implementations organized by rings

// Ring 0: Data Preparation - load stored rows for updates
#[path = "0/record_loader.rs"]
pub mod record_loader;

// Ring 1: Input Validation - sensitive fields must be text
#[path = "1/sensitive_field_validator.rs"]
pub mod sensitive_field_validator;

// Ring 4: Enrichment - encrypt sensitive fields
#[path = "4/field_encryptor.rs"]
pub mod field_encryptor;

// Ring 5: Database - persist through the record store
#[path = "5/store_executor.rs"]
pub mod store_executor;

// Helper for registering observers (not ring-specific)
pub mod defaults;
pub use defaults::*;

pub use field_encryptor::*;
pub use record_loader::*;
pub use sensitive_field_validator::*;
pub use store_executor::*;
