//! Offline scan, repair and migration of stored sensitive values.
//!
//! Meant for maintenance windows: every write re-reads the stored value and
//! uses a compare-and-set, but the passes are not coordinated with live traffic
//! beyond that.

pub mod fix;
pub mod migrate;
pub mod scan;

pub use fix::{peel_layers, Peeled, RepairOutcome, RepairStats, RepairSummary, Repairer};
pub use migrate::{MigrationStats, Migrator};
pub use scan::{classify, classify_row, AnomalyKind, FieldReport, Scanner};

use thiserror::Error;

use crate::crypto::error::{DecryptionError, EncryptionError};
use crate::database::store::StoreError;

#[derive(Debug, Error)]
pub enum RepairError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Decryption(#[from] DecryptionError),

    #[error(transparent)]
    Encryption(#[from] EncryptionError),
}
