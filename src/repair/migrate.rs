use futures::TryStreamExt;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use uuid::Uuid;

use crate::crypto::codec::FieldCipher;
use crate::database::schema::SensitiveSchema;
use crate::database::store::{RecordStore, StoreError};
use crate::repair::scan::{AnomalyKind, Scanner};
use crate::repair::RepairError;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MigrationStats {
    pub records_processed: usize,
    pub fields_processed: usize,
    pub encrypted: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Encrypts legacy plaintext values left over from before encryption was enabled
pub struct Migrator {
    store: Arc<dyn RecordStore>,
    cipher: Arc<dyn FieldCipher>,
    batch_size: usize,
}

impl Migrator {
    pub fn new(store: Arc<dyn RecordStore>, cipher: Arc<dyn FieldCipher>, batch_size: usize) -> Self {
        Self { store, cipher, batch_size }
    }

    pub async fn migrate(
        &self,
        schema: Arc<SensitiveSchema>,
        after: Option<Uuid>,
        dry_run: bool,
    ) -> Result<MigrationStats, RepairError> {
        let scanner = Scanner::new(self.store.clone(), self.cipher.clone(), self.batch_size);
        let mut reports = scanner.scan(schema.clone(), after);
        let mut stats = MigrationStats::default();
        let mut last_record_id = None;

        while let Some(report) = reports.try_next().await? {
            if last_record_id != Some(report.record_id) {
                stats.records_processed += 1;
                last_record_id = Some(report.record_id);
            }
            stats.fields_processed += 1;

            if report.kind != AnomalyKind::LegacyPlaintext {
                stats.skipped += 1;
                continue;
            }
            if dry_run {
                stats.encrypted += 1;
                continue;
            }

            match self.encrypt_field(&schema, report.record_id, &report.field).await {
                Ok(true) => stats.encrypted += 1,
                Ok(false) => stats.skipped += 1,
                Err(e) => {
                    tracing::error!(
                        "Migration failed for {}.{} record {}: {}",
                        report.schema,
                        report.field,
                        report.record_id,
                        e
                    );
                    stats.failed += 1;
                }
            }
        }

        tracing::info!(
            "Migration of {} finished{}: {:?}",
            schema.name(),
            if dry_run { " (dry run)" } else { "" },
            stats
        );
        Ok(stats)
    }

    /// Re-read, confirm the value is still plaintext, then compare-and-set its payload
    async fn encrypt_field(&self, schema: &SensitiveSchema, id: Uuid, field: &str) -> Result<bool, RepairError> {
        let row = self
            .store
            .get(schema.name(), id)
            .await?
            .ok_or_else(|| StoreError::NotFound {
                schema: schema.name().to_string(),
                id,
            })?;

        let raw = match row.get(field) {
            Some(Value::String(s)) if !s.is_empty() && !self.cipher.looks_encrypted(s) => s.clone(),
            _ => return Ok(false),
        };

        let payload = self.cipher.encrypt(&raw)?;
        self.store
            .update_field_if(schema.name(), id, field, Some(raw.as_str()), &payload)
            .await?;
        Ok(true)
    }
}
