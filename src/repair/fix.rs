use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use uuid::Uuid;

use futures::TryStreamExt;

use crate::crypto::codec::FieldCipher;
use crate::crypto::error::DecryptionError;
use crate::database::schema::SensitiveSchema;
use crate::database::store::{RecordStore, StoreError};
use crate::repair::scan::{classify, AnomalyKind, FieldReport, Scanner};
use crate::repair::RepairError;

/// Result of peeling encryption layers off a value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Peeled {
    pub plaintext: String,
    pub layers: usize,
    /// False when the value still looks encrypted after the last pass
    pub converged: bool,
}

/// Decrypt repeatedly until the value stops looking like a payload.
///
/// Fails only when the outermost layer cannot be decrypted. An inner layer that
/// fails leaves `converged` false.
pub fn peel_layers(value: &str, cipher: &dyn FieldCipher, max_passes: usize) -> Result<Peeled, DecryptionError> {
    let mut current = value.to_string();
    let mut layers = 0;

    while layers < max_passes && cipher.looks_encrypted(&current) {
        match cipher.decrypt(&current) {
            Ok(inner) => {
                current = inner;
                layers += 1;
            }
            Err(e) if layers == 0 => return Err(e),
            Err(_) => break,
        }
    }

    let converged = !cipher.looks_encrypted(&current);
    Ok(Peeled {
        plaintext: current,
        layers,
        converged,
    })
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RepairOutcome {
    /// Empty, legacy or already single-encrypted
    Unchanged { kind: Option<AnomalyKind> },
    Repaired { layers: usize },
    WouldRepair { layers: usize },
    /// Needs a human; the stored value was not modified
    Flagged { reason: String },
    /// Another writer changed the value between read and write
    Conflict,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RepairStats {
    /// Records with at least one non-empty declared field
    pub records_processed: usize,
    pub fields_processed: usize,
    pub fixed: usize,
    pub skipped: usize,
    pub flagged: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RepairSummary {
    pub stats: RepairStats,
    pub flagged: Vec<FieldReport>,
    pub last_record_id: Option<Uuid>,
}

/// Normalizes multi-encrypted values back to a single layer
pub struct Repairer {
    store: Arc<dyn RecordStore>,
    cipher: Arc<dyn FieldCipher>,
    max_passes: usize,
    batch_size: usize,
}

impl Repairer {
    pub fn new(store: Arc<dyn RecordStore>, cipher: Arc<dyn FieldCipher>, max_passes: usize, batch_size: usize) -> Self {
        Self {
            store,
            cipher,
            max_passes: max_passes.max(1),
            batch_size,
        }
    }

    /// Repair one field of one stored record.
    ///
    /// The value is re-read here and written back with a compare-and-set, so a
    /// concurrent edit is reported as [`RepairOutcome::Conflict`] instead of
    /// being overwritten.
    pub async fn repair(
        &self,
        schema: &SensitiveSchema,
        id: Uuid,
        field: &str,
        dry_run: bool,
    ) -> Result<RepairOutcome, RepairError> {
        let row = self
            .store
            .get(schema.name(), id)
            .await?
            .ok_or_else(|| StoreError::NotFound {
                schema: schema.name().to_string(),
                id,
            })?;

        let raw = match row.get(field) {
            Some(Value::String(s)) if !s.is_empty() => s.clone(),
            _ => return Ok(RepairOutcome::Unchanged { kind: None }),
        };

        let (kind, detail) = classify(&raw, self.cipher.as_ref());
        match kind {
            AnomalyKind::Ok | AnomalyKind::LegacyPlaintext => Ok(RepairOutcome::Unchanged { kind: Some(kind) }),
            AnomalyKind::Corrupt => {
                tracing::warn!("Corrupt value in {}.{} for record {} left for review", schema.name(), field, id);
                Ok(RepairOutcome::Flagged {
                    reason: detail.unwrap_or_else(|| "decryption failed".to_string()),
                })
            }
            AnomalyKind::MultiEncrypted => {
                let peeled = peel_layers(&raw, self.cipher.as_ref(), self.max_passes)?;
                if !peeled.converged {
                    return Ok(RepairOutcome::Flagged {
                        reason: format!("still encrypted after {} passes", peeled.layers),
                    });
                }
                if dry_run {
                    return Ok(RepairOutcome::WouldRepair { layers: peeled.layers });
                }

                let payload = self.cipher.encrypt(&peeled.plaintext)?;
                match self
                    .store
                    .update_field_if(schema.name(), id, field, Some(raw.as_str()), &payload)
                    .await
                {
                    Ok(()) => {
                        tracing::info!(
                            "Repaired {}.{} for record {} ({} layers)",
                            schema.name(),
                            field,
                            id,
                            peeled.layers
                        );
                        Ok(RepairOutcome::Repaired { layers: peeled.layers })
                    }
                    Err(StoreError::Conflict { .. }) => Ok(RepairOutcome::Conflict),
                    Err(e) => Err(e.into()),
                }
            }
        }
    }

    /// Scan a whole record type and repair every multi-encrypted value
    pub async fn repair_all(
        &self,
        schema: Arc<SensitiveSchema>,
        after: Option<Uuid>,
        dry_run: bool,
    ) -> Result<RepairSummary, RepairError> {
        let scanner = Scanner::new(self.store.clone(), self.cipher.clone(), self.batch_size);
        let mut reports = scanner.scan(schema.clone(), after);
        let mut summary = RepairSummary::default();

        while let Some(report) = reports.try_next().await? {
            if summary.last_record_id != Some(report.record_id) {
                summary.stats.records_processed += 1;
            }
            summary.stats.fields_processed += 1;
            summary.last_record_id = Some(report.record_id);

            if report.kind != AnomalyKind::MultiEncrypted && report.kind != AnomalyKind::Corrupt {
                summary.stats.skipped += 1;
                continue;
            }

            match self.repair(&schema, report.record_id, &report.field, dry_run).await {
                Ok(RepairOutcome::Repaired { .. }) | Ok(RepairOutcome::WouldRepair { .. }) => {
                    summary.stats.fixed += 1;
                }
                Ok(RepairOutcome::Flagged { reason }) => {
                    summary.stats.flagged += 1;
                    summary.flagged.push(FieldReport {
                        detail: Some(reason),
                        ..report
                    });
                }
                Ok(RepairOutcome::Unchanged { .. }) => summary.stats.skipped += 1,
                Ok(RepairOutcome::Conflict) => {
                    tracing::warn!(
                        "Skipped {}.{} for record {}: changed during repair",
                        report.schema,
                        report.field,
                        report.record_id
                    );
                    summary.stats.failed += 1;
                }
                Err(e) => {
                    tracing::error!(
                        "Repair failed for {}.{} record {}: {}",
                        report.schema,
                        report.field,
                        report.record_id,
                        e
                    );
                    summary.stats.failed += 1;
                }
            }
        }

        tracing::info!(
            "Repair of {} finished{}: {:?}",
            schema.name(),
            if dry_run { " (dry run)" } else { "" },
            summary.stats
        );
        Ok(summary)
    }
}
