// Ring 4: Field Encryptor - the pre-save hook of the transparency layer
use async_trait::async_trait;
use std::sync::Arc;

use crate::crypto::codec::FieldCipher;
use crate::encryption::seal_changed_fields;
use crate::observer::context::ObserverContext;
use crate::database::record::Record;
use crate::database::schema::SensitiveSchema;
use crate::observer::error::{ObserverError, ObserverWarning};
use crate::observer::traits::{EnrichmentObserver, Observer, ObserverRing, Operation};

/// Encrypts every written sensitive field before the store sees it. A failure
/// aborts the save; plaintext never reaches ring 5.
pub struct FieldEncryptor {
    cipher: Arc<dyn FieldCipher>,
}

impl FieldEncryptor {
    pub fn new(cipher: Arc<dyn FieldCipher>) -> Self {
        Self { cipher }
    }

    /// Stored plaintext in declared fields this save does not write
    fn untouched_legacy_fields(&self, record: &Record, schema: &SensitiveSchema) -> usize {
        let Some(original) = record.original() else {
            return 0;
        };
        schema
            .fields()
            .iter()
            .filter(|field| !record.written(field))
            .filter_map(|field| original.get(field.as_str()).and_then(|v| v.as_str()))
            .filter(|value| !value.is_empty() && !self.cipher.looks_encrypted(value))
            .count()
    }
}

impl Observer for FieldEncryptor {
    fn name(&self) -> &'static str {
        "FieldEncryptor"
    }

    fn ring(&self) -> ObserverRing {
        ObserverRing::Enrichment
    }

    fn applies_to_operation(&self, op: Operation) -> bool {
        matches!(op, Operation::Create | Operation::Update)
    }
}

#[async_trait]
impl EnrichmentObserver for FieldEncryptor {
    async fn execute(&self, ctx: &mut ObserverContext) -> Result<(), ObserverError> {
        let schema = ctx.schema.clone();
        let mut encrypted = 0;

        let mut legacy = 0;

        for record in ctx.records.iter_mut() {
            encrypted += seal_changed_fields(record, &schema, self.cipher.as_ref()).map_err(|e| {
                tracing::error!("Encryption failed for {} record {:?}: {}", schema.name(), record.id(), e);
                ObserverError::from(e)
            })?;
            legacy += self.untouched_legacy_fields(record, &schema);
        }

        if legacy > 0 {
            ctx.add_warning(ObserverWarning::new(
                self.name(),
                self.ring(),
                format!(
                    "{} legacy plaintext values in {} left unencrypted; run `vault repair migrate`",
                    legacy,
                    schema.name()
                ),
            ));
        }

        tracing::debug!("Encrypted {} fields across {} {} records", encrypted, ctx.records.len(), schema.name());
        Ok(())
    }
}
