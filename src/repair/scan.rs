use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use uuid::Uuid;

use crate::crypto::codec::FieldCipher;
use crate::database::record::RowData;
use crate::database::schema::SensitiveSchema;
use crate::database::store::{row_id, RecordStore, StoreError};

/// State of one stored sensitive value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AnomalyKind {
    Ok,
    LegacyPlaintext,
    MultiEncrypted,
    Corrupt,
}

impl AnomalyKind {
    pub fn is_anomaly(&self) -> bool {
        !matches!(self, AnomalyKind::Ok)
    }
}

impl std::fmt::Display for AnomalyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            AnomalyKind::Ok => "ok",
            AnomalyKind::LegacyPlaintext => "legacy_plaintext",
            AnomalyKind::MultiEncrypted => "multi_encrypted",
            AnomalyKind::Corrupt => "corrupt",
        };
        f.pad(label)
    }
}

/// Classification of one non-empty sensitive value. Never carries the value itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldReport {
    pub schema: String,
    pub record_id: Uuid,
    pub field: String,
    pub kind: AnomalyKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Classify a stored value
pub fn classify(value: &str, cipher: &dyn FieldCipher) -> (AnomalyKind, Option<String>) {
    if !cipher.looks_encrypted(value) {
        return (AnomalyKind::LegacyPlaintext, None);
    }

    match cipher.decrypt(value) {
        Ok(inner) if cipher.looks_encrypted(&inner) => (AnomalyKind::MultiEncrypted, None),
        Ok(_) => (AnomalyKind::Ok, None),
        Err(e) => (AnomalyKind::Corrupt, Some(e.to_string())),
    }
}

/// Reports for every non-empty declared field of one stored row
pub fn classify_row(row: &RowData, schema: &SensitiveSchema, cipher: &dyn FieldCipher) -> Vec<FieldReport> {
    let Some(record_id) = row_id(row) else {
        return Vec::new();
    };

    schema
        .fields()
        .iter()
        .filter_map(|field| {
            let value = match row.get(field) {
                Some(Value::String(s)) if !s.is_empty() => s,
                _ => return None,
            };
            let (kind, detail) = classify(value, cipher);
            Some(FieldReport {
                schema: schema.name().to_string(),
                record_id,
                field: field.clone(),
                kind,
                detail,
            })
        })
        .collect()
}

/// Lazy walk over every stored record of one type.
///
/// Pages are fetched by id cursor, so a scan restarted with the last reported
/// `record_id` as `after` picks up where it stopped.
pub struct Scanner {
    store: Arc<dyn RecordStore>,
    cipher: Arc<dyn FieldCipher>,
    batch_size: usize,
}

impl Scanner {
    pub fn new(store: Arc<dyn RecordStore>, cipher: Arc<dyn FieldCipher>, batch_size: usize) -> Self {
        Self {
            store,
            cipher,
            batch_size: batch_size.max(1),
        }
    }

    pub fn scan(
        &self,
        schema: Arc<SensitiveSchema>,
        after: Option<Uuid>,
    ) -> BoxStream<'static, Result<FieldReport, StoreError>> {
        let store = self.store.clone();
        let cipher = self.cipher.clone();
        let batch_size = self.batch_size;

        // State: Some(cursor) while pages remain, None once exhausted
        stream::try_unfold(Some(after), move |state| {
            let store = store.clone();
            let cipher = cipher.clone();
            let schema = schema.clone();

            async move {
                let Some(cursor) = state else {
                    return Ok(None);
                };

                let rows = store.page(schema.name(), cursor, batch_size).await?;
                if rows.is_empty() {
                    return Ok(None);
                }

                let next = if rows.len() < batch_size {
                    None
                } else {
                    rows.last().and_then(row_id).map(Some)
                };

                tracing::debug!("Scanned {} {} rows after {:?}", rows.len(), schema.name(), cursor);

                let reports: Vec<Result<FieldReport, StoreError>> = rows
                    .iter()
                    .flat_map(|row| classify_row(row, &schema, cipher.as_ref()))
                    .map(Ok)
                    .collect();

                Ok::<_, StoreError>(Some((stream::iter(reports), next)))
            }
        })
        .try_flatten()
        .boxed()
    }
}
