use async_trait::async_trait;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;
use thiserror::Error;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::database::record::RowData;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Missing configuration: {0}")]
    ConfigMissing(&'static str),

    #[error("Record {id} not found in {schema}")]
    NotFound { schema: String, id: Uuid },

    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    #[error("Record is missing a valid id")]
    MissingId,

    #[error("Stored value of {schema}/{id}.{field} changed concurrently")]
    Conflict { schema: String, id: Uuid, field: String },

    #[error("Query error: {0}")]
    QueryError(String),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

/// Persistence seam for raw (already encrypted) rows.
///
/// Stores never see plaintext for sensitive fields; they move opaque values.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn get(&self, schema: &str, id: Uuid) -> Result<Option<RowData>, StoreError>;

    /// Insert a row; `row` must carry its `id`
    async fn insert(&self, schema: &str, row: RowData) -> Result<RowData, StoreError>;

    /// Apply `changes` to an existing row and return the stored result
    async fn update(&self, schema: &str, id: Uuid, changes: RowData) -> Result<RowData, StoreError>;

    /// Rows ordered by id, strictly after `after`
    async fn page(
        &self,
        schema: &str,
        after: Option<Uuid>,
        limit: usize,
    ) -> Result<Vec<RowData>, StoreError>;

    /// Write `new` only if the stored text still equals `expected`.
    ///
    /// Fails with [`StoreError::Conflict`] when another writer got there first.
    async fn update_field_if(
        &self,
        schema: &str,
        id: Uuid,
        field: &str,
        expected: Option<&str>,
        new: &str,
    ) -> Result<(), StoreError>;

    async fn health_check(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

/// Extract the `id` column of a stored row
pub fn row_id(row: &RowData) -> Option<Uuid> {
    row.get("id")
        .and_then(Value::as_str)
        .and_then(|s| Uuid::parse_str(s).ok())
}

/// In-process store keyed by record type then id.
///
/// Id ordering matches Postgres `uuid` ordering, so cursors behave the same in both.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<HashMap<String, BTreeMap<Uuid, RowData>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert rows verbatim, bypassing every hook. Used to stage legacy or damaged data.
    pub async fn seed(&self, schema: &str, rows: impl IntoIterator<Item = RowData>) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        let table = tables.entry(schema.to_string()).or_default();
        for row in rows {
            let id = row_id(&row).ok_or(StoreError::MissingId)?;
            table.insert(id, row);
        }
        Ok(())
    }

    pub async fn len(&self, schema: &str) -> usize {
        self.tables.read().await.get(schema).map_or(0, BTreeMap::len)
    }

    pub async fn is_empty(&self, schema: &str) -> bool {
        self.len(schema).await == 0
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn get(&self, schema: &str, id: Uuid) -> Result<Option<RowData>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables.get(schema).and_then(|t| t.get(&id)).cloned())
    }

    async fn insert(&self, schema: &str, row: RowData) -> Result<RowData, StoreError> {
        let id = row_id(&row).ok_or(StoreError::MissingId)?;
        let mut tables = self.tables.write().await;
        tables.entry(schema.to_string()).or_default().insert(id, row.clone());
        Ok(row)
    }

    async fn update(&self, schema: &str, id: Uuid, changes: RowData) -> Result<RowData, StoreError> {
        let mut tables = self.tables.write().await;
        let row = tables
            .get_mut(schema)
            .and_then(|t| t.get_mut(&id))
            .ok_or_else(|| StoreError::NotFound {
                schema: schema.to_string(),
                id,
            })?;
        row.extend(changes);
        Ok(row.clone())
    }

    async fn page(
        &self,
        schema: &str,
        after: Option<Uuid>,
        limit: usize,
    ) -> Result<Vec<RowData>, StoreError> {
        let tables = self.tables.read().await;
        let Some(table) = tables.get(schema) else {
            return Ok(Vec::new());
        };

        let lower = match after {
            Some(id) => Bound::Excluded(id),
            None => Bound::Unbounded,
        };
        Ok(table
            .range((lower, Bound::Unbounded))
            .take(limit)
            .map(|(_, row)| row.clone())
            .collect())
    }

    async fn update_field_if(
        &self,
        schema: &str,
        id: Uuid,
        field: &str,
        expected: Option<&str>,
        new: &str,
    ) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        let row = tables
            .get_mut(schema)
            .and_then(|t| t.get_mut(&id))
            .ok_or_else(|| StoreError::NotFound {
                schema: schema.to_string(),
                id,
            })?;

        let current = row.get(field).and_then(Value::as_str);
        if current != expected {
            return Err(StoreError::Conflict {
                schema: schema.to_string(),
                id,
                field: field.to_string(),
            });
        }

        row.insert(field.to_string(), Value::String(new.to_string()));
        Ok(())
    }
}
