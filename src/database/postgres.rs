use async_trait::async_trait;
use serde_json::Value;
use sqlx::{postgres::PgPoolOptions, PgPool};
use std::time::Duration;
use tracing::info;
use uuid::Uuid;

use crate::config::DatabaseConfig;
use crate::database::record::RowData;
use crate::database::schema::is_valid_identifier;
use crate::database::store::{RecordStore, StoreError};

/// Postgres-backed store. Rows travel as JSON (`row_to_json` out,
/// `jsonb_populate_record` in) so the table layout stays open.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, StoreError> {
        let url = config
            .url
            .as_deref()
            .ok_or(StoreError::ConfigMissing("DATABASE_URL"))?;

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.connection_timeout))
            .connect(url)
            .await?;

        info!("Created database pool (max {} connections)", config.max_connections);
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Quote an identifier after validating it
    fn quote_identifier(name: &str) -> Result<String, StoreError> {
        if !is_valid_identifier(name) {
            return Err(StoreError::InvalidIdentifier(name.to_string()));
        }
        Ok(format!("\"{}\"", name))
    }

    fn into_row(value: Value) -> Result<RowData, StoreError> {
        match value {
            Value::Object(map) => Ok(map.into_iter().collect()),
            other => Err(StoreError::QueryError(format!(
                "Expected a JSON row, got {}",
                other
            ))),
        }
    }

    fn quoted_columns(row: &RowData) -> Result<Vec<String>, StoreError> {
        let mut columns = row
            .keys()
            .map(|column| Self::quote_identifier(column))
            .collect::<Result<Vec<_>, _>>()?;
        columns.sort();
        Ok(columns)
    }
}

#[async_trait]
impl RecordStore for PgStore {
    async fn get(&self, schema: &str, id: Uuid) -> Result<Option<RowData>, StoreError> {
        let table = Self::quote_identifier(schema)?;
        let query = format!("SELECT row_to_json(t) FROM (SELECT * FROM {} WHERE id = $1) t", table);

        let row: Option<Value> = sqlx::query_scalar(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(Self::into_row).transpose()
    }

    async fn insert(&self, schema: &str, row: RowData) -> Result<RowData, StoreError> {
        let table = Self::quote_identifier(schema)?;
        let columns = Self::quoted_columns(&row)?.join(", ");
        let query = format!(
            "INSERT INTO {table} AS t ({columns}) \
             SELECT {columns} FROM jsonb_populate_record(NULL::{table}, $1) \
             RETURNING row_to_json(t.*)"
        );

        let payload = Value::Object(row.into_iter().collect());
        let stored: Value = sqlx::query_scalar(&query)
            .bind(payload)
            .fetch_one(&self.pool)
            .await?;

        Self::into_row(stored)
    }

    async fn update(&self, schema: &str, id: Uuid, changes: RowData) -> Result<RowData, StoreError> {
        if changes.is_empty() {
            return self.get(schema, id).await?.ok_or_else(|| StoreError::NotFound {
                schema: schema.to_string(),
                id,
            });
        }

        let table = Self::quote_identifier(schema)?;
        let assignments = Self::quoted_columns(&changes)?
            .iter()
            .map(|column| format!("{column} = p.{column}"))
            .collect::<Vec<_>>()
            .join(", ");
        let query = format!(
            "UPDATE {table} AS t SET {assignments} \
             FROM jsonb_populate_record(NULL::{table}, $1) AS p \
             WHERE t.id = $2 \
             RETURNING row_to_json(t.*)"
        );

        let payload = Value::Object(changes.into_iter().collect());
        let stored: Option<Value> = sqlx::query_scalar(&query)
            .bind(payload)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        match stored {
            Some(value) => Self::into_row(value),
            None => Err(StoreError::NotFound {
                schema: schema.to_string(),
                id,
            }),
        }
    }

    async fn page(
        &self,
        schema: &str,
        after: Option<Uuid>,
        limit: usize,
    ) -> Result<Vec<RowData>, StoreError> {
        let table = Self::quote_identifier(schema)?;
        let query = format!(
            "SELECT row_to_json(t) FROM (\
             SELECT * FROM {} WHERE ($1::uuid IS NULL OR id > $1) ORDER BY id LIMIT $2\
             ) t",
            table
        );

        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows: Vec<Value> = sqlx::query_scalar(&query)
            .bind(after)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(Self::into_row).collect()
    }

    async fn update_field_if(
        &self,
        schema: &str,
        id: Uuid,
        field: &str,
        expected: Option<&str>,
        new: &str,
    ) -> Result<(), StoreError> {
        let table = Self::quote_identifier(schema)?;
        let column = Self::quote_identifier(field)?;
        let query = format!(
            "UPDATE {table} SET {column} = $1 WHERE id = $2 AND {column} IS NOT DISTINCT FROM $3"
        );

        let result = sqlx::query(&query)
            .bind(new)
            .bind(id)
            .bind(expected)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Conflict {
                schema: schema.to_string(),
                id,
                field: field.to_string(),
            });
        }
        Ok(())
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_quote_identifier() {
        assert_eq!(PgStore::quote_identifier("user_profile").unwrap(), "\"user_profile\"");
        assert!(matches!(
            PgStore::quote_identifier("user\"; DROP TABLE x; --"),
            Err(StoreError::InvalidIdentifier(_))
        ));
    }

    #[test]
    fn test_quoted_columns_are_sorted_and_validated() {
        let row: RowData = [
            ("phone_number".to_string(), json!("x")),
            ("bio".to_string(), json!("y")),
        ]
        .into_iter()
        .collect();
        assert_eq!(
            PgStore::quoted_columns(&row).unwrap(),
            vec!["\"bio\"".to_string(), "\"phone_number\"".to_string()]
        );

        let bad: RowData = [("Bad Column".to_string(), json!(1))].into_iter().collect();
        assert!(PgStore::quoted_columns(&bad).is_err());
    }
}
