use axum::extract::{Path, Query, State};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::handlers::AppState;
use crate::middleware::{ApiResponse, ApiResult};

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    pub after: Option<Uuid>,
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct Page {
    pub records: Vec<Value>,
    /// Pass as `after` to fetch the next page; absent on the last page
    pub next_cursor: Option<Uuid>,
}

/// GET /api/data/:schema - one page of records, ordered by id
pub async fn schema_get(
    State(state): State<AppState>,
    Path(schema): Path<String>,
    Query(query): Query<PageQuery>,
) -> ApiResult<Page> {
    let limit = query.limit.unwrap_or(state.max_page_size).clamp(1, state.max_page_size);
    let records = state.service.page(&schema, query.after, limit).await?;

    let next_cursor = if records.len() == limit {
        records.last().and_then(|r| r.id())
    } else {
        None
    };

    let records = records
        .into_iter()
        .map(|mut record| record.to_api_output())
        .collect();

    Ok(ApiResponse::success(Page { records, next_cursor }))
}
