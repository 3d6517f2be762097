use axum::extract::{Path, State};
use serde_json::Value;
use uuid::Uuid;

use crate::handlers::AppState;
use crate::middleware::{ApiResponse, ApiResult};

/// GET /api/data/:schema/:id - stored row plus a `decrypted` object
pub async fn record_get(
    State(state): State<AppState>,
    Path((schema, id)): Path<(String, Uuid)>,
) -> ApiResult<Value> {
    let mut record = state.service.load(&schema, id).await?;
    Ok(ApiResponse::success(record.to_api_output()))
}
