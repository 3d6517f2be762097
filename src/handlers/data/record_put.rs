use axum::extract::{Path, State};
use axum::Json;
use serde_json::Value;
use uuid::Uuid;

use crate::handlers::AppState;
use crate::middleware::{ApiResponse, ApiResult};

/// PUT /api/data/:schema/:id - merge the given fields into a stored record
pub async fn record_put(
    State(state): State<AppState>,
    Path((schema, id)): Path<(String, Uuid)>,
    Json(body): Json<Value>,
) -> ApiResult<Value> {
    let mut record = state.service.update(&schema, id, body).await?;
    Ok(ApiResponse::success(record.to_api_output()))
}
