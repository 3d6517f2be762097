use axum::extract::{Path, State};
use axum::Json;
use serde_json::Value;

use crate::handlers::AppState;
use crate::middleware::{ApiResponse, ApiResult};

/// POST /api/data/:schema - create one record; sensitive fields arrive as plaintext
pub async fn schema_post(
    State(state): State<AppState>,
    Path(schema): Path<String>,
    Json(body): Json<Value>,
) -> ApiResult<Value> {
    let mut record = state.service.create(&schema, body).await?;
    Ok(ApiResponse::created(record.to_api_output()))
}
