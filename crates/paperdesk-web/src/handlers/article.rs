use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use paperdesk_core::Record;

use crate::error::ApiError;
use crate::state::AppState;

/// `GET /article/{*id}`. The wildcard keeps legacy ids like `hep-th/9901001` intact.
pub async fn article(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Record>, ApiError> {
    let record = state.desk.gateway.fetch_by_id(&id).await?;
    Ok(Json(record))
}
