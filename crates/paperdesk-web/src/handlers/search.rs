use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};

use crate::error::ApiError;
use crate::models::{DEFAULT_PAGE_SIZE, SearchParams, SearchResponse};
use crate::state::AppState;

pub async fn search(
    State(state): State<Arc<AppState>>,
    params: Result<Query<SearchParams>, QueryRejection>,
) -> Result<Json<SearchResponse>, ApiError> {
    let Query(params) = params.map_err(|e| ApiError::InvalidPayload(e.body_text()))?;
    let start = params.start.unwrap_or(0);
    let max_results = params.max_results.unwrap_or(DEFAULT_PAGE_SIZE);
    let gateway = &state.desk.gateway;

    let page = match params.raw_query() {
        Some(query) => gateway.search_query(query, start, max_results).await?,
        None => {
            let criteria = params.criteria();
            criteria
                .validate()
                .map_err(|e| ApiError::InvalidPayload(e.to_string()))?;
            gateway.search(&criteria, start, max_results).await?
        }
    };

    Ok(Json(SearchResponse::new(page, start, max_results)))
}
