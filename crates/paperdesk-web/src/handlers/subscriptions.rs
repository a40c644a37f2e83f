use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};

use crate::error::ApiError;
use crate::models::{NewSubscription, SubscriptionJson, SuccessResponse};
use crate::owner::Owner;
use crate::state::AppState;

pub async fn list(
    State(state): State<Arc<AppState>>,
    Owner(owner): Owner,
) -> Result<Json<Vec<SubscriptionJson>>, ApiError> {
    let subs = state.desk.subscriptions.list(&owner).await?;
    Ok(Json(subs.into_iter().map(SubscriptionJson::from).collect()))
}

pub async fn add(
    State(state): State<Arc<AppState>>,
    Owner(owner): Owner,
    body: Result<Json<NewSubscription>, JsonRejection>,
) -> Result<Json<SubscriptionJson>, ApiError> {
    let Json(req) = body.map_err(|_| ApiError::InvalidPayload("Invalid payload".into()))?;
    let sub = state
        .desk
        .subscriptions
        .add(&owner, &req.category, req.keywords)
        .await?;
    Ok(Json(sub.into()))
}

pub async fn remove(
    State(state): State<Arc<AppState>>,
    Owner(owner): Owner,
    Path(id): Path<String>,
) -> Result<Json<SuccessResponse>, ApiError> {
    state.desk.subscriptions.remove(&owner, &id).await?;
    Ok(Json(SuccessResponse { success: true }))
}
