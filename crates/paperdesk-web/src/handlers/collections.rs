//! Favorites and history share one implementation, parameterized by kind.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use paperdesk_core::{CollectionKind, NewItem, Upserted};

use crate::error::ApiError;
use crate::models::{ItemJson, ListParams, SuccessResponse, UpsertResponse};
use crate::owner::Owner;
use crate::state::AppState;

type ListResult = Result<Json<Vec<ItemJson>>, ApiError>;

async fn list(
    state: &AppState,
    owner: &str,
    kind: CollectionKind,
    params: Result<Query<ListParams>, QueryRejection>,
) -> ListResult {
    let Query(params) = params.map_err(|e| ApiError::InvalidPayload(e.body_text()))?;
    let items = state.desk.collections.list(owner, kind, params.limit).await?;
    Ok(Json(items.into_iter().map(ItemJson::from).collect()))
}

async fn add(
    state: &AppState,
    owner: &str,
    kind: CollectionKind,
    body: Result<Json<NewItem>, JsonRejection>,
) -> Result<Json<UpsertResponse>, ApiError> {
    let Json(item) = body.map_err(|_| ApiError::InvalidPayload("Invalid payload".into()))?;
    let outcome = state.desk.collections.upsert(owner, kind, item).await?;
    Ok(Json(UpsertResponse {
        success: true,
        created: outcome == Upserted::Inserted,
    }))
}

async fn remove(
    state: &AppState,
    owner: &str,
    kind: CollectionKind,
    id: &str,
) -> Result<Json<SuccessResponse>, ApiError> {
    state.desk.collections.remove(owner, kind, id).await?;
    Ok(Json(SuccessResponse { success: true }))
}

pub async fn list_favorites(
    State(state): State<Arc<AppState>>,
    Owner(owner): Owner,
    params: Result<Query<ListParams>, QueryRejection>,
) -> ListResult {
    list(&state, &owner, CollectionKind::Favorites, params).await
}

pub async fn add_favorite(
    State(state): State<Arc<AppState>>,
    Owner(owner): Owner,
    body: Result<Json<NewItem>, JsonRejection>,
) -> Result<Json<UpsertResponse>, ApiError> {
    add(&state, &owner, CollectionKind::Favorites, body).await
}

pub async fn remove_favorite(
    State(state): State<Arc<AppState>>,
    Owner(owner): Owner,
    Path(id): Path<String>,
) -> Result<Json<SuccessResponse>, ApiError> {
    remove(&state, &owner, CollectionKind::Favorites, &id).await
}

pub async fn list_history(
    State(state): State<Arc<AppState>>,
    Owner(owner): Owner,
    params: Result<Query<ListParams>, QueryRejection>,
) -> ListResult {
    list(&state, &owner, CollectionKind::History, params).await
}

pub async fn add_history(
    State(state): State<Arc<AppState>>,
    Owner(owner): Owner,
    body: Result<Json<NewItem>, JsonRejection>,
) -> Result<Json<UpsertResponse>, ApiError> {
    add(&state, &owner, CollectionKind::History, body).await
}

pub async fn remove_history(
    State(state): State<Arc<AppState>>,
    Owner(owner): Owner,
    Path(id): Path<String>,
) -> Result<Json<SuccessResponse>, ApiError> {
    remove(&state, &owner, CollectionKind::History, &id).await
}
