use axum::{
    extract::{Json, Path, Query, State},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};

use crate::auth::AuthenticatedUser;
use crate::error::AppResult;
use crate::models::ResourceType;
use crate::pagination::{Page, PageRequest};
use crate::services::recycle::{RecycleFilter, RecycleItemInfo};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct RecycleListQuery {
    pub page: Option<i64>,
    pub page_size: Option<i64>,
    pub resource_type: Option<ResourceType>,
    pub keyword: Option<String>,
}

#[derive(Deserialize)]
pub struct RestoreRequest {
    #[serde(default)]
    pub target_folder_id: Option<i64>,
}

#[derive(Deserialize)]
pub struct BatchDeleteRequest {
    pub ids: Vec<i64>,
}

#[derive(Serialize)]
pub struct BatchDeleteResponse {
    pub deleted: usize,
}

pub async fn list_recycle_items(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(query): Query<RecycleListQuery>,
) -> AppResult<Json<Page<RecycleItemInfo>>> {
    let page = PageRequest::from_parts(query.page, query.page_size)?;
    let filter = RecycleFilter {
        resource_type: query.resource_type,
        keyword: query.keyword,
    };
    Ok(Json(state.recycle.list(user.owner_id, &filter, page)?))
}

/// The body is optional; without one the item returns to where it was deleted from.
pub async fn restore_item(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(recycle_id): Path<i64>,
    payload: Option<Json<RestoreRequest>>,
) -> AppResult<StatusCode> {
    let target_folder_id = payload.and_then(|Json(request)| request.target_folder_id);
    state
        .recycle
        .restore(user.owner_id, recycle_id, target_folder_id)?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn delete_item(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(recycle_id): Path<i64>,
) -> AppResult<StatusCode> {
    state.recycle.delete_permanently(user.owner_id, recycle_id)?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn batch_delete(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(payload): Json<BatchDeleteRequest>,
) -> AppResult<Json<BatchDeleteResponse>> {
    let deleted = state.recycle.delete_batch(user.owner_id, &payload.ids)?;
    Ok(Json(BatchDeleteResponse { deleted }))
}
