use axum::{
    extract::{Json, Path, Query, State},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};

use crate::services::folders::{FolderInfo, FolderNode};
use crate::state::AppState;
use crate::{
    auth::AuthenticatedUser,
    error::{AppError, AppResult},
};

#[derive(Deserialize)]
pub struct CreateFolderRequest {
    pub name: String,
    #[serde(default)]
    pub parent_id: Option<i64>,
}

#[derive(Deserialize)]
pub struct RenameFolderRequest {
    pub name: String,
}

#[derive(Deserialize)]
pub struct MoveFolderRequest {
    #[serde(default)]
    pub new_parent_id: Option<i64>,
}

#[derive(Deserialize)]
pub struct DeleteQuery {
    pub reason: Option<String>,
}

#[derive(Serialize)]
pub struct FolderResponse {
    pub folder: FolderInfo,
}

pub async fn create_folder(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(payload): Json<CreateFolderRequest>,
) -> AppResult<(StatusCode, Json<FolderResponse>)> {
    let folder = state
        .folders
        .create(user.owner_id, &payload.name, payload.parent_id)?;
    Ok((
        StatusCode::CREATED,
        Json(FolderResponse {
            folder: folder.into(),
        }),
    ))
}

pub async fn get_folder(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(folder_id): Path<i64>,
) -> AppResult<Json<FolderResponse>> {
    let folder = state.folders.get(user.owner_id, folder_id)?;
    Ok(Json(FolderResponse {
        folder: folder.into(),
    }))
}

pub async fn get_folder_tree(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> AppResult<Json<Vec<FolderNode>>> {
    Ok(Json(state.folders.get_tree(user.owner_id)?))
}

/// Accepts `root` or a numeric folder id.
pub async fn list_children(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(folder_identifier): Path<String>,
) -> AppResult<Json<Vec<FolderInfo>>> {
    let parent_id = if folder_identifier.eq_ignore_ascii_case("root") {
        None
    } else {
        Some(folder_identifier.parse::<i64>().map_err(|_| {
            AppError::invalid_operation("folder identifier must be 'root' or a numeric id")
        })?)
    };

    let children = state.folders.get_children(user.owner_id, parent_id)?;
    Ok(Json(children.into_iter().map(FolderInfo::from).collect()))
}

pub async fn rename_folder(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(folder_id): Path<i64>,
    Json(payload): Json<RenameFolderRequest>,
) -> AppResult<StatusCode> {
    state
        .folders
        .rename(user.owner_id, folder_id, &payload.name)?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn move_folder(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(folder_id): Path<i64>,
    Json(payload): Json<MoveFolderRequest>,
) -> AppResult<StatusCode> {
    state
        .folders
        .move_folder(user.owner_id, folder_id, payload.new_parent_id)?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn delete_folder(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(folder_id): Path<i64>,
    Query(query): Query<DeleteQuery>,
) -> AppResult<StatusCode> {
    state
        .folders
        .delete(user.owner_id, folder_id, query.reason.as_deref())?;
    Ok(StatusCode::NO_CONTENT)
}
