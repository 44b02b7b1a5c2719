use axum::{
    extract::{Json, Path, Query, State},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};

use crate::auth::AuthenticatedUser;
use crate::error::AppResult;
use crate::models::{DocumentStatus, DocumentType};
use crate::pagination::{Page, PageRequest};
use crate::services::documents::{
    CreateDocument, Dashboard, DocumentChanges, DocumentDetail, DocumentFilter, DocumentSummary,
    WorkspaceStats,
};
use crate::state::AppState;
use crate::utils::time::to_iso;

use super::folders::DeleteQuery;

#[derive(Deserialize)]
pub struct DocumentListQuery {
    pub page: Option<i64>,
    pub page_size: Option<i64>,
    #[serde(rename = "type")]
    pub doc_type: Option<DocumentType>,
    pub status: Option<DocumentStatus>,
    pub folder_id: Option<i64>,
    pub keyword: Option<String>,
}

#[derive(Deserialize)]
pub struct ShareRequest {
    pub expiry_hours: i64,
}

#[derive(Serialize)]
pub struct DocumentResponse {
    pub document: DocumentDetail,
}

#[derive(Serialize)]
pub struct ShareResponse {
    pub document_id: i64,
    pub token: String,
    pub expires_at: String,
    pub url: Option<String>,
}

pub async fn list_documents(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(query): Query<DocumentListQuery>,
) -> AppResult<Json<Page<DocumentSummary>>> {
    let page = PageRequest::from_parts(query.page, query.page_size)?;
    let filter = DocumentFilter {
        doc_type: query.doc_type,
        status: query.status,
        folder_id: query.folder_id,
        keyword: query.keyword,
    };
    Ok(Json(state.documents.list(user.owner_id, &filter, page)?))
}

pub async fn create_document(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(payload): Json<CreateDocument>,
) -> AppResult<(StatusCode, Json<DocumentResponse>)> {
    let document = state.documents.create(user.owner_id, payload)?;
    Ok((
        StatusCode::CREATED,
        Json(DocumentResponse {
            document: document.try_into()?,
        }),
    ))
}

pub async fn get_document(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(document_id): Path<i64>,
) -> AppResult<Json<DocumentResponse>> {
    let document = state.documents.get(user.owner_id, document_id)?;
    Ok(Json(DocumentResponse { document }))
}

pub async fn update_document(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(document_id): Path<i64>,
    Json(payload): Json<DocumentChanges>,
) -> AppResult<Json<DocumentResponse>> {
    let document = state
        .documents
        .update(user.owner_id, document_id, payload)?;
    Ok(Json(DocumentResponse {
        document: document.try_into()?,
    }))
}

pub async fn delete_document(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(document_id): Path<i64>,
    Query(query): Query<DeleteQuery>,
) -> AppResult<StatusCode> {
    state
        .documents
        .delete(user.owner_id, document_id, query.reason.as_deref())?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn copy_document(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(document_id): Path<i64>,
) -> AppResult<(StatusCode, Json<DocumentResponse>)> {
    let copy = state.documents.copy(user.owner_id, document_id)?;
    Ok((
        StatusCode::CREATED,
        Json(DocumentResponse {
            document: copy.try_into()?,
        }),
    ))
}

pub async fn share_document(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(document_id): Path<i64>,
    Json(payload): Json<ShareRequest>,
) -> AppResult<Json<ShareResponse>> {
    let grant = state
        .documents
        .share(user.owner_id, document_id, payload.expiry_hours)?;
    Ok(Json(ShareResponse {
        document_id: grant.document_id,
        url: state.config.share_url(&grant.token),
        expires_at: to_iso(grant.expires_at),
        token: grant.token,
    }))
}

/// Public, unauthenticated read through a share token.
pub async fn resolve_share(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> AppResult<Json<DocumentResponse>> {
    let document = state.documents.resolve_share(&token)?;
    Ok(Json(DocumentResponse { document }))
}

pub async fn workspace_stats(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> AppResult<Json<WorkspaceStats>> {
    Ok(Json(state.documents.stats(user.owner_id)?))
}

pub async fn workspace_dashboard(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> AppResult<Json<Dashboard>> {
    Ok(Json(state.documents.dashboard(user.owner_id)?))
}
