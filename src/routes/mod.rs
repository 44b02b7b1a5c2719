use axum::http::HeaderValue;
use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{delete, get, post},
    Router,
};
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::{auth::AuthenticatedUser, state::AppState};

pub mod activities;
pub mod documents;
pub mod folders;
pub mod health;
pub mod recycle;

const MAX_BODY_BYTES: usize = 8 * 1024 * 1024;

pub fn create_router(state: AppState) -> Router<()> {
    let cors = if let Some(origins) = state.config.cors_allowed_origin.as_ref() {
        let headers: Vec<HeaderValue> = origins
            .split(',')
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .filter_map(|value| match value.parse::<HeaderValue>() {
                Ok(header) => Some(header),
                Err(_) => {
                    warn!(origin = value, "ignoring invalid CORS allowed origin");
                    None
                }
            })
            .collect();

        CorsLayer::new()
            .allow_origin(AllowOrigin::list(headers))
            .allow_methods(AllowMethods::mirror_request())
            .allow_headers(AllowHeaders::mirror_request())
            .allow_credentials(true)
    } else {
        CorsLayer::new()
            .allow_origin(AllowOrigin::mirror_request())
            .allow_methods(AllowMethods::mirror_request())
            .allow_headers(AllowHeaders::mirror_request())
            .allow_credentials(true)
    };

    let folders_routes = Router::new()
        .route("/", post(folders::create_folder))
        .route("/tree", get(folders::get_folder_tree))
        .route(
            "/:id",
            get(folders::get_folder)
                .patch(folders::rename_folder)
                .delete(folders::delete_folder),
        )
        .route("/:id/move", post(folders::move_folder))
        .route("/:id/children", get(folders::list_children));

    let documents_routes = Router::new()
        .route(
            "/",
            get(documents::list_documents).post(documents::create_document),
        )
        .route(
            "/:id",
            get(documents::get_document)
                .patch(documents::update_document)
                .delete(documents::delete_document),
        )
        .route("/:id/copy", post(documents::copy_document))
        .route("/:id/share", post(documents::share_document));

    let recycle_routes = Router::new()
        .route("/", get(recycle::list_recycle_items))
        .route("/batch-delete", post(recycle::batch_delete))
        .route("/:id", delete(recycle::delete_item))
        .route("/:id/restore", post(recycle::restore_item));

    let protected_state = state.clone();
    let protected_routes = Router::new()
        .nest("/api/folders", folders_routes)
        .nest("/api/documents", documents_routes)
        .nest("/api/recycle", recycle_routes)
        .route("/api/activities", get(activities::list_activities))
        .route("/api/workspace/stats", get(documents::workspace_stats))
        .route("/api/workspace/dashboard", get(documents::workspace_dashboard))
        .layer(middleware::from_extractor_with_state::<AuthenticatedUser, _>(protected_state));

    Router::new()
        .merge(protected_routes)
        .route("/api/share/:token", get(documents::resolve_share))
        .route("/api/health", get(health::health_check))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
}
