use axum::extract::{Json, Query, State};
use chrono::NaiveDate;
use serde::Deserialize;

use crate::auth::AuthenticatedUser;
use crate::error::AppResult;
use crate::models::{ActivityAction, ResourceType};
use crate::pagination::{Page, PageRequest};
use crate::services::activities::{ActivityFilter, ActivityInfo};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct ActivityListQuery {
    pub page: Option<i64>,
    pub page_size: Option<i64>,
    pub action: Option<ActivityAction>,
    pub resource_type: Option<ResourceType>,
    /// `YYYY-MM-DD`, inclusive.
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

pub async fn list_activities(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(query): Query<ActivityListQuery>,
) -> AppResult<Json<Page<ActivityInfo>>> {
    let page = PageRequest::from_parts(query.page, query.page_size)?;
    let filter = ActivityFilter {
        action: query.action,
        resource_type: query.resource_type,
        from: query.start_date,
        to: query.end_date,
    };
    Ok(Json(state.activities.list(user.owner_id, &filter, page)?))
}
