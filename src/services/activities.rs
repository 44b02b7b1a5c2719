use std::collections::BTreeMap;

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use diesel::prelude::*;
use diesel::sqlite::{Sqlite, SqliteConnection};
use serde::Serialize;

use super::ServiceContext;
use crate::error::{AppError, AppResult};
use crate::models::{ActivityAction, ActivityLog, ResourceType};
use crate::pagination::{Page, PageRequest};
use crate::schema::activity_logs;
use crate::utils::time::to_iso;

/// Window, in days, of the "this week" counter.
pub const WEEK_DAYS: i64 = 7;

#[derive(Debug, Clone, Default)]
pub struct ActivityFilter {
    pub action: Option<ActivityAction>,
    pub resource_type: Option<ResourceType>,
    /// First calendar day (UTC) to include.
    pub from: Option<NaiveDate>,
    /// Last calendar day (UTC) to include.
    pub to: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ActivityInfo {
    pub id: i64,
    pub action: ActivityAction,
    pub resource_type: ResourceType,
    pub resource_id: i64,
    pub resource_name: String,
    pub description: String,
    pub created_at: String,
}

impl TryFrom<ActivityLog> for ActivityInfo {
    type Error = AppError;

    fn try_from(log: ActivityLog) -> Result<Self, Self::Error> {
        Ok(Self {
            action: log.action_type.parse()?,
            resource_type: log.resource_type.parse()?,
            id: log.id,
            resource_id: log.resource_id,
            resource_name: log.resource_name,
            description: log.description,
            created_at: to_iso(log.created_at),
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ActivityCounters {
    pub total: i64,
    /// Since midnight UTC.
    pub today: i64,
    /// Within the last seven days.
    pub this_week: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DailyActivity {
    pub date: NaiveDate,
    pub count: i64,
}

/// Read side of the activity log the services write through the background queue.
#[derive(Clone)]
pub struct ActivityFeed {
    ctx: ServiceContext,
}

impl ActivityFeed {
    pub fn new(ctx: ServiceContext) -> Self {
        Self { ctx }
    }

    /// The owner's records matching every present filter, newest first.
    pub fn list(
        &self,
        owner_id: i64,
        filter: &ActivityFilter,
        page: PageRequest,
    ) -> AppResult<Page<ActivityInfo>> {
        if let (Some(from), Some(to)) = (filter.from, filter.to) {
            if from > to {
                return Err(AppError::invalid_operation(
                    "start date must not be after end date",
                ));
            }
        }
        let mut conn = self.ctx.db()?;

        let total: i64 = filtered(owner_id, filter)
            .count()
            .get_result(&mut conn)?;

        let rows: Vec<ActivityLog> = filtered(owner_id, filter)
            .order((activity_logs::created_at.desc(), activity_logs::id.desc()))
            .offset(page.offset())
            .limit(page.page_size)
            .load(&mut conn)?;

        let items = rows
            .into_iter()
            .map(ActivityInfo::try_from)
            .collect::<AppResult<Vec<_>>>()?;
        Ok(Page::new(items, total, page))
    }

    pub fn counters(&self, owner_id: i64) -> AppResult<ActivityCounters> {
        let now = self.ctx.now();
        let mut conn = self.ctx.db()?;
        counters(&mut conn, owner_id, now)
    }
}

pub(crate) fn counters(
    conn: &mut SqliteConnection,
    owner_id: i64,
    now: NaiveDateTime,
) -> AppResult<ActivityCounters> {
    let total = owned(owner_id).count().get_result(conn)?;
    let today = owned(owner_id)
        .filter(activity_logs::created_at.ge(start_of_day(now.date())))
        .count()
        .get_result(conn)?;
    let this_week = owned(owner_id)
        .filter(activity_logs::created_at.ge(now - Duration::days(WEEK_DAYS)))
        .count()
        .get_result(conn)?;
    Ok(ActivityCounters {
        total,
        today,
        this_week,
    })
}

pub(crate) fn recent(
    conn: &mut SqliteConnection,
    owner_id: i64,
    limit: i64,
) -> AppResult<Vec<ActivityInfo>> {
    let rows: Vec<ActivityLog> = owned(owner_id)
        .order((activity_logs::created_at.desc(), activity_logs::id.desc()))
        .limit(limit)
        .load(conn)?;
    rows.into_iter().map(ActivityInfo::try_from).collect()
}

/// One entry per calendar day for the last `days` days up to `now`, oldest first.
/// Days without activity are reported with a zero count.
pub(crate) fn daily(
    conn: &mut SqliteConnection,
    owner_id: i64,
    now: NaiveDateTime,
    days: i64,
) -> AppResult<Vec<DailyActivity>> {
    let first = now.date() - Duration::days(days.max(1) - 1);
    let stamps: Vec<NaiveDateTime> = owned(owner_id)
        .filter(activity_logs::created_at.ge(start_of_day(first)))
        .select(activity_logs::created_at)
        .load(conn)?;

    let mut buckets: BTreeMap<NaiveDate, i64> = (0..days.max(1))
        .map(|offset| (first + Duration::days(offset), 0))
        .collect();
    for stamp in stamps {
        if let Some(count) = buckets.get_mut(&stamp.date()) {
            *count += 1;
        }
    }
    Ok(buckets
        .into_iter()
        .map(|(date, count)| DailyActivity { date, count })
        .collect())
}

fn owned(owner_id: i64) -> activity_logs::BoxedQuery<'static, Sqlite> {
    activity_logs::table
        .filter(activity_logs::owner_id.eq(owner_id))
        .into_boxed()
}

fn filtered(owner_id: i64, filter: &ActivityFilter) -> activity_logs::BoxedQuery<'static, Sqlite> {
    let mut query = owned(owner_id);

    if let Some(action) = filter.action {
        query = query.filter(activity_logs::action_type.eq(action.as_str()));
    }
    if let Some(resource_type) = filter.resource_type {
        query = query.filter(activity_logs::resource_type.eq(resource_type.as_str()));
    }
    if let Some(from) = filter.from {
        query = query.filter(activity_logs::created_at.ge(start_of_day(from)));
    }
    // An end date at the calendar's edge leaves the range open.
    if let Some(end) = filter.to.and_then(|to| to.succ_opt()) {
        query = query.filter(activity_logs::created_at.lt(start_of_day(end)));
    }
    query
}

fn start_of_day(date: NaiveDate) -> NaiveDateTime {
    date.and_time(NaiveTime::MIN)
}
