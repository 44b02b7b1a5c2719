use std::sync::Arc;

use chrono::{Duration, NaiveDateTime};
use diesel::define_sql_function;
use diesel::r2d2::{ConnectionManager, PooledConnection};
use diesel::sql_types::{Integer, Text};
use diesel::sqlite::SqliteConnection;

use crate::clock::Clock;
use crate::config::AppConfig;
use crate::db::DbPool;
use crate::error::AppResult;
use crate::models::{ActivityAction, ResourceType};
use crate::workers::{ActivityRecord, TaskQueue, ViewIncrement};

pub mod activities;
pub mod documents;
pub mod folders;
pub mod recycle;

pub use activities::ActivityFeed;
pub use documents::DocumentService;
pub use folders::FolderService;
pub use recycle::RecycleBin;

pub type PooledConn = PooledConnection<ConnectionManager<SqliteConnection>>;

// Case-sensitive substring test; `LIKE` folds ASCII case in SQLite.
define_sql_function! {
    fn instr(haystack: Text, needle: Text) -> Integer;
}

#[derive(Debug, Clone, Copy)]
pub struct StoreSettings {
    /// Days a recycled entry survives before the sweeper purges it; 0 keeps entries forever.
    pub recycle_retention_days: i64,
    pub max_tree_depth: usize,
}

impl StoreSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            recycle_retention_days: config.recycle_retention_days,
            max_tree_depth: config.max_tree_depth,
        }
    }
}

/// Handles shared by every service.
#[derive(Clone)]
pub struct ServiceContext {
    pub pool: DbPool,
    pub clock: Arc<dyn Clock>,
    pub activity: TaskQueue<ActivityRecord>,
    pub views: TaskQueue<ViewIncrement>,
    pub settings: StoreSettings,
}

impl ServiceContext {
    pub fn db(&self) -> AppResult<PooledConn> {
        Ok(self.pool.get()?)
    }

    /// Waits for queued views and activity records to be written.
    pub async fn settle(&self, timeout: std::time::Duration) -> bool {
        let activity = self.activity.settle(timeout);
        let views = self.views.settle(timeout);
        let (activity, views) = tokio::join!(activity, views);
        activity && views
    }

    pub(crate) fn now(&self) -> NaiveDateTime {
        self.clock.now_naive()
    }

    pub(crate) fn auto_delete_at(&self, deleted_at: NaiveDateTime) -> Option<NaiveDateTime> {
        let days = self.settings.recycle_retention_days;
        (days > 0).then(|| deleted_at + Duration::days(days))
    }

    pub(crate) fn record_activity(
        &self,
        owner_id: i64,
        action: ActivityAction,
        resource_type: ResourceType,
        resource_id: i64,
        resource_name: &str,
        description: impl Into<String>,
    ) {
        self.activity.submit(ActivityRecord {
            owner_id,
            action,
            resource_type,
            resource_id,
            resource_name: resource_name.to_string(),
            description: description.into(),
            at: self.now(),
        });
    }
}
