use chrono::NaiveDateTime;
use diesel::prelude::*;
use diesel::sqlite::{Sqlite, SqliteConnection};
use serde::Serialize;
use tracing::{info, warn};

use super::documents::{purge_document, reactivate_document};
use super::folders::{
    find_live_folder, gather_descendant_folder_ids, is_live_folder, purge_folder,
    reactivate_folder,
};
use super::{instr, ServiceContext};
use crate::error::{AppError, AppResult};
use crate::models::{ActivityAction, NewRecycleItem, RecycleItem, RecycleTarget, ResourceType};
use crate::pagination::{Page, PageRequest};
use crate::schema::recycle_items;
use crate::utils::time::to_iso;

/// What a deleting operation hands to the bin inside its own transaction.
#[derive(Debug, Clone)]
pub struct RecycleEntry {
    pub owner_id: i64,
    pub target: RecycleTarget,
    pub resource_name: String,
    pub original_path: String,
    pub reason: Option<String>,
    pub auto_delete_at: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, Default)]
pub struct RecycleFilter {
    pub resource_type: Option<ResourceType>,
    pub keyword: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RecycleItemInfo {
    pub id: i64,
    pub resource_type: ResourceType,
    pub resource_id: i64,
    pub resource_name: String,
    pub original_path: String,
    pub delete_reason: Option<String>,
    pub auto_delete_at: Option<String>,
    pub created_at: String,
}

impl TryFrom<RecycleItem> for RecycleItemInfo {
    type Error = AppError;

    fn try_from(item: RecycleItem) -> Result<Self, Self::Error> {
        Ok(Self {
            resource_type: item.resource_type.parse()?,
            id: item.id,
            resource_id: item.resource_id,
            resource_name: item.resource_name,
            original_path: item.original_path,
            delete_reason: item.delete_reason,
            auto_delete_at: item.auto_delete_at.map(to_iso),
            created_at: to_iso(item.created_at),
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PurgeReport {
    pub purged: usize,
    pub failed: usize,
}

/// Files a recycle bin entry. Must run inside the transaction that soft-deleted the target.
pub fn record(
    conn: &mut SqliteConnection,
    entry: RecycleEntry,
    now: NaiveDateTime,
) -> AppResult<RecycleItem> {
    let item = diesel::insert_into(recycle_items::table)
        .values(&NewRecycleItem {
            owner_id: entry.owner_id,
            resource_type: entry.target.resource_type().as_str().to_string(),
            resource_id: entry.target.resource_id(),
            resource_name: entry.resource_name,
            original_path: entry.original_path,
            original_parent_id: entry.target.original_parent_id(),
            delete_reason: entry
                .reason
                .map(|reason| reason.trim().to_string())
                .filter(|reason| !reason.is_empty()),
            auto_delete_at: entry.auto_delete_at,
            created_at: now,
        })
        .returning(RecycleItem::as_returning())
        .get_result(conn)?;
    Ok(item)
}

#[derive(Clone)]
pub struct RecycleBin {
    ctx: ServiceContext,
}

impl RecycleBin {
    pub fn new(ctx: ServiceContext) -> Self {
        Self { ctx }
    }

    /// The owner's entries, newest first.
    pub fn list(
        &self,
        owner_id: i64,
        filter: &RecycleFilter,
        page: PageRequest,
    ) -> AppResult<Page<RecycleItemInfo>> {
        let mut conn = self.ctx.db()?;

        let total: i64 = filtered(owner_id, filter)
            .count()
            .get_result(&mut conn)?;

        let rows: Vec<RecycleItem> = filtered(owner_id, filter)
            .order((recycle_items::created_at.desc(), recycle_items::id.desc()))
            .offset(page.offset())
            .limit(page.page_size)
            .load(&mut conn)?;

        let items = rows
            .into_iter()
            .map(RecycleItemInfo::try_from)
            .collect::<AppResult<Vec<_>>>()?;
        Ok(Page::new(items, total, page))
    }

    /// Brings the entity back to life and drops its entry.
    ///
    /// With no `target_folder_id` the entity returns to its original parent, or to the
    /// root when that parent is no longer live.
    pub fn restore(
        &self,
        owner_id: i64,
        recycle_id: i64,
        target_folder_id: Option<i64>,
    ) -> AppResult<()> {
        let now = self.ctx.now();
        let max_depth = self.ctx.settings.max_tree_depth;
        let mut conn = self.ctx.db()?;

        let (item, parent_id) = conn.immediate_transaction::<_, AppError, _>(|conn| {
            let item = find_item(conn, owner_id, recycle_id)?;
            let target = item.target()?;

            let parent_id = match target_folder_id {
                Some(folder_id) => {
                    find_live_folder(conn, owner_id, folder_id)?;
                    Some(folder_id)
                }
                None => match target.original_parent_id() {
                    Some(original) if is_live_folder(conn, owner_id, original)? => Some(original),
                    _ => None,
                },
            };

            match target {
                RecycleTarget::Document { document_id, .. } => {
                    reactivate_document(conn, owner_id, document_id, parent_id, now)?;
                }
                RecycleTarget::Folder { folder_id, .. } => {
                    if let Some(parent_id) = parent_id {
                        let descendants = gather_descendant_folder_ids(conn, folder_id, max_depth)?;
                        if descendants.contains(&parent_id) {
                            return Err(AppError::invalid_operation(
                                "cannot restore a folder into itself or one of its descendants",
                            ));
                        }
                    }
                    reactivate_folder(conn, owner_id, folder_id, parent_id, now)?;
                }
            }

            diesel::delete(recycle_items::table.find(item.id)).execute(conn)?;
            Ok((item, parent_id))
        })?;

        info!(
            owner_id,
            recycle_id,
            resource_type = %item.resource_type,
            resource_id = item.resource_id,
            parent_id = ?parent_id,
            "recycle item restored"
        );
        self.record_activity(&item, ActivityAction::Restore, "restored from recycle bin");
        Ok(())
    }

    pub fn delete_permanently(&self, owner_id: i64, recycle_id: i64) -> AppResult<()> {
        let mut conn = self.ctx.db()?;

        let item = conn.immediate_transaction::<_, AppError, _>(|conn| {
            let item = find_item(conn, owner_id, recycle_id)?;
            purge_item(conn, &item)?;
            Ok(item)
        })?;

        info!(owner_id, recycle_id, resource_id = item.resource_id, "recycle item purged");
        self.record_activity(&item, ActivityAction::Purge, "permanently deleted");
        Ok(())
    }

    /// Purges every listed entry the owner holds; other ids are skipped.
    pub fn delete_batch(&self, owner_id: i64, ids: &[i64]) -> AppResult<usize> {
        if ids.is_empty() {
            return Ok(0);
        }
        let mut conn = self.ctx.db()?;

        let items: Vec<RecycleItem> = recycle_items::table
            .filter(recycle_items::owner_id.eq(owner_id))
            .filter(recycle_items::id.eq_any(ids.to_vec()))
            .select(RecycleItem::as_select())
            .load(&mut conn)?;

        let mut purged = 0;
        for item in items {
            let outcome = conn.immediate_transaction::<_, AppError, _>(|conn| purge_item(conn, &item));
            match outcome {
                Ok(()) => {
                    purged += 1;
                    self.record_activity(&item, ActivityAction::Purge, "permanently deleted");
                }
                Err(err) => {
                    warn!(owner_id, recycle_id = item.id, error = %err, "batch purge skipped item");
                }
            }
        }

        info!(owner_id, requested = ids.len(), purged, "recycle batch purged");
        Ok(purged)
    }

    /// Purges every entry past its deadline, across all owners.
    pub fn purge_expired(&self) -> AppResult<PurgeReport> {
        let now = self.ctx.now();
        let mut conn = self.ctx.db()?;

        let due: Vec<RecycleItem> = recycle_items::table
            .filter(recycle_items::auto_delete_at.is_not_null())
            .filter(recycle_items::auto_delete_at.le(now))
            .order(recycle_items::auto_delete_at.asc())
            .select(RecycleItem::as_select())
            .load(&mut conn)?;

        let mut report = PurgeReport::default();
        for item in due {
            match conn.immediate_transaction::<_, AppError, _>(|conn| purge_item(conn, &item)) {
                Ok(()) => {
                    report.purged += 1;
                    self.record_activity(&item, ActivityAction::Purge, "retention elapsed");
                }
                Err(err) => {
                    report.failed += 1;
                    warn!(
                        owner_id = item.owner_id,
                        recycle_id = item.id,
                        error = %err,
                        "failed to purge expired recycle item"
                    );
                }
            }
        }
        Ok(report)
    }

    fn record_activity(&self, item: &RecycleItem, action: ActivityAction, description: &str) {
        let resource_type = match item.resource_type.parse::<ResourceType>() {
            Ok(resource_type) => resource_type,
            Err(_) => return,
        };
        self.ctx.record_activity(
            item.owner_id,
            action,
            resource_type,
            item.resource_id,
            &item.resource_name,
            description,
        );
    }
}

fn filtered(owner_id: i64, filter: &RecycleFilter) -> recycle_items::BoxedQuery<'static, Sqlite> {
    let mut query = recycle_items::table
        .filter(recycle_items::owner_id.eq(owner_id))
        .into_boxed();

    if let Some(resource_type) = filter.resource_type {
        query = query.filter(recycle_items::resource_type.eq(resource_type.as_str()));
    }
    if let Some(keyword) = filter.keyword.as_deref().filter(|kw| !kw.is_empty()) {
        query = query.filter(instr(recycle_items::resource_name, keyword.to_string()).gt(0));
    }
    query
}

fn find_item(
    conn: &mut SqliteConnection,
    owner_id: i64,
    recycle_id: i64,
) -> AppResult<RecycleItem> {
    let item = recycle_items::table
        .filter(recycle_items::id.eq(recycle_id))
        .filter(recycle_items::owner_id.eq(owner_id))
        .select(RecycleItem::as_select())
        .first(conn)?;
    Ok(item)
}

/// Hard-deletes the entity behind an entry, then the entry itself.
fn purge_item(conn: &mut SqliteConnection, item: &RecycleItem) -> AppResult<()> {
    match item.target()? {
        RecycleTarget::Document { document_id, .. } => {
            purge_document(conn, item.owner_id, document_id)?;
        }
        RecycleTarget::Folder { folder_id, .. } => {
            purge_folder(conn, item.owner_id, folder_id)?;
        }
    }
    diesel::delete(recycle_items::table.find(item.id)).execute(conn)?;
    Ok(())
}
