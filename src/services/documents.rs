use std::collections::BTreeMap;

use chrono::{Duration, NaiveDateTime};
use diesel::dsl::count_star;
use diesel::prelude::*;
use diesel::sqlite::{Sqlite, SqliteConnection};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::activities::{self, ActivityInfo, DailyActivity};
use super::folders::{find_live_folder, folder_path};
use super::recycle::{self, RecycleEntry};
use super::{instr, ServiceContext};
use crate::error::{AppError, AppResult};
use crate::models::{
    ActivityAction, Document, DocumentStatus, DocumentType, NewDocument, RecycleItem,
    RecycleTarget, ResourceType,
};
use crate::pagination::{Page, PageRequest};
use crate::schema::{documents, recycle_items};
use crate::utils::json::nullable;
use crate::utils::time::to_iso;
use crate::workers::ViewIncrement;

pub const MAX_TITLE_LEN: usize = 255;
pub const MIN_SHARE_HOURS: i64 = 1;
pub const MAX_SHARE_HOURS: i64 = 24 * 365;
pub const COPY_SUFFIX: &str = " - Copy";
pub const DASHBOARD_RECENT_DOCUMENTS: i64 = 5;
pub const DASHBOARD_RECENT_ACTIVITIES: i64 = 10;
pub const DASHBOARD_DAYS: i64 = 7;

#[derive(Debug, Clone, Deserialize)]
pub struct CreateDocument {
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(rename = "type")]
    pub doc_type: DocumentType,
    #[serde(default)]
    pub folder_id: Option<i64>,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Partial update; only present fields are written. `folder_id: null` files the document at root.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DocumentChanges {
    pub title: Option<String>,
    pub content: Option<String>,
    pub status: Option<DocumentStatus>,
    #[serde(default, deserialize_with = "nullable")]
    pub folder_id: Option<Option<i64>>,
    pub tags: Option<Vec<String>>,
}

impl DocumentChanges {
    fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.content.is_none()
            && self.status.is_none()
            && self.folder_id.is_none()
            && self.tags.is_none()
    }
}

#[derive(Debug, Clone, Default)]
pub struct DocumentFilter {
    pub doc_type: Option<DocumentType>,
    pub status: Option<DocumentStatus>,
    pub folder_id: Option<i64>,
    pub keyword: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DocumentSummary {
    pub id: i64,
    pub title: String,
    #[serde(rename = "type")]
    pub doc_type: DocumentType,
    pub status: DocumentStatus,
    pub folder_id: Option<i64>,
    pub tags: Vec<String>,
    pub size: i64,
    pub view_count: i64,
    pub is_shared: bool,
    pub share_expiry: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl TryFrom<Document> for DocumentSummary {
    type Error = AppError;

    fn try_from(doc: Document) -> Result<Self, Self::Error> {
        Ok(Self {
            tags: doc.tag_list()?,
            doc_type: doc.kind()?,
            status: doc.state()?,
            id: doc.id,
            title: doc.title,
            folder_id: doc.folder_id,
            size: doc.size,
            view_count: doc.view_count,
            is_shared: doc.is_shared,
            share_expiry: doc.share_expiry.map(to_iso),
            created_at: to_iso(doc.created_at),
            updated_at: to_iso(doc.updated_at),
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DocumentDetail {
    #[serde(flatten)]
    pub summary: DocumentSummary,
    pub content: String,
}

impl TryFrom<Document> for DocumentDetail {
    type Error = AppError;

    fn try_from(mut doc: Document) -> Result<Self, Self::Error> {
        let content = std::mem::take(&mut doc.content);
        Ok(Self {
            summary: DocumentSummary::try_from(doc)?,
            content,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShareGrant {
    pub document_id: i64,
    pub token: String,
    pub expires_at: NaiveDateTime,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WorkspaceStats {
    pub total_documents: i64,
    pub draft_documents: i64,
    pub published_documents: i64,
    pub archived_documents: i64,
    pub recycle_items: i64,
    pub total_activities: i64,
    pub today_activities: i64,
    pub week_activities: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Dashboard {
    pub stats: WorkspaceStats,
    pub recent_documents: Vec<DocumentSummary>,
    pub recent_activities: Vec<ActivityInfo>,
    /// Live documents per stored type.
    pub documents_by_type: BTreeMap<String, i64>,
    pub activities_by_day: Vec<DailyActivity>,
}

#[derive(AsChangeset)]
#[diesel(table_name = documents)]
struct DocumentChangeset {
    title: Option<String>,
    content: Option<String>,
    size: Option<i64>,
    status: Option<String>,
    folder_id: Option<Option<i64>>,
    tags: Option<String>,
    updated_at: NaiveDateTime,
}

#[derive(Clone)]
pub struct DocumentService {
    ctx: ServiceContext,
}

impl DocumentService {
    pub fn new(ctx: ServiceContext) -> Self {
        Self { ctx }
    }

    pub fn create(&self, owner_id: i64, input: CreateDocument) -> AppResult<Document> {
        let title = normalize_title(&input.title)?;
        let tags = encode_tags(normalize_tags(input.tags))?;
        let now = self.ctx.now();
        let mut conn = self.ctx.db()?;

        let document = conn.immediate_transaction::<_, AppError, _>(|conn| {
            if let Some(folder_id) = input.folder_id {
                find_live_folder(conn, owner_id, folder_id)?;
            }

            let document = diesel::insert_into(documents::table)
                .values(&NewDocument {
                    owner_id,
                    size: input.content.len() as i64,
                    title,
                    content: input.content,
                    doc_type: input.doc_type.as_str().to_string(),
                    status: DocumentStatus::Draft.as_str().to_string(),
                    folder_id: input.folder_id,
                    tags,
                    created_at: now,
                    updated_at: now,
                })
                .returning(Document::as_returning())
                .get_result(conn)?;
            Ok(document)
        })?;

        info!(owner_id, document_id = document.id, folder_id = ?document.folder_id, "document created");
        self.ctx.record_activity(
            owner_id,
            ActivityAction::Create,
            ResourceType::Document,
            document.id,
            &document.title,
            format!("created {} document", document.doc_type),
        );
        Ok(document)
    }

    /// Reads a live document and queues a view-count increment.
    pub fn get(&self, owner_id: i64, document_id: i64) -> AppResult<DocumentDetail> {
        let mut conn = self.ctx.db()?;
        let document = find_live_document(&mut conn, owner_id, document_id)?;
        drop(conn);

        self.ctx.views.submit(ViewIncrement { document_id });
        DocumentDetail::try_from(document)
    }

    pub fn update(
        &self,
        owner_id: i64,
        document_id: i64,
        changes: DocumentChanges,
    ) -> AppResult<Document> {
        if changes.is_empty() {
            return Err(AppError::invalid_operation("no changes provided"));
        }
        let title = changes.title.as_deref().map(normalize_title).transpose()?;
        let tags = changes
            .tags
            .map(|tags| encode_tags(normalize_tags(tags)))
            .transpose()?;
        let now = self.ctx.now();
        let mut conn = self.ctx.db()?;

        let (before, after) = conn.immediate_transaction::<_, AppError, _>(|conn| {
            let before = find_live_document(conn, owner_id, document_id)?;
            if let Some(Some(folder_id)) = changes.folder_id {
                find_live_folder(conn, owner_id, folder_id)?;
            }

            let changeset = DocumentChangeset {
                title,
                size: changes.content.as_ref().map(|content| content.len() as i64),
                content: changes.content,
                status: changes.status.map(|status| status.as_str().to_string()),
                folder_id: changes.folder_id,
                tags,
                updated_at: now,
            };

            let after = diesel::update(documents::table.find(document_id))
                .set(&changeset)
                .returning(Document::as_returning())
                .get_result(conn)?;
            Ok((before, after))
        })?;

        info!(owner_id, document_id, "document updated");
        self.ctx.record_activity(
            owner_id,
            ActivityAction::Update,
            ResourceType::Document,
            document_id,
            &after.title,
            "updated document",
        );
        if before.folder_id != after.folder_id {
            self.ctx.record_activity(
                owner_id,
                ActivityAction::Move,
                ResourceType::Document,
                document_id,
                &after.title,
                match after.folder_id {
                    Some(folder_id) => format!("moved into folder {folder_id}"),
                    None => "moved to root".to_string(),
                },
            );
        }
        Ok(after)
    }

    /// Soft-deletes a document and files a recycle bin entry for it.
    pub fn delete(
        &self,
        owner_id: i64,
        document_id: i64,
        reason: Option<&str>,
    ) -> AppResult<RecycleItem> {
        let now = self.ctx.now();
        let auto_delete_at = self.ctx.auto_delete_at(now);
        let max_depth = self.ctx.settings.max_tree_depth;
        let mut conn = self.ctx.db()?;

        let item = conn.immediate_transaction::<_, AppError, _>(|conn| {
            let document = find_live_document(conn, owner_id, document_id)?;
            let original_path = folder_path(conn, owner_id, document.folder_id, max_depth)?;

            diesel::update(documents::table.find(document_id))
                .set((
                    documents::deleted_at.eq(Some(now)),
                    documents::updated_at.eq(now),
                ))
                .execute(conn)?;

            recycle::record(
                conn,
                RecycleEntry {
                    owner_id,
                    target: RecycleTarget::Document {
                        document_id,
                        folder_id: document.folder_id,
                    },
                    resource_name: document.title,
                    original_path,
                    reason: reason.map(str::to_string),
                    auto_delete_at,
                },
                now,
            )
        })?;

        info!(owner_id, document_id, recycle_id = item.id, "document moved to recycle bin");
        self.ctx.record_activity(
            owner_id,
            ActivityAction::Delete,
            ResourceType::Document,
            document_id,
            &item.resource_name,
            "moved to recycle bin",
        );
        Ok(item)
    }

    /// Live documents matching every present filter, most recently updated first.
    pub fn list(
        &self,
        owner_id: i64,
        filter: &DocumentFilter,
        page: PageRequest,
    ) -> AppResult<Page<DocumentSummary>> {
        let mut conn = self.ctx.db()?;

        let total: i64 = filtered(owner_id, filter)
            .count()
            .get_result(&mut conn)?;

        let rows: Vec<Document> = filtered(owner_id, filter)
            .order((documents::updated_at.desc(), documents::id.desc()))
            .offset(page.offset())
            .limit(page.page_size)
            .load(&mut conn)?;

        let items = rows
            .into_iter()
            .map(DocumentSummary::try_from)
            .collect::<AppResult<Vec<_>>>()?;
        Ok(Page::new(items, total, page))
    }

    /// Duplicates a live document into the same folder as a fresh draft.
    pub fn copy(&self, owner_id: i64, document_id: i64) -> AppResult<Document> {
        let now = self.ctx.now();
        let mut conn = self.ctx.db()?;

        let (source_id, copy) = conn.immediate_transaction::<_, AppError, _>(|conn| {
            let source = find_live_document(conn, owner_id, document_id)?;
            let copy = diesel::insert_into(documents::table)
                .values(&NewDocument {
                    owner_id,
                    title: copy_title(&source.title),
                    size: source.content.len() as i64,
                    content: source.content,
                    doc_type: source.doc_type,
                    status: DocumentStatus::Draft.as_str().to_string(),
                    folder_id: source.folder_id,
                    tags: source.tags,
                    created_at: now,
                    updated_at: now,
                })
                .returning(Document::as_returning())
                .get_result(conn)?;
            Ok((source.id, copy))
        })?;

        info!(owner_id, source_id, document_id = copy.id, "document copied");
        self.ctx.record_activity(
            owner_id,
            ActivityAction::Copy,
            ResourceType::Document,
            copy.id,
            &copy.title,
            format!("copied from document {source_id}"),
        );
        Ok(copy)
    }

    /// Mints a fresh share token, replacing any previous one.
    pub fn share(&self, owner_id: i64, document_id: i64, expiry_hours: i64) -> AppResult<ShareGrant> {
        if !(MIN_SHARE_HOURS..=MAX_SHARE_HOURS).contains(&expiry_hours) {
            return Err(AppError::invalid_operation(format!(
                "expiry_hours must be between {MIN_SHARE_HOURS} and {MAX_SHARE_HOURS}"
            )));
        }
        let now = self.ctx.now();
        let expires_at = now + Duration::hours(expiry_hours);
        let token = generate_share_token();
        let mut conn = self.ctx.db()?;

        let title = conn.immediate_transaction::<_, AppError, _>(|conn| {
            let document = find_live_document(conn, owner_id, document_id)?;
            diesel::update(documents::table.find(document_id))
                .set((
                    documents::is_shared.eq(true),
                    documents::share_token.eq(token.as_str()),
                    documents::share_expiry.eq(Some(expires_at)),
                ))
                .execute(conn)?;
            Ok(document.title)
        })?;

        info!(owner_id, document_id, expiry_hours, "document shared");
        self.ctx.record_activity(
            owner_id,
            ActivityAction::Share,
            ResourceType::Document,
            document_id,
            &title,
            format!("shared for {expiry_hours} hours"),
        );
        Ok(ShareGrant {
            document_id,
            token,
            expires_at,
        })
    }

    /// Public read through a share token. Counts as a view.
    pub fn resolve_share(&self, token: &str) -> AppResult<DocumentDetail> {
        let token = token.trim();
        if token.is_empty() {
            return Err(AppError::not_found());
        }
        let now = self.ctx.now();
        let mut conn = self.ctx.db()?;

        let document: Document = documents::table
            .filter(documents::share_token.eq(token))
            .filter(documents::is_shared.eq(true))
            .filter(documents::deleted_at.is_null())
            .select(Document::as_select())
            .first(&mut conn)?;
        drop(conn);

        match document.share_expiry {
            Some(expiry) if expiry > now => {}
            _ => return Err(AppError::expired()),
        }

        self.ctx.views.submit(ViewIncrement {
            document_id: document.id,
        });
        DocumentDetail::try_from(document)
    }

    pub fn stats(&self, owner_id: i64) -> AppResult<WorkspaceStats> {
        let now = self.ctx.now();
        let mut conn = self.ctx.db()?;
        workspace_stats(&mut conn, owner_id, now)
    }

    /// Stats plus the most recent documents and activity, for the workspace landing page.
    pub fn dashboard(&self, owner_id: i64) -> AppResult<Dashboard> {
        let now = self.ctx.now();
        let mut conn = self.ctx.db()?;

        let stats = workspace_stats(&mut conn, owner_id, now)?;

        let recent: Vec<Document> = live(owner_id)
            .order((documents::updated_at.desc(), documents::id.desc()))
            .limit(DASHBOARD_RECENT_DOCUMENTS)
            .load(&mut conn)?;
        let recent_documents = recent
            .into_iter()
            .map(DocumentSummary::try_from)
            .collect::<AppResult<Vec<_>>>()?;

        let by_type: Vec<(String, i64)> = documents::table
            .filter(documents::owner_id.eq(owner_id))
            .filter(documents::deleted_at.is_null())
            .group_by(documents::doc_type)
            .select((documents::doc_type, count_star()))
            .load(&mut conn)?;

        Ok(Dashboard {
            stats,
            recent_documents,
            recent_activities: activities::recent(
                &mut conn,
                owner_id,
                DASHBOARD_RECENT_ACTIVITIES,
            )?,
            documents_by_type: by_type.into_iter().collect(),
            activities_by_day: activities::daily(&mut conn, owner_id, now, DASHBOARD_DAYS)?,
        })
    }
}

fn workspace_stats(
    conn: &mut SqliteConnection,
    owner_id: i64,
    now: NaiveDateTime,
) -> AppResult<WorkspaceStats> {
    let by_status: Vec<(String, i64)> = documents::table
        .filter(documents::owner_id.eq(owner_id))
        .filter(documents::deleted_at.is_null())
        .group_by(documents::status)
        .select((documents::status, count_star()))
        .load(conn)?;

    let recycle_items: i64 = recycle_items::table
        .filter(recycle_items::owner_id.eq(owner_id))
        .count()
        .get_result(conn)?;

    let activity = activities::counters(conn, owner_id, now)?;

    let mut stats = WorkspaceStats {
        recycle_items,
        total_activities: activity.total,
        today_activities: activity.today,
        week_activities: activity.this_week,
        ..WorkspaceStats::default()
    };
    for (status, count) in by_status {
        stats.total_documents += count;
        match status.parse::<DocumentStatus>()? {
            DocumentStatus::Draft => stats.draft_documents += count,
            DocumentStatus::Published => stats.published_documents += count,
            DocumentStatus::Archived => stats.archived_documents += count,
        }
    }
    Ok(stats)
}

fn live(owner_id: i64) -> documents::BoxedQuery<'static, Sqlite> {
    documents::table
        .filter(documents::owner_id.eq(owner_id))
        .filter(documents::deleted_at.is_null())
        .into_boxed()
}

fn filtered(owner_id: i64, filter: &DocumentFilter) -> documents::BoxedQuery<'static, Sqlite> {
    let mut query = live(owner_id);

    if let Some(doc_type) = filter.doc_type {
        query = query.filter(documents::doc_type.eq(doc_type.as_str()));
    }
    if let Some(status) = filter.status {
        query = query.filter(documents::status.eq(status.as_str()));
    }
    if let Some(folder_id) = filter.folder_id {
        query = query.filter(documents::folder_id.eq(folder_id));
    }
    if let Some(keyword) = filter.keyword.as_deref().filter(|kw| !kw.is_empty()) {
        query = query.filter(instr(documents::title, keyword.to_string()).gt(0));
    }
    query
}

pub fn normalize_title(raw: &str) -> AppResult<String> {
    let title = raw.trim();
    if title.is_empty() {
        return Err(AppError::invalid_operation("title must not be empty"));
    }
    if title.chars().count() > MAX_TITLE_LEN {
        return Err(AppError::invalid_operation(format!(
            "title must be at most {MAX_TITLE_LEN} characters"
        )));
    }
    Ok(title.to_string())
}

/// Appends the copy suffix, shortening the base so the result stays within the title limit.
pub fn copy_title(title: &str) -> String {
    let room = MAX_TITLE_LEN - COPY_SUFFIX.chars().count();
    let base: String = title.chars().take(room).collect();
    format!("{}{COPY_SUFFIX}", base.trim_end())
}

/// Trims tags and drops blanks and repeats, keeping first-seen order.
fn normalize_tags(tags: Vec<String>) -> Vec<String> {
    let mut seen = Vec::with_capacity(tags.len());
    for tag in tags {
        let tag = tag.trim();
        if !tag.is_empty() && !seen.iter().any(|existing: &String| existing == tag) {
            seen.push(tag.to_string());
        }
    }
    seen
}

fn encode_tags(tags: Vec<String>) -> AppResult<String> {
    Ok(serde_json::to_string(&tags)?)
}

/// 128 random bits from the OS, as 32 lowercase hex characters.
pub fn generate_share_token() -> String {
    let mut bytes = [0u8; 16];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

pub(crate) fn find_live_document(
    conn: &mut SqliteConnection,
    owner_id: i64,
    document_id: i64,
) -> AppResult<Document> {
    let document = documents::table
        .filter(documents::id.eq(document_id))
        .filter(documents::owner_id.eq(owner_id))
        .filter(documents::deleted_at.is_null())
        .select(Document::as_select())
        .first(conn)?;
    Ok(document)
}

/// Brings a soft-deleted document back into `folder_id`.
pub(crate) fn reactivate_document(
    conn: &mut SqliteConnection,
    owner_id: i64,
    document_id: i64,
    folder_id: Option<i64>,
    now: NaiveDateTime,
) -> AppResult<Document> {
    let restored = diesel::update(
        documents::table
            .filter(documents::id.eq(document_id))
            .filter(documents::owner_id.eq(owner_id))
            .filter(documents::deleted_at.is_not_null()),
    )
    .set((
        documents::deleted_at.eq(None::<NaiveDateTime>),
        documents::folder_id.eq(folder_id),
        documents::updated_at.eq(now),
    ))
    .returning(Document::as_returning())
    .get_result(conn)?;
    Ok(restored)
}

/// Hard-deletes a soft-deleted document row. Returns the number of rows removed.
pub(crate) fn purge_document(
    conn: &mut SqliteConnection,
    owner_id: i64,
    document_id: i64,
) -> AppResult<usize> {
    let removed = diesel::delete(
        documents::table
            .filter(documents::id.eq(document_id))
            .filter(documents::owner_id.eq(owner_id))
            .filter(documents::deleted_at.is_not_null()),
    )
    .execute(conn)?;
    Ok(removed)
}
