use std::collections::HashMap;

use diesel::dsl::exists;
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use serde::Serialize;
use tracing::info;

use super::documents::DocumentSummary;
use super::recycle::{self, RecycleEntry};
use super::ServiceContext;
use crate::error::{AppError, AppResult};
use crate::models::{
    ActivityAction, Document, Folder, NewFolder, RecycleItem, RecycleTarget, ResourceType,
};
use crate::schema::{documents, folders};
use crate::utils::time::to_iso;

pub const MAX_FOLDER_NAME_LEN: usize = 100;

#[derive(Debug, Clone, Serialize)]
pub struct FolderInfo {
    pub id: i64,
    pub name: String,
    pub parent_id: Option<i64>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Folder> for FolderInfo {
    fn from(folder: Folder) -> Self {
        Self {
            id: folder.id,
            name: folder.name,
            parent_id: folder.parent_id,
            created_at: to_iso(folder.created_at),
            updated_at: to_iso(folder.updated_at),
        }
    }
}

/// A live folder with its live subfolders and the live documents filed directly in it.
#[derive(Debug, Clone, Serialize)]
pub struct FolderNode {
    #[serde(flatten)]
    pub folder: FolderInfo,
    pub children: Vec<FolderNode>,
    pub documents: Vec<DocumentSummary>,
}

#[derive(Clone)]
pub struct FolderService {
    ctx: ServiceContext,
}

impl FolderService {
    pub fn new(ctx: ServiceContext) -> Self {
        Self { ctx }
    }

    pub fn create(&self, owner_id: i64, name: &str, parent_id: Option<i64>) -> AppResult<Folder> {
        let name = normalize_name(name)?;
        let now = self.ctx.now();
        let mut conn = self.ctx.db()?;

        let folder = conn.immediate_transaction::<_, AppError, _>(|conn| {
            if let Some(parent_id) = parent_id {
                find_live_folder(conn, owner_id, parent_id)?;
            }
            if sibling_name_taken(conn, owner_id, parent_id, &name, None)? {
                return Err(AppError::conflict(format!(
                    "a folder named '{name}' already exists here"
                )));
            }

            let folder = diesel::insert_into(folders::table)
                .values(&NewFolder {
                    owner_id,
                    name: name.clone(),
                    parent_id,
                    created_at: now,
                    updated_at: now,
                })
                .returning(Folder::as_returning())
                .get_result(conn)?;
            Ok(folder)
        })?;

        info!(owner_id, folder_id = folder.id, name = %folder.name, "folder created");
        self.ctx.record_activity(
            owner_id,
            ActivityAction::Create,
            ResourceType::Folder,
            folder.id,
            &folder.name,
            "created folder",
        );
        Ok(folder)
    }

    pub fn get(&self, owner_id: i64, folder_id: i64) -> AppResult<Folder> {
        let mut conn = self.ctx.db()?;
        find_live_folder(&mut conn, owner_id, folder_id)
    }

    pub fn rename(&self, owner_id: i64, folder_id: i64, new_name: &str) -> AppResult<()> {
        let name = normalize_name(new_name)?;
        let now = self.ctx.now();
        let mut conn = self.ctx.db()?;

        let previous = conn.immediate_transaction::<_, AppError, _>(|conn| {
            let folder = find_live_folder(conn, owner_id, folder_id)?;
            if folder.name == name {
                return Ok(None);
            }
            if sibling_name_taken(conn, owner_id, folder.parent_id, &name, Some(folder_id))? {
                return Err(AppError::conflict(format!(
                    "a folder named '{name}' already exists here"
                )));
            }

            diesel::update(folders::table.find(folder_id))
                .set((folders::name.eq(&name), folders::updated_at.eq(now)))
                .execute(conn)?;
            Ok(Some(folder.name))
        })?;

        if let Some(previous) = previous {
            info!(owner_id, folder_id, from = %previous, to = %name, "folder renamed");
            self.ctx.record_activity(
                owner_id,
                ActivityAction::Update,
                ResourceType::Folder,
                folder_id,
                &name,
                format!("renamed from '{previous}'"),
            );
        }
        Ok(())
    }

    /// Reparents a folder; `None` moves it to the root.
    pub fn move_folder(
        &self,
        owner_id: i64,
        folder_id: i64,
        new_parent_id: Option<i64>,
    ) -> AppResult<()> {
        let now = self.ctx.now();
        let max_depth = self.ctx.settings.max_tree_depth;
        let mut conn = self.ctx.db()?;

        let moved = conn.immediate_transaction::<_, AppError, _>(|conn| {
            let folder = find_live_folder(conn, owner_id, folder_id)?;

            if let Some(target_id) = new_parent_id {
                find_live_folder(conn, owner_id, target_id)?;
                let descendants = gather_descendant_folder_ids(conn, folder_id, max_depth)?;
                if descendants.contains(&target_id) {
                    return Err(AppError::invalid_operation(
                        "cannot move a folder into itself or one of its descendants",
                    ));
                }
            }

            if folder.parent_id == new_parent_id {
                return Ok(None);
            }
            if sibling_name_taken(conn, owner_id, new_parent_id, &folder.name, Some(folder_id))? {
                return Err(AppError::conflict(format!(
                    "a folder named '{}' already exists in the target",
                    folder.name
                )));
            }

            diesel::update(folders::table.find(folder_id))
                .set((
                    folders::parent_id.eq(new_parent_id),
                    folders::updated_at.eq(now),
                ))
                .execute(conn)?;
            Ok(Some(folder.name))
        })?;

        if let Some(name) = moved {
            info!(owner_id, folder_id, new_parent_id = ?new_parent_id, "folder moved");
            self.ctx.record_activity(
                owner_id,
                ActivityAction::Move,
                ResourceType::Folder,
                folder_id,
                &name,
                match new_parent_id {
                    Some(parent) => format!("moved into folder {parent}"),
                    None => "moved to root".to_string(),
                },
            );
        }
        Ok(())
    }

    /// Soft-deletes an empty folder and files a recycle bin entry for it.
    pub fn delete(
        &self,
        owner_id: i64,
        folder_id: i64,
        reason: Option<&str>,
    ) -> AppResult<RecycleItem> {
        let now = self.ctx.now();
        let auto_delete_at = self.ctx.auto_delete_at(now);
        let max_depth = self.ctx.settings.max_tree_depth;
        let mut conn = self.ctx.db()?;

        let item = conn.immediate_transaction::<_, AppError, _>(|conn| {
            let folder = find_live_folder(conn, owner_id, folder_id)?;

            let has_child_folders: bool = diesel::select(exists(
                folders::table
                    .filter(folders::parent_id.eq(folder_id))
                    .filter(folders::deleted_at.is_null()),
            ))
            .get_result(conn)?;
            if has_child_folders {
                return Err(AppError::conflict("folder must be empty before deletion"));
            }

            let has_documents: bool = diesel::select(exists(
                documents::table
                    .filter(documents::folder_id.eq(folder_id))
                    .filter(documents::deleted_at.is_null()),
            ))
            .get_result(conn)?;
            if has_documents {
                return Err(AppError::conflict("folder must be empty before deletion"));
            }

            let original_path = folder_path(conn, owner_id, folder.parent_id, max_depth)?;

            diesel::update(folders::table.find(folder_id))
                .set((
                    folders::deleted_at.eq(Some(now)),
                    folders::updated_at.eq(now),
                ))
                .execute(conn)?;

            recycle::record(
                conn,
                RecycleEntry {
                    owner_id,
                    target: RecycleTarget::Folder {
                        folder_id,
                        parent_id: folder.parent_id,
                    },
                    resource_name: folder.name,
                    original_path,
                    reason: reason.map(str::to_string),
                    auto_delete_at,
                },
                now,
            )
        })?;

        info!(owner_id, folder_id, recycle_id = item.id, "folder moved to recycle bin");
        self.ctx.record_activity(
            owner_id,
            ActivityAction::Delete,
            ResourceType::Folder,
            folder_id,
            &item.resource_name,
            "moved to recycle bin",
        );
        Ok(item)
    }

    /// Builds the owner's live hierarchy, siblings ordered by name.
    pub fn get_tree(&self, owner_id: i64) -> AppResult<Vec<FolderNode>> {
        let mut conn = self.ctx.db()?;

        let live_folders: Vec<Folder> = folders::table
            .filter(folders::owner_id.eq(owner_id))
            .filter(folders::deleted_at.is_null())
            .order((folders::name.asc(), folders::id.asc()))
            .select(Folder::as_select())
            .load(&mut conn)?;

        let filed_documents: Vec<Document> = documents::table
            .filter(documents::owner_id.eq(owner_id))
            .filter(documents::deleted_at.is_null())
            .filter(documents::folder_id.is_not_null())
            .order((documents::title.asc(), documents::id.asc()))
            .select(Document::as_select())
            .load(&mut conn)?;
        drop(conn);

        let mut children: HashMap<Option<i64>, Vec<Folder>> = HashMap::new();
        for folder in live_folders {
            children.entry(folder.parent_id).or_default().push(folder);
        }

        let mut documents_by_folder: HashMap<i64, Vec<DocumentSummary>> = HashMap::new();
        for doc in filed_documents {
            if let Some(folder_id) = doc.folder_id {
                documents_by_folder
                    .entry(folder_id)
                    .or_default()
                    .push(DocumentSummary::try_from(doc)?);
            }
        }

        let roots = children.remove(&None).unwrap_or_default();
        let mut tree = Vec::with_capacity(roots.len());
        for root in roots {
            tree.push(build_node(
                root,
                &mut children,
                &mut documents_by_folder,
                1,
                self.ctx.settings.max_tree_depth,
            )?);
        }
        Ok(tree)
    }

    /// Direct live subfolders of `parent_id`, or of the root when `None`.
    pub fn get_children(&self, owner_id: i64, parent_id: Option<i64>) -> AppResult<Vec<Folder>> {
        let mut conn = self.ctx.db()?;

        let query = folders::table
            .filter(folders::owner_id.eq(owner_id))
            .filter(folders::deleted_at.is_null())
            .order((folders::name.asc(), folders::id.asc()))
            .select(Folder::as_select());

        let children = match parent_id {
            Some(parent_id) => {
                find_live_folder(&mut conn, owner_id, parent_id)?;
                query
                    .filter(folders::parent_id.eq(parent_id))
                    .load(&mut conn)?
            }
            None => query.filter(folders::parent_id.is_null()).load(&mut conn)?,
        };
        Ok(children)
    }
}

fn build_node(
    folder: Folder,
    children: &mut HashMap<Option<i64>, Vec<Folder>>,
    documents_by_folder: &mut HashMap<i64, Vec<DocumentSummary>>,
    depth: usize,
    max_depth: usize,
) -> AppResult<FolderNode> {
    if depth > max_depth {
        return Err(AppError::invalid_operation(format!(
            "folder hierarchy is deeper than {max_depth} levels"
        )));
    }

    let folder_id = folder.id;
    let kids = children.remove(&Some(folder_id)).unwrap_or_default();
    let mut nodes = Vec::with_capacity(kids.len());
    for kid in kids {
        nodes.push(build_node(kid, children, documents_by_folder, depth + 1, max_depth)?);
    }

    Ok(FolderNode {
        folder: folder.into(),
        children: nodes,
        documents: documents_by_folder.remove(&folder_id).unwrap_or_default(),
    })
}

/// Trims a folder name and rejects empty, overlong, or slash-containing names.
pub fn normalize_name(raw: &str) -> AppResult<String> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(AppError::invalid_operation("folder name must not be empty"));
    }
    if name.chars().count() > MAX_FOLDER_NAME_LEN {
        return Err(AppError::invalid_operation(format!(
            "folder name must be at most {MAX_FOLDER_NAME_LEN} characters"
        )));
    }
    if name.contains('/') {
        return Err(AppError::invalid_operation("folder name must not contain '/'"));
    }
    Ok(name.to_string())
}

pub(crate) fn find_live_folder(
    conn: &mut SqliteConnection,
    owner_id: i64,
    folder_id: i64,
) -> AppResult<Folder> {
    let folder = folders::table
        .filter(folders::id.eq(folder_id))
        .filter(folders::owner_id.eq(owner_id))
        .filter(folders::deleted_at.is_null())
        .select(Folder::as_select())
        .first(conn)?;
    Ok(folder)
}

pub(crate) fn is_live_folder(
    conn: &mut SqliteConnection,
    owner_id: i64,
    folder_id: i64,
) -> AppResult<bool> {
    let live = diesel::select(exists(
        folders::table
            .filter(folders::id.eq(folder_id))
            .filter(folders::owner_id.eq(owner_id))
            .filter(folders::deleted_at.is_null()),
    ))
    .get_result(conn)?;
    Ok(live)
}

fn sibling_name_taken(
    conn: &mut SqliteConnection,
    owner_id: i64,
    parent_id: Option<i64>,
    name: &str,
    exclude: Option<i64>,
) -> AppResult<bool> {
    let mut query = folders::table
        .select(folders::id)
        .filter(folders::owner_id.eq(owner_id))
        .filter(folders::name.eq(name))
        .filter(folders::deleted_at.is_null())
        .into_boxed();

    query = match parent_id {
        Some(parent_id) => query.filter(folders::parent_id.eq(parent_id)),
        None => query.filter(folders::parent_id.is_null()),
    };
    if let Some(exclude) = exclude {
        query = query.filter(folders::id.ne(exclude));
    }

    let hit: Option<i64> = query.first(conn).optional()?;
    Ok(hit.is_some())
}

/// The folder itself plus every folder below it, live or not.
pub(crate) fn gather_descendant_folder_ids(
    conn: &mut SqliteConnection,
    folder_id: i64,
    max_depth: usize,
) -> AppResult<Vec<i64>> {
    let mut ids = vec![folder_id];
    let mut level = vec![folder_id];
    let mut depth = 0;

    while !level.is_empty() {
        depth += 1;
        if depth > max_depth {
            return Err(AppError::invalid_operation(format!(
                "folder hierarchy is deeper than {max_depth} levels"
            )));
        }
        let child_ids: Vec<i64> = folders::table
            .filter(folders::parent_id.eq_any(level.clone()))
            .select(folders::id)
            .load(conn)?;
        ids.extend(child_ids.iter().copied());
        level = child_ids;
    }

    Ok(ids)
}

/// Slash-joined names from the root down to `folder_id`; `/` for the root itself.
pub(crate) fn folder_path(
    conn: &mut SqliteConnection,
    owner_id: i64,
    folder_id: Option<i64>,
    max_depth: usize,
) -> AppResult<String> {
    let mut names = Vec::new();
    let mut cursor = folder_id;

    while let Some(current) = cursor {
        if names.len() >= max_depth {
            return Err(AppError::invalid_operation(format!(
                "folder hierarchy is deeper than {max_depth} levels"
            )));
        }
        let row: Option<(String, Option<i64>)> = folders::table
            .filter(folders::id.eq(current))
            .filter(folders::owner_id.eq(owner_id))
            .select((folders::name, folders::parent_id))
            .first(conn)
            .optional()?;
        let Some((name, parent_id)) = row else {
            break;
        };
        names.push(name);
        cursor = parent_id;
    }

    if names.is_empty() {
        return Ok("/".to_string());
    }
    names.reverse();
    Ok(format!("/{}", names.join("/")))
}

/// Brings a soft-deleted folder back under `parent_id`.
pub(crate) fn reactivate_folder(
    conn: &mut SqliteConnection,
    owner_id: i64,
    folder_id: i64,
    parent_id: Option<i64>,
    now: chrono::NaiveDateTime,
) -> AppResult<Folder> {
    let folder: Folder = folders::table
        .filter(folders::id.eq(folder_id))
        .filter(folders::owner_id.eq(owner_id))
        .filter(folders::deleted_at.is_not_null())
        .select(Folder::as_select())
        .first(conn)?;

    if sibling_name_taken(conn, owner_id, parent_id, &folder.name, Some(folder_id))? {
        return Err(AppError::conflict(format!(
            "a folder named '{}' already exists in the restore location",
            folder.name
        )));
    }

    let restored = diesel::update(folders::table.find(folder_id))
        .set((
            folders::deleted_at.eq(None::<chrono::NaiveDateTime>),
            folders::parent_id.eq(parent_id),
            folders::updated_at.eq(now),
        ))
        .returning(Folder::as_returning())
        .get_result(conn)?;
    Ok(restored)
}

/// Hard-deletes a soft-deleted folder row. Returns the number of rows removed.
pub(crate) fn purge_folder(
    conn: &mut SqliteConnection,
    owner_id: i64,
    folder_id: i64,
) -> AppResult<usize> {
    let removed = diesel::delete(
        folders::table
            .filter(folders::id.eq(folder_id))
            .filter(folders::owner_id.eq(owner_id))
            .filter(folders::deleted_at.is_not_null()),
    )
    .execute(conn)?;
    Ok(removed)
}
