use std::fmt;
use std::str::FromStr;

use chrono::NaiveDateTime;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::schema::*;

#[derive(Debug, Clone, Queryable, Selectable, Identifiable)]
#[diesel(table_name = folders)]
pub struct Folder {
    pub id: i64,
    pub owner_id: i64,
    pub name: String,
    pub parent_id: Option<i64>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
    pub deleted_at: Option<NaiveDateTime>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = folders)]
pub struct NewFolder {
    pub owner_id: i64,
    pub name: String,
    pub parent_id: Option<i64>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Queryable, Selectable, Identifiable, Associations)]
#[diesel(table_name = documents)]
#[diesel(belongs_to(Folder, foreign_key = folder_id))]
pub struct Document {
    pub id: i64,
    pub owner_id: i64,
    pub title: String,
    pub content: String,
    pub doc_type: String,
    pub status: String,
    pub folder_id: Option<i64>,
    pub tags: String,
    pub size: i64,
    pub view_count: i64,
    pub is_shared: bool,
    pub share_token: Option<String>,
    pub share_expiry: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
    pub deleted_at: Option<NaiveDateTime>,
}

impl Document {
    pub fn tag_list(&self) -> AppResult<Vec<String>> {
        Ok(serde_json::from_str(&self.tags)?)
    }

    pub fn kind(&self) -> AppResult<DocumentType> {
        self.doc_type.parse()
    }

    pub fn state(&self) -> AppResult<DocumentStatus> {
        self.status.parse()
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = documents)]
pub struct NewDocument {
    pub owner_id: i64,
    pub title: String,
    pub content: String,
    pub doc_type: String,
    pub status: String,
    pub folder_id: Option<i64>,
    pub tags: String,
    pub size: i64,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Queryable, Selectable, Identifiable)]
#[diesel(table_name = recycle_items)]
pub struct RecycleItem {
    pub id: i64,
    pub owner_id: i64,
    pub resource_type: String,
    pub resource_id: i64,
    pub resource_name: String,
    pub original_path: String,
    pub original_parent_id: Option<i64>,
    pub delete_reason: Option<String>,
    pub auto_delete_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
}

impl RecycleItem {
    /// Decodes the stored discriminator into the entity this tombstone points at.
    pub fn target(&self) -> AppResult<RecycleTarget> {
        let target = match self.resource_type.parse::<ResourceType>()? {
            ResourceType::Document => RecycleTarget::Document {
                document_id: self.resource_id,
                folder_id: self.original_parent_id,
            },
            ResourceType::Folder => RecycleTarget::Folder {
                folder_id: self.resource_id,
                parent_id: self.original_parent_id,
            },
        };
        Ok(target)
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = recycle_items)]
pub struct NewRecycleItem {
    pub owner_id: i64,
    pub resource_type: String,
    pub resource_id: i64,
    pub resource_name: String,
    pub original_path: String,
    pub original_parent_id: Option<i64>,
    pub delete_reason: Option<String>,
    pub auto_delete_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Queryable, Selectable, Identifiable)]
#[diesel(table_name = activity_logs)]
pub struct ActivityLog {
    pub id: i64,
    pub owner_id: i64,
    pub action_type: String,
    pub resource_type: String,
    pub resource_id: i64,
    pub resource_name: String,
    pub description: String,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = activity_logs)]
pub struct NewActivityLog {
    pub owner_id: i64,
    pub action_type: String,
    pub resource_type: String,
    pub resource_id: i64,
    pub resource_name: String,
    pub description: String,
    pub created_at: NaiveDateTime,
}

/// The entity a recycle bin entry refers to, with what restore needs to reattach it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecycleTarget {
    Document {
        document_id: i64,
        folder_id: Option<i64>,
    },
    Folder {
        folder_id: i64,
        parent_id: Option<i64>,
    },
}

impl RecycleTarget {
    pub fn resource_type(&self) -> ResourceType {
        match self {
            RecycleTarget::Document { .. } => ResourceType::Document,
            RecycleTarget::Folder { .. } => ResourceType::Folder,
        }
    }

    pub fn resource_id(&self) -> i64 {
        match *self {
            RecycleTarget::Document { document_id, .. } => document_id,
            RecycleTarget::Folder { folder_id, .. } => folder_id,
        }
    }

    pub fn original_parent_id(&self) -> Option<i64> {
        match *self {
            RecycleTarget::Document { folder_id, .. } => folder_id,
            RecycleTarget::Folder { parent_id, .. } => parent_id,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    Draft,
    Published,
    Archived,
}

impl DocumentStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            DocumentStatus::Draft => "draft",
            DocumentStatus::Published => "published",
            DocumentStatus::Archived => "archived",
        }
    }
}

impl FromStr for DocumentStatus {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "draft" => Ok(DocumentStatus::Draft),
            "published" => Ok(DocumentStatus::Published),
            "archived" => Ok(DocumentStatus::Archived),
            other => Err(AppError::invalid_operation(format!(
                "unknown document status '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    Word,
    Excel,
    Ppt,
    Mindmap,
    Note,
    AiDraft,
    Imported,
}

impl DocumentType {
    pub const fn as_str(self) -> &'static str {
        match self {
            DocumentType::Word => "word",
            DocumentType::Excel => "excel",
            DocumentType::Ppt => "ppt",
            DocumentType::Mindmap => "mindmap",
            DocumentType::Note => "note",
            DocumentType::AiDraft => "ai_draft",
            DocumentType::Imported => "imported",
        }
    }
}

impl FromStr for DocumentType {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "word" => Ok(DocumentType::Word),
            "excel" => Ok(DocumentType::Excel),
            "ppt" => Ok(DocumentType::Ppt),
            "mindmap" => Ok(DocumentType::Mindmap),
            "note" => Ok(DocumentType::Note),
            "ai_draft" => Ok(DocumentType::AiDraft),
            "imported" => Ok(DocumentType::Imported),
            other => Err(AppError::invalid_operation(format!(
                "unknown document type '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceType {
    Document,
    Folder,
}

impl ResourceType {
    pub const fn as_str(self) -> &'static str {
        match self {
            ResourceType::Document => "document",
            ResourceType::Folder => "folder",
        }
    }
}

impl FromStr for ResourceType {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "document" => Ok(ResourceType::Document),
            "folder" => Ok(ResourceType::Folder),
            other => Err(AppError::invalid_operation(format!(
                "unknown resource type '{other}'"
            ))),
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityAction {
    Create,
    Update,
    Delete,
    Move,
    Share,
    Copy,
    Restore,
    Purge,
}

impl ActivityAction {
    pub const fn as_str(self) -> &'static str {
        match self {
            ActivityAction::Create => "create",
            ActivityAction::Update => "update",
            ActivityAction::Delete => "delete",
            ActivityAction::Move => "move",
            ActivityAction::Share => "share",
            ActivityAction::Copy => "copy",
            ActivityAction::Restore => "restore",
            ActivityAction::Purge => "purge",
        }
    }
}

impl FromStr for ActivityAction {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "create" => Ok(ActivityAction::Create),
            "update" => Ok(ActivityAction::Update),
            "delete" => Ok(ActivityAction::Delete),
            "move" => Ok(ActivityAction::Move),
            "share" => Ok(ActivityAction::Share),
            "copy" => Ok(ActivityAction::Copy),
            "restore" => Ok(ActivityAction::Restore),
            "purge" => Ok(ActivityAction::Purge),
            other => Err(AppError::invalid_operation(format!(
                "unknown activity action '{other}'"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(resource_type: &str) -> RecycleItem {
        RecycleItem {
            id: 1,
            owner_id: 7,
            resource_type: resource_type.to_string(),
            resource_id: 42,
            resource_name: "Report".to_string(),
            original_path: "/A/B".to_string(),
            original_parent_id: Some(3),
            delete_reason: None,
            auto_delete_at: None,
            created_at: NaiveDateTime::default(),
        }
    }

    #[test]
    fn recycle_item_decodes_document_target() {
        let target = item("document").target().unwrap();
        assert_eq!(
            target,
            RecycleTarget::Document {
                document_id: 42,
                folder_id: Some(3)
            }
        );
        assert_eq!(target.resource_type(), ResourceType::Document);
        assert_eq!(target.original_parent_id(), Some(3));
    }

    #[test]
    fn recycle_item_decodes_folder_target() {
        let target = item("folder").target().unwrap();
        assert_eq!(target.resource_id(), 42);
        assert_eq!(target.resource_type(), ResourceType::Folder);
    }

    #[test]
    fn recycle_item_rejects_unknown_discriminator() {
        assert!(item("tag").target().is_err());
    }

    #[test]
    fn enums_round_trip_through_storage_strings() {
        for status in [
            DocumentStatus::Draft,
            DocumentStatus::Published,
            DocumentStatus::Archived,
        ] {
            assert_eq!(status.as_str().parse::<DocumentStatus>().unwrap(), status);
        }
        assert_eq!("ai_draft".parse::<DocumentType>().unwrap(), DocumentType::AiDraft);
        assert_eq!("purge".parse::<ActivityAction>().unwrap(), ActivityAction::Purge);
        assert!("login".parse::<ActivityAction>().is_err());
        assert!("spreadsheet".parse::<DocumentType>().is_err());
    }
}
