use chrono::NaiveDateTime;
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;

use super::BackgroundTask;
use crate::models::{ActivityAction, NewActivityLog, ResourceType};
use crate::schema::activity_logs;

#[derive(Debug, Clone)]
pub struct ActivityRecord {
    pub owner_id: i64,
    pub action: ActivityAction,
    pub resource_type: ResourceType,
    pub resource_id: i64,
    pub resource_name: String,
    pub description: String,
    pub at: NaiveDateTime,
}

impl BackgroundTask for ActivityRecord {
    fn kind(&self) -> &'static str {
        "activity"
    }

    fn apply(self, conn: &mut SqliteConnection) -> QueryResult<()> {
        diesel::insert_into(activity_logs::table)
            .values(NewActivityLog {
                owner_id: self.owner_id,
                action_type: self.action.as_str().to_string(),
                resource_type: self.resource_type.as_str().to_string(),
                resource_id: self.resource_id,
                resource_name: self.resource_name,
                description: self.description,
                created_at: self.at,
            })
            .execute(conn)?;
        Ok(())
    }
}
