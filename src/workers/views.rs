use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;

use super::BackgroundTask;
use crate::schema::documents;

/// Bumps a document's view counter without touching `updated_at`.
#[derive(Debug, Clone, Copy)]
pub struct ViewIncrement {
    pub document_id: i64,
}

impl BackgroundTask for ViewIncrement {
    fn kind(&self) -> &'static str {
        "view-increment"
    }

    fn apply(self, conn: &mut SqliteConnection) -> QueryResult<()> {
        diesel::update(documents::table.find(self.document_id))
            .set(documents::view_count.eq(documents::view_count + 1))
            .execute(conn)?;
        Ok(())
    }
}
