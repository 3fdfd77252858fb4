//! Record of works already archived by earlier runs.

use tracing::{debug, instrument};

use super::orchestrator::CompletedArchive;
use crate::db::{Database, DbError, work_id_to_db};

/// Archive history stored next to the directory reservations.
#[derive(Debug, Clone)]
pub struct ArchiveHistory {
    db: Database,
}

impl ArchiveHistory {
    #[must_use]
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Whether `work_id` was archived successfully before.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the query fails or the id does not fit.
    #[instrument(skip(self))]
    pub async fn is_archived(&self, work_id: u64) -> Result<bool, DbError> {
        let id = work_id_to_db(work_id)?;
        let row: Option<(i64,)> =
            sqlx::query_as("SELECT work_id FROM archived_works WHERE work_id = ?")
                .bind(id)
                .fetch_optional(self.db.pool())
                .await?;
        Ok(row.is_some())
    }

    /// Records a completed archive, replacing any earlier record of the work.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the write fails.
    #[instrument(skip(self, archive), fields(work_id = archive.work_id))]
    pub async fn record_archived(&self, archive: &CompletedArchive) -> Result<(), DbError> {
        let id = work_id_to_db(archive.work_id)?;
        let chapter_count = i64::try_from(archive.chapter_count).unwrap_or(i64::MAX);
        sqlx::query(
            r"INSERT INTO archived_works (work_id, title, directory, chapter_count)
              VALUES (?, ?, ?, ?)
              ON CONFLICT(work_id) DO UPDATE SET
                  title = excluded.title,
                  directory = excluded.directory,
                  chapter_count = excluded.chapter_count,
                  archived_at = datetime('now')",
        )
        .bind(id)
        .bind(&archive.title)
        .bind(archive.directory.to_string_lossy().into_owned())
        .bind(chapter_count)
        .execute(self.db.pool())
        .await?;
        debug!("archive recorded");
        Ok(())
    }
}
