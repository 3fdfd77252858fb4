//! SQLite-backed reservation store.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::{debug, instrument};

use super::{Reservation, ReservationError, ReservationStore};
use crate::db::Database;

/// Persistent reservation store.
///
/// Check-then-reserve runs inside a transaction, and additionally under a
/// per-name async mutex so callers in this process never interleave on the
/// same name. Different names proceed independently.
#[derive(Debug)]
pub struct SqliteReservationStore {
    db: Database,
    /// Uses Arc so the `DashMap` shard lock is released before awaiting the inner mutex.
    name_locks: DashMap<String, Arc<Mutex<()>>>,
}

impl SqliteReservationStore {
    #[must_use]
    pub fn new(db: Database) -> Self {
        Self {
            db,
            name_locks: DashMap::new(),
        }
    }

    /// Returns the current owner of `dir_name` without reserving it.
    ///
    /// # Errors
    ///
    /// Returns [`ReservationError::Database`] if the query fails.
    #[instrument(skip(self))]
    pub async fn owner_of(&self, dir_name: &str) -> Result<Option<Reservation>, ReservationError> {
        let row: Option<(i64, String)> =
            sqlx::query_as("SELECT work_id, work_title FROM dir_reservations WHERE dir_name = ?")
                .bind(dir_name)
                .fetch_optional(self.db.pool())
                .await?;

        row.map(|(work_id, title)| to_reservation(dir_name, work_id, title))
            .transpose()
    }
}

#[async_trait]
impl ReservationStore for SqliteReservationStore {
    #[instrument(skip(self, title))]
    async fn reserve(
        &self,
        work_id: u64,
        title: &str,
        dir_name: &str,
    ) -> Result<Reservation, ReservationError> {
        let requester =
            i64::try_from(work_id).map_err(|_| ReservationError::InvalidWorkId(work_id))?;

        let name_lock = self
            .name_locks
            .entry(dir_name.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let _guard = name_lock.lock().await;

        let mut tx = self.db.pool().begin().await?;

        let inserted = sqlx::query(
            r"INSERT INTO dir_reservations (dir_name, work_id, work_title)
              VALUES (?, ?, ?)
              ON CONFLICT(dir_name) DO NOTHING",
        )
        .bind(dir_name)
        .bind(requester)
        .bind(title)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        let (owner_id, owner_title): (i64, String) =
            sqlx::query_as("SELECT work_id, work_title FROM dir_reservations WHERE dir_name = ?")
                .bind(dir_name)
                .fetch_one(&mut *tx)
                .await?;

        tx.commit().await?;

        debug!(newly_bound = inserted > 0, owner_id, "reservation resolved");
        to_reservation(dir_name, owner_id, owner_title)
    }
}

fn to_reservation(
    dir_name: &str,
    owner_id: i64,
    owner_title: String,
) -> Result<Reservation, ReservationError> {
    let owner_work_id = u64::try_from(owner_id).map_err(|_| ReservationError::Inconsistent {
        dir_name: dir_name.to_string(),
        detail: format!("stored owner id {owner_id} is negative"),
    })?;
    Ok(Reservation {
        owner_work_id,
        owner_title,
    })
}
