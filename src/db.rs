//! SQLite storage shared by the reservation store and the archive history.
//!
//! Every pooled connection is opened from the same [`SqliteConnectOptions`],
//! so WAL journaling and the busy timeout hold no matter which connection a
//! query lands on. Migrations under `migrations/` run on open.
//!
//! ```no_run
//! use archiver_core::Database;
//! use std::path::Path;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let db = Database::open(Path::new("archiver.db")).await?;
//! // Hand clones to SqliteReservationStore and ArchiveHistory
//! # Ok(())
//! # }
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use thiserror::Error;
use tracing::{debug, instrument};

/// Reservations are short transactions; a handful of connections is plenty.
const MAX_CONNECTIONS: u32 = 4;

/// How long a connection waits on a locked database before giving up.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Storage errors outside the reservation protocol.
#[derive(Error, Debug)]
pub enum DbError {
    #[error("cannot open database {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: sqlx::Error,
    },

    #[error("failed to run migrations: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("database query failed: {0}")]
    Query(#[from] sqlx::Error),

    /// SQLite integers are signed; ids above `i64::MAX` cannot be stored.
    #[error("work id {0} does not fit the database")]
    InvalidWorkId(u64),
}

/// Pooled handle to the archiver database. Clones share the pool.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Opens the database file at `db_path`, creating it if missing.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Open`] if no connection can be made, or
    /// [`DbError::Migration`] if the schema cannot be brought up to date.
    #[instrument(skip(db_path), fields(path = %db_path.display()))]
    pub async fn open(db_path: &Path) -> Result<Self, DbError> {
        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(BUSY_TIMEOUT);

        let pool = SqlitePoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .connect_with(options)
            .await
            .map_err(|source| DbError::Open {
                path: db_path.to_path_buf(),
                source,
            })?;

        Self::migrated(pool).await
    }

    /// Opens a private in-memory database.
    ///
    /// The data lives in a single connection that the pool never retires.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the connection or migrations fail.
    #[instrument]
    pub async fn in_memory() -> Result<Self, DbError> {
        let options: SqliteConnectOptions = "sqlite::memory:".parse()?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        Self::migrated(pool).await
    }

    async fn migrated(pool: SqlitePool) -> Result<Self, DbError> {
        sqlx::migrate!("./migrations").run(&pool).await?;
        debug!("database ready");
        Ok(Self { pool })
    }

    #[must_use]
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn close(self) {
        self.pool.close().await;
    }
}

/// Converts a work id to its stored form.
///
/// # Errors
///
/// Returns [`DbError::InvalidWorkId`] above `i64::MAX`.
pub fn work_id_to_db(work_id: u64) -> Result<i64, DbError> {
    i64::try_from(work_id).map_err(|_| DbError::InvalidWorkId(work_id))
}
