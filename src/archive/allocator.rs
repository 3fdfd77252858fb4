//! Work directory allocation with collision handling.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::OnceCell;
use tracing::{debug, error, instrument, warn};

use super::error::ArchiveError;
use crate::notify::Notifier;
use crate::reservation::{Reservation, ReservationStore};

/// Resolves each work's base directory to a name owned only by that work.
///
/// Two works whose titles sanitize to the same name would otherwise share a
/// directory. The second one to ask gets `"<name> (<work id>)"` instead.
///
/// Results are cached per `(work_id, base_path)`, so repeated calls return
/// the same path and a collision is reported once per pair.
pub struct DirectoryAllocator {
    store: Arc<dyn ReservationStore>,
    notifier: Arc<dyn Notifier>,
    resolved: DashMap<(u64, PathBuf), Arc<OnceCell<PathBuf>>>,
}

impl std::fmt::Debug for DirectoryAllocator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirectoryAllocator")
            .field("resolved", &self.resolved.len())
            .finish_non_exhaustive()
    }
}

impl DirectoryAllocator {
    #[must_use]
    pub fn new(store: Arc<dyn ReservationStore>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            store,
            notifier,
            resolved: DashMap::new(),
        }
    }

    /// Returns the directory `work_id` should archive into.
    ///
    /// # Errors
    ///
    /// Returns [`ArchiveError::Reservation`] if the reservation store fails.
    /// The failure is not cached; a later call asks the store again.
    #[instrument(skip(self, title, base_path), fields(base = %base_path.display()))]
    pub async fn allocate(
        &self,
        work_id: u64,
        title: &str,
        base_path: &Path,
    ) -> Result<PathBuf, ArchiveError> {
        // Clone the cell out so the DashMap shard lock is not held across the await
        let cell = self
            .resolved
            .entry((work_id, base_path.to_path_buf()))
            .or_default()
            .clone();

        cell.get_or_try_init(|| self.resolve(work_id, title, base_path))
            .await
            .cloned()
    }

    async fn resolve(
        &self,
        work_id: u64,
        title: &str,
        base_path: &Path,
    ) -> Result<PathBuf, ArchiveError> {
        let dir_name = component_name(base_path);
        let owner = self.reserve(work_id, title, &dir_name).await?;
        if owner.owner_work_id == work_id {
            debug!(dir_name, "directory reserved");
            return Ok(base_path.to_path_buf());
        }

        let renamed = disambiguate(base_path, work_id);
        warn!(
            owner_id = owner.owner_work_id,
            owner_title = %owner.owner_title,
            requester_id = work_id,
            requester_title = title,
            renamed = %renamed.display(),
            "directory name already reserved by another work"
        );
        self.notifier.warn(format!(
            "Directory collision: '{dir_name}' belongs to #{} {}; #{work_id} {title} renamed to {}",
            owner.owner_work_id,
            owner.owner_title,
            renamed.display()
        ));

        let renamed_name = component_name(&renamed);
        let second = self.reserve(work_id, title, &renamed_name).await?;
        if second.owner_work_id != work_id {
            error!(
                owner_id = second.owner_work_id,
                owner_title = %second.owner_title,
                requester_id = work_id,
                dir_name = renamed_name,
                "repeat directory collision, keeping renamed path"
            );
        }
        Ok(renamed)
    }

    async fn reserve(
        &self,
        work_id: u64,
        title: &str,
        dir_name: &str,
    ) -> Result<Reservation, ArchiveError> {
        self.store
            .reserve(work_id, title, dir_name)
            .await
            .map_err(|source| {
                error!(work_id, title, dir_name, error = %source, "directory reservation failed");
                self.notifier.error(format!(
                    "Directory reservation failed for #{work_id} {title}: {source}"
                ));
                ArchiveError::Reservation {
                    work_id,
                    title: title.to_string(),
                    source,
                }
            })
    }
}

fn component_name(path: &Path) -> String {
    path.file_name()
        .map_or_else(|| path.to_string_lossy(), |name| name.to_string_lossy())
        .into_owned()
}

fn disambiguate(base_path: &Path, work_id: u64) -> PathBuf {
    let mut renamed = OsString::from(base_path.as_os_str());
    renamed.push(format!(" ({work_id})"));
    PathBuf::from(renamed)
}
