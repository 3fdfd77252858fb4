//! Directory-name reservations shared by every work in the process.
//!
//! A reservation binds a sanitized work directory name to the id of the work
//! that claimed it first. The store is the single source of truth for name
//! ownership: once a name is bound, later requests by other ids get the
//! existing owner back instead of overwriting it.
//!
//! - [`ReservationStore`] - the store contract
//! - [`SqliteReservationStore`] - persistent store over [`Database`](crate::Database)
//! - [`MemoryReservationStore`] - process-local store for dry runs and tests

mod error;
mod memory;
mod sqlite;

use async_trait::async_trait;

pub use error::{ReservationError, StoreErrorKind};
pub use memory::MemoryReservationStore;
pub use sqlite::SqliteReservationStore;

/// Current owner of a directory name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reservation {
    /// Id of the work the name is bound to.
    pub owner_work_id: u64,
    /// Title the owner registered with.
    pub owner_title: String,
}

/// Keyed store mapping a directory name to its owning work.
///
/// Implementations must serialize check-then-reserve per name so two works
/// racing for the same name cannot both win.
#[async_trait]
pub trait ReservationStore: Send + Sync {
    /// Binds `dir_name` to `work_id` if unbound and returns the owner.
    ///
    /// Idempotent: repeating the call with the same `(work_id, dir_name)`
    /// returns the same owner.
    ///
    /// # Errors
    ///
    /// Returns [`ReservationError`] when the store is unreachable or holds
    /// inconsistent data.
    async fn reserve(
        &self,
        work_id: u64,
        title: &str,
        dir_name: &str,
    ) -> Result<Reservation, ReservationError>;
}
