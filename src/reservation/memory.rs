//! Process-local reservation store.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use super::{Reservation, ReservationError, ReservationStore};

/// In-memory reservation store with the same semantics as the SQLite one.
///
/// The whole check-then-reserve step runs under one lock, which is never
/// held across an await.
#[derive(Debug, Default)]
pub struct MemoryReservationStore {
    entries: Mutex<HashMap<String, Reservation>>,
}

impl MemoryReservationStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of bound names.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ReservationStore for MemoryReservationStore {
    async fn reserve(
        &self,
        work_id: u64,
        title: &str,
        dir_name: &str,
    ) -> Result<Reservation, ReservationError> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| ReservationError::Unavailable("reservation map poisoned".to_string()))?;
        let owner = entries
            .entry(dir_name.to_string())
            .or_insert_with(|| Reservation {
                owner_work_id: work_id,
                owner_title: title.to_string(),
            });
        Ok(owner.clone())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_store_first_caller_wins() {
        let store = MemoryReservationStore::new();

        let first = store.reserve(1, "Same", "Same").await.unwrap();
        let second = store.reserve(2, "Same", "Same").await.unwrap();

        assert_eq!(first.owner_work_id, 1);
        assert_eq!(second.owner_work_id, 1);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_memory_store_distinct_names_independent() {
        let store = MemoryReservationStore::new();
        assert!(store.is_empty());

        store.reserve(1, "A", "A").await.unwrap();
        let b = store.reserve(2, "B", "B").await.unwrap();

        assert_eq!(b.owner_work_id, 2);
        assert_eq!(store.len(), 2);
    }
}
