//! In-memory record store for testing.

use crate::error::StoreResult;
use crate::store::RecordStore;
use crate::table::Table;
use medisync_model::{RecordKey, SyncRecord};
use parking_lot::RwLock;

/// An in-memory record store.
///
/// Suitable for unit tests, integration tests and sessions that don't need
/// persistence.
///
/// # Thread Safety
///
/// This store is thread-safe and can be shared across threads.
#[derive(Debug)]
pub struct InMemoryStore<R> {
    table: RwLock<Table<R>>,
}

impl<R: SyncRecord> InMemoryStore<R> {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            table: RwLock::new(Table::default()),
        }
    }

    /// Creates a store holding `rows`, in the given order, statuses as-is.
    ///
    /// # Errors
    ///
    /// Returns an error if two rows share a key.
    pub fn with_rows(rows: Vec<R>) -> StoreResult<Self> {
        Ok(Self {
            table: RwLock::new(Table::from_rows(rows)?),
        })
    }

    /// Returns the number of rows, hidden ones included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.table.read().len()
    }

    /// Returns true if the store holds no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<R: SyncRecord> Default for InMemoryStore<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: SyncRecord> RecordStore<R> for InMemoryStore<R> {
    fn scan(&self, filter: &dyn Fn(&R) -> bool) -> StoreResult<Vec<R>> {
        Ok(self
            .table
            .read()
            .iter()
            .filter(|record| filter(record))
            .cloned()
            .collect())
    }

    fn get_by_id(&self, key: RecordKey) -> StoreResult<Option<R>> {
        Ok(self.table.read().get(key).cloned())
    }

    fn insert(&self, record: R) -> StoreResult<()> {
        self.table.write().insert(record)
    }

    fn update(&self, record: R) -> StoreResult<()> {
        self.table.write().update(record)
    }

    fn hard_delete(&self, key: RecordKey) -> StoreResult<bool> {
        Ok(self.table.write().remove(key).is_some())
    }

    fn replace_key(&self, old: RecordKey, new: RecordKey) -> StoreResult<()> {
        self.table.write().replace_key(old, new)
    }

    fn complete_create(&self, old: RecordKey, remote: R) -> StoreResult<()> {
        self.table.write().complete_create(old, remote)
    }

    fn next_local_key(&self) -> StoreResult<RecordKey> {
        Ok(self.table.read().next_local_key())
    }

    fn replace_synced(&self, snapshot: Vec<R>, parent: Option<RecordKey>) -> StoreResult<usize> {
        Ok(self.table.write().replace_synced(snapshot, parent))
    }
}
